//! World orchestration kernel: lifecycle events, directed signal routing,
//! wiring construction and pluggable step solvers.
//!
//! # Invariants
//! - `Loaded` fires at most once per world; `BeforeSimulation` and
//!   `AfterSimulation` bracket every run with one `Step` per solver step.
//! - Wiring is committed atomically: a failed apply leaves no edges behind.
//! - A failing listener or module handler is logged and never aborts a run.
//! - Everything runs on the caller's thread; there is no hidden global state.

pub mod builder;
pub mod error;
pub mod module;
pub mod reference;
pub mod router;
pub mod solver;
pub mod world;

pub use biosim_common::{BioWorldEvent, ListenerId, ModuleId, Payload};
pub use builder::WiringBuilder;
pub use error::{HandlerError, PortDirection, WiringError};
pub use module::{Module, ModuleSpec, ports};
pub use reference::{Direction, PortRef};
pub use router::{RouteDescription, SignalRouter, WiringGraph};
pub use solver::{Emit, FixedStepSolver, Overrides, RunSummary, Solver, SolverError};
pub use world::{Listener, MAX_FEEDBACK_ROUNDS, ModuleDescription, World, WorldError};
