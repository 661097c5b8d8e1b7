//! Declarative wiring: load a document, instantiate its modules through a
//! [`ModuleRegistry`], resolve its solver through a
//! [`SolverRegistry`](biosim_solvers::SolverRegistry), and commit its
//! wiring through a [`WiringBuilder`](biosim_kernel::WiringBuilder).
//!
//! # Invariants
//! - Modules are registered in document order.
//! - Wiring is applied in one step: an invalid edge commits none.
//! - No file I/O happens outside [`load_wiring`].

mod document;
mod error;
mod loader;
mod registry;

pub use document::{ModuleEntry, WiringConfig, WiringEntry};
pub use error::ConfigError;
pub use loader::{BuildReport, build_from_config, load_wiring, parse_json, parse_yaml};
pub use registry::{ModuleFactory, ModuleRegistry, parse_args};
