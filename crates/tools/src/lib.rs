//! Tooling layered over a [`World`](biosim_kernel::World) for dashboards
//! and command-line front ends.
//!
//! # Invariants
//! - The inspector only reads; it never mutates a world.
//! - Visuals reach a dashboard only after validation.
//! - The run controller is the only place a long run is split into chunks;
//!   each chunk is one atomic `simulate` call.

pub mod controller;
pub mod inspector;
pub mod visuals;

pub use controller::{ControlError, Progress, RunController};
pub use inspector::{ModuleVisuals, WorldInspector, WorldSummary};
pub use visuals::{VisualError, VisualSpec, normalize_visuals, validate_visual_spec};
