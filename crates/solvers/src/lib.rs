//! Step solvers beyond the kernel's fixed-step reference, and the
//! configuration layer that turns a [`SolverConfig`] into a solver.

pub mod bio;
pub mod config;
pub mod variable;

pub use bio::{BioState, Bounds, DefaultBioSolver, Process, ScalarRateParams, TemperatureParams};
pub use config::{SolverConfig, SolverFactory, SolverRegistry};
pub use variable::VariableStepSolver;
