//! Shared types for the biosim workspace.

mod types;

pub use types::{BioWorldEvent, ListenerId, ModuleId, Payload};
