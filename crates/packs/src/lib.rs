//! Module packs. Each pack exposes a `register` hook that adds its module
//! types to a [`ModuleRegistry`] so wiring documents can name them.

pub mod neuro;

use biosim_config::ModuleRegistry;

/// A registry with every bundled pack registered.
pub fn registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    neuro::register(&mut registry);
    registry
}
