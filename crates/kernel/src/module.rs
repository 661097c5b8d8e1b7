use crate::error::HandlerError;
use crate::world::World;
use biosim_common::{BioWorldEvent, ModuleId, Payload};
use serde::Serialize;
use std::collections::BTreeSet;

/// A unit of simulation behavior.
///
/// Modules are passive: the world calls into them and they call back into
/// the world (for example [`World::publish_biosignal`]) to emit signals.
/// Every method has a default, so a module implements only what it needs.
///
/// Declared port sets are optional. An empty set disables port validation
/// for that side of the module.
pub trait Module {
    /// Input ports this module accepts.
    fn inputs(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Output topics this module publishes on.
    fn outputs(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Lifecycle events to receive. Empty means all of them.
    fn subscriptions(&self) -> BTreeSet<BioWorldEvent> {
        BTreeSet::new()
    }

    /// Called once when the module is registered, with its id and alias.
    fn attached(&mut self, _id: ModuleId, _alias: &str) {}

    fn on_event(
        &mut self,
        _event: BioWorldEvent,
        _payload: &Payload,
        _world: &mut World,
    ) -> Result<(), HandlerError> {
        Ok(())
    }

    fn on_signal(
        &mut self,
        _topic: &str,
        _payload: &Payload,
        _source: ModuleId,
        _world: &mut World,
    ) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Return to initial state.
    fn reset(&mut self) {}

    /// Dashboard visuals for the module's current state: one
    /// `{render, data, description?}` object or an array of them. `None`
    /// when there is nothing to show yet.
    fn visualize(&self) -> Option<Payload> {
        None
    }
}

/// Ports and subscriptions captured from a module at registration time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleSpec {
    pub inputs: BTreeSet<String>,
    pub outputs: BTreeSet<String>,
    pub subscriptions: BTreeSet<BioWorldEvent>,
}

impl ModuleSpec {
    pub fn of(module: &dyn Module) -> Self {
        Self {
            inputs: module.inputs(),
            outputs: module.outputs(),
            subscriptions: module.subscriptions(),
        }
    }

    pub fn subscribes_to(&self, event: BioWorldEvent) -> bool {
        self.subscriptions.is_empty() || self.subscriptions.contains(&event)
    }
}

/// Convenience for building port sets from string literals.
pub fn ports<const N: usize>(names: [&str; N]) -> BTreeSet<String> {
    names.into_iter().map(str::to_string).collect()
}
