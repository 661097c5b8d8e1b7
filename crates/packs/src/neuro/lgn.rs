use biosim_common::{ModuleId, Payload};
use biosim_kernel::{HandlerError, Module, World, ports};
use serde_json::json;
use std::collections::BTreeSet;

/// Relays whatever reaches it to `thalamus`, wrapped as `{"relay": ..}`.
#[derive(Debug, Default)]
pub struct Lgn {
    id: Option<ModuleId>,
    relayed: u64,
}

impl Lgn {
    pub const INPUT: &'static str = "retina";
    pub const TOPIC: &'static str = "thalamus";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn relayed(&self) -> u64 {
        self.relayed
    }
}

impl Module for Lgn {
    fn inputs(&self) -> BTreeSet<String> {
        ports([Self::INPUT])
    }

    fn outputs(&self) -> BTreeSet<String> {
        ports([Self::TOPIC])
    }

    fn attached(&mut self, id: ModuleId, _alias: &str) {
        self.id = Some(id);
    }

    fn on_signal(
        &mut self,
        topic: &str,
        payload: &Payload,
        source: ModuleId,
        world: &mut World,
    ) -> Result<(), HandlerError> {
        let id = self.id.ok_or_else(|| HandlerError::failed("lgn is not attached"))?;
        tracing::trace!(topic, %source, "lgn relay");
        self.relayed += 1;
        world.publish_biosignal(id, Self::TOPIC, &json!({ "relay": payload }));
        Ok(())
    }

    fn reset(&mut self) {
        self.relayed = 0;
    }
}
