use biosim_common::{BioWorldEvent, ModuleId, Payload};
use biosim_kernel::{HandlerError, Module, World, ports};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EyeArgs {
    /// Intensity attached to every frame.
    pub gain: f64,
}

impl Default for EyeArgs {
    fn default() -> Self {
        Self { gain: 1.0 }
    }
}

/// Publishes `{"t", "intensity"}` on `visual_stream` every step.
#[derive(Debug, Default)]
pub struct Eye {
    args: EyeArgs,
    id: Option<ModuleId>,
    frames: u64,
}

impl Eye {
    pub const TOPIC: &'static str = "visual_stream";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_args(args: EyeArgs) -> Self {
        Self {
            args,
            ..Self::default()
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Module for Eye {
    fn outputs(&self) -> BTreeSet<String> {
        ports([Self::TOPIC])
    }

    fn subscriptions(&self) -> BTreeSet<BioWorldEvent> {
        BTreeSet::from([BioWorldEvent::Step])
    }

    fn attached(&mut self, id: ModuleId, _alias: &str) {
        self.id = Some(id);
    }

    fn on_event(
        &mut self,
        _event: BioWorldEvent,
        payload: &Payload,
        world: &mut World,
    ) -> Result<(), HandlerError> {
        let id = self.id.ok_or_else(|| HandlerError::failed("eye is not attached"))?;
        let frame = json!({ "t": payload["t"], "intensity": self.args.gain });
        self.frames += 1;
        world.publish_biosignal(id, Self::TOPIC, &frame);
        Ok(())
    }

    fn reset(&mut self) {
        self.frames = 0;
    }
}
