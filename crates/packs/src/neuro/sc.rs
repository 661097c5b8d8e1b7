use super::probe::Probe;
use biosim_common::{ModuleId, Payload};
use biosim_kernel::{HandlerError, Module, World, ports};
use serde_json::json;
use std::collections::{BTreeSet, VecDeque};

/// Terminal stage: records every signal it receives and plots the relayed
/// intensity over time.
#[derive(Debug, Default)]
pub struct SuperiorColliculus {
    probe: Probe,
    alias: String,
    points: VecDeque<(f64, f64)>,
}

impl SuperiorColliculus {
    pub const INPUT: &'static str = "vision";
    /// Points kept for the intensity plot.
    pub const MAX_POINTS: usize = 500;

    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that keeps observing after the module moves into a world.
    pub fn probe(&self) -> Probe {
        self.probe.clone()
    }
}

impl Module for SuperiorColliculus {
    fn inputs(&self) -> BTreeSet<String> {
        ports([Self::INPUT])
    }

    fn attached(&mut self, _id: ModuleId, alias: &str) {
        self.alias = alias.to_string();
    }

    fn on_signal(
        &mut self,
        topic: &str,
        payload: &Payload,
        source: ModuleId,
        _world: &mut World,
    ) -> Result<(), HandlerError> {
        tracing::debug!(topic, %source, "vision received");
        self.probe.record(payload);
        let frame = &payload["relay"];
        if let (Some(t), Some(intensity)) = (frame["t"].as_f64(), frame["intensity"].as_f64()) {
            if self.points.len() == Self::MAX_POINTS {
                self.points.pop_front();
            }
            self.points.push_back((t, intensity));
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.probe.clear();
        self.points.clear();
    }

    fn visualize(&self) -> Option<Payload> {
        if self.points.is_empty() {
            return None;
        }
        let points: Vec<[f64; 2]> = self.points.iter().map(|&(t, i)| [t, i]).collect();
        Some(json!({
            "render": "timeseries",
            "data": {
                "series": [{ "name": format!("{} intensity", self.alias), "points": points }],
            },
            "description": "Visual intensity relayed by the LGN",
        }))
    }
}
