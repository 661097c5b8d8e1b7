use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle for a module registered with a world.
///
/// Ids are handed out sequentially per world, so registration order and id
/// order agree. That keeps dispatch order deterministic across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId(pub u64);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle returned when a global lifecycle listener is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

/// Event and signal payloads are free-form JSON values.
pub type Payload = serde_json::Value;

/// Lifecycle events emitted by a world.
///
/// `Loaded` fires at most once per world. `BeforeSimulation` and
/// `AfterSimulation` bracket every run, with one `Step` per solver step
/// in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BioWorldEvent {
    Loaded,
    BeforeSimulation,
    Step,
    AfterSimulation,
}

impl BioWorldEvent {
    /// Every event kind, in lifecycle order.
    pub const ALL: [BioWorldEvent; 4] = [
        BioWorldEvent::Loaded,
        BioWorldEvent::BeforeSimulation,
        BioWorldEvent::Step,
        BioWorldEvent::AfterSimulation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loaded => "LOADED",
            Self::BeforeSimulation => "BEFORE_SIMULATION",
            Self::Step => "STEP",
            Self::AfterSimulation => "AFTER_SIMULATION",
        }
    }

    /// Parse the upper-case wire name used in configuration files.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|ev| ev.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for BioWorldEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
