//! Step solvers: pluggable strategies that advance simulated time.
//!
//! # Contract
//! - `simulate(steps, dt, emit)` calls `emit(Step, payload)` exactly `steps`
//!   times, with `payload["i"]` counting up from 0 and `payload["t"]` the
//!   accumulated time.
//! - `with_overrides` builds a new solver and leaves the receiver untouched.

use biosim_common::{BioWorldEvent, Payload};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Parameter overrides keyed by parameter name.
pub type Overrides = Map<String, Value>;

/// Callback a solver uses to emit lifecycle events.
pub type Emit<'a> = dyn FnMut(BioWorldEvent, &Payload) + 'a;

/// Errors from solver construction, reconfiguration or execution.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolverError {
    #[error("invalid parameter '{name}' for solver '{solver}': {reason}")]
    InvalidParameter {
        solver: String,
        name: String,
        reason: String,
    },
    #[error("solver '{solver}' has no parameter '{key}'")]
    UnknownOverride { solver: String, key: String },
    #[error("unknown solver '{name}'")]
    UnknownSolver { name: String },
    #[error("solver '{solver}' failed: {reason}")]
    Failed { solver: String, reason: String },
}

/// What a solver reports after a run.
///
/// Serializes flat: `{"steps": 2, "time": 0.2, ...extra}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub steps: u64,
    pub time: f64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl RunSummary {
    pub fn new(steps: u64, time: f64) -> Self {
        Self {
            steps,
            time,
            extra: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match key {
            "steps" => Some(self.steps as f64),
            "time" => Some(self.time),
            _ => self.extra.get(key).and_then(Value::as_f64),
        }
    }

    /// The summary as an event payload.
    pub fn to_payload(&self) -> Payload {
        let mut map = Map::new();
        map.insert("steps".into(), json!(self.steps));
        map.insert("time".into(), json!(self.time));
        for (k, v) in &self.extra {
            map.insert(k.clone(), v.clone());
        }
        Value::Object(map)
    }
}

/// A strategy for advancing simulated time.
pub trait Solver: fmt::Debug + Send + Sync {
    /// Short name used in logs and configuration.
    fn name(&self) -> &str;

    fn simulate(&self, steps: u64, dt: f64, emit: &mut Emit<'_>) -> Result<RunSummary, SolverError>;

    /// A new solver with `overrides` applied.
    fn with_overrides(&self, overrides: &Overrides) -> Result<Arc<dyn Solver>, SolverError>;
}

/// Read a numeric override, rejecting non-numeric values.
pub fn override_f64(solver: &str, key: &str, value: &Value) -> Result<f64, SolverError> {
    value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| SolverError::InvalidParameter {
            solver: solver.to_string(),
            name: key.to_string(),
            reason: format!("expected a finite number, got {value}"),
        })
}

/// Advances `t += dt` every step, no adaptation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FixedStepSolver;

impl FixedStepSolver {
    pub const NAME: &'static str = "fixed";

    pub fn new() -> Self {
        Self
    }
}

impl Solver for FixedStepSolver {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn simulate(&self, steps: u64, dt: f64, emit: &mut Emit<'_>) -> Result<RunSummary, SolverError> {
        let mut t = 0.0;
        for i in 0..steps {
            t += dt;
            emit(BioWorldEvent::Step, &json!({ "i": i, "t": t, "dt": dt }));
        }
        Ok(RunSummary::new(steps, t))
    }

    fn with_overrides(&self, overrides: &Overrides) -> Result<Arc<dyn Solver>, SolverError> {
        if let Some(key) = overrides.keys().next() {
            return Err(SolverError::UnknownOverride {
                solver: Self::NAME.into(),
                key: key.clone(),
            });
        }
        Ok(Arc::new(*self))
    }
}
