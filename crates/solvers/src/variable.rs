use biosim_common::BioWorldEvent;
use biosim_kernel::solver::override_f64;
use biosim_kernel::{Emit, Overrides, RunSummary, Solver, SolverError};
use serde_json::{Value, json};
use std::sync::Arc;

/// Clamps the requested `dt` into `[min_dt, max_dt]` and steps with that.
///
/// STEP payloads and summary time use the clamped value; the summary also
/// reports it as `actual_dt`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableStepSolver {
    min_dt: f64,
    max_dt: f64,
}

impl Default for VariableStepSolver {
    fn default() -> Self {
        Self {
            min_dt: 1e-3,
            max_dt: 1.0,
        }
    }
}

impl VariableStepSolver {
    pub const NAME: &'static str = "variable_step";

    pub fn new(min_dt: f64, max_dt: f64) -> Result<Self, SolverError> {
        let solver = Self { min_dt, max_dt };
        solver.validate()?;
        Ok(solver)
    }

    /// `{"min_dt": .., "max_dt": ..}`; missing keys keep their defaults.
    pub fn from_params(params: &Value) -> Result<Self, SolverError> {
        let mut solver = Self::default();
        match params {
            Value::Null => {}
            Value::Object(map) => {
                for (key, value) in map {
                    solver.set(key, value)?;
                }
            }
            other => {
                return Err(SolverError::InvalidParameter {
                    solver: Self::NAME.into(),
                    name: "params".into(),
                    reason: format!("expected an object, got {other}"),
                });
            }
        }
        solver.validate()?;
        Ok(solver)
    }

    pub fn min_dt(&self) -> f64 {
        self.min_dt
    }

    pub fn max_dt(&self) -> f64 {
        self.max_dt
    }

    pub fn actual_dt(&self, requested: f64) -> f64 {
        requested.clamp(self.min_dt, self.max_dt)
    }

    fn set(&mut self, key: &str, value: &Value) -> Result<(), SolverError> {
        match key {
            "min_dt" => self.min_dt = override_f64(Self::NAME, key, value)?,
            "max_dt" => self.max_dt = override_f64(Self::NAME, key, value)?,
            _ => {
                return Err(SolverError::UnknownOverride {
                    solver: Self::NAME.into(),
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), SolverError> {
        let ok = self.min_dt.is_finite()
            && self.max_dt.is_finite()
            && self.min_dt > 0.0
            && self.min_dt <= self.max_dt;
        if ok {
            Ok(())
        } else {
            Err(SolverError::InvalidParameter {
                solver: Self::NAME.into(),
                name: "min_dt".into(),
                reason: format!(
                    "need 0 < min_dt <= max_dt, got min_dt={} max_dt={}",
                    self.min_dt, self.max_dt
                ),
            })
        }
    }
}

impl Solver for VariableStepSolver {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn simulate(&self, steps: u64, dt: f64, emit: &mut Emit<'_>) -> Result<RunSummary, SolverError> {
        let actual = self.actual_dt(dt);
        if actual != dt {
            tracing::debug!(requested = dt, actual, "dt clamped");
        }
        let mut t = 0.0;
        for i in 0..steps {
            t += actual;
            emit(BioWorldEvent::Step, &json!({ "i": i, "t": t, "dt": actual }));
        }
        Ok(RunSummary::new(steps, t).with("actual_dt", actual))
    }

    fn with_overrides(&self, overrides: &Overrides) -> Result<Arc<dyn Solver>, SolverError> {
        let mut next = *self;
        for (key, value) in overrides {
            next.set(key, value)?;
        }
        next.validate()?;
        Ok(Arc::new(next))
    }
}
