//! A solver that carries a small physiological state across steps.
//!
//! Every step advances time by `dt`, then updates the state in a fixed
//! order: temperature, scalar quantities (in the order they were added),
//! then custom processes. The full state rides along in each STEP payload
//! and in the run summary, keyed by quantity name.

use biosim_common::BioWorldEvent;
use biosim_kernel::solver::override_f64;
use biosim_kernel::{Emit, Overrides, RunSummary, Solver, SolverError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Solver state: quantity name → current value.
pub type BioState = BTreeMap<String, f64>;

const RESERVED: [&str; 5] = ["i", "t", "dt", "steps", "time"];

/// Inclusive value range a quantity is clamped to after each update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemperatureParams {
    #[serde(default)]
    pub initial: f64,
    /// Added once per step regardless of `dt`.
    #[serde(default)]
    pub delta_per_step: f64,
    /// Added per unit of simulated time.
    #[serde(default)]
    pub rate_per_time: f64,
    #[serde(default)]
    pub bounds: Option<Bounds>,
}

impl Default for TemperatureParams {
    fn default() -> Self {
        Self {
            initial: 0.0,
            delta_per_step: 0.0,
            rate_per_time: 0.0,
            bounds: None,
        }
    }
}

/// A named quantity changing linearly with time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScalarRateParams {
    pub name: String,
    #[serde(default)]
    pub initial: f64,
    #[serde(default)]
    pub rate_per_time: f64,
    #[serde(default)]
    pub bounds: Option<Bounds>,
}

impl ScalarRateParams {
    pub fn new(name: impl Into<String>, initial: f64, rate_per_time: f64) -> Self {
        Self {
            name: name.into(),
            initial,
            rate_per_time,
            bounds: None,
        }
    }

    pub fn bounded(mut self, min: f64, max: f64) -> Self {
        self.bounds = Some(Bounds::new(min, max));
        self
    }
}

/// A custom state update run after the built-in quantities.
///
/// `update` sees the whole state and returns the entries it changes;
/// they are merged back before the next process runs.
pub trait Process: Send + Sync {
    fn name(&self) -> &str;

    fn init_state(&self) -> BioState {
        BioState::new()
    }

    fn update(&self, state: &BioState, dt: f64) -> BioState;
}

/// Parameters accepted from configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BioParams {
    #[serde(default)]
    temperature: Option<TemperatureParams>,
    #[serde(default)]
    scalars: Vec<ScalarRateParams>,
}

#[derive(Clone, Default)]
pub struct DefaultBioSolver {
    temperature: Option<TemperatureParams>,
    scalars: Vec<ScalarRateParams>,
    processes: Vec<Arc<dyn Process>>,
}

impl fmt::Debug for DefaultBioSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultBioSolver")
            .field("temperature", &self.temperature)
            .field("scalars", &self.scalars)
            .field(
                "processes",
                &self.processes.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl DefaultBioSolver {
    pub const NAME: &'static str = "default_bio";

    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a configuration object such as
    /// `{"temperature": {...}, "scalars": [{"name": "water", ...}]}`.
    /// `null` yields a solver with no quantities.
    pub fn from_params(params: &Value) -> Result<Self, SolverError> {
        let parsed: BioParams = if params.is_null() {
            BioParams::default()
        } else {
            serde_json::from_value(params.clone()).map_err(|e| invalid("params", e.to_string()))?
        };
        let solver = Self {
            temperature: parsed.temperature,
            scalars: parsed.scalars,
            processes: Vec::new(),
        };
        solver.validate()?;
        Ok(solver)
    }

    pub fn with_temperature(mut self, params: TemperatureParams) -> Self {
        self.temperature = Some(params);
        self
    }

    pub fn with_scalar(mut self, params: ScalarRateParams) -> Self {
        self.scalars.push(params);
        self
    }

    pub fn with_process(mut self, process: impl Process + 'static) -> Self {
        self.processes.push(Arc::new(process));
        self
    }

    pub fn temperature(&self) -> Option<&TemperatureParams> {
        self.temperature.as_ref()
    }

    pub fn scalars(&self) -> &[ScalarRateParams] {
        &self.scalars
    }

    /// State before the first step.
    pub fn initial_state(&self) -> BioState {
        let mut state = BioState::new();
        if let Some(temp) = &self.temperature {
            state.insert("temperature".into(), clamp(temp.bounds, temp.initial));
        }
        for scalar in &self.scalars {
            state.insert(scalar.name.clone(), clamp(scalar.bounds, scalar.initial));
        }
        for process in &self.processes {
            state.extend(process.init_state());
        }
        state
    }

    fn validate(&self) -> Result<(), SolverError> {
        if let Some(temp) = &self.temperature {
            check_finite("temperature.initial", temp.initial)?;
            check_finite("temperature.delta_per_step", temp.delta_per_step)?;
            check_finite("temperature.rate_per_time", temp.rate_per_time)?;
            check_bounds("temperature.bounds", temp.bounds)?;
        }
        let mut seen = Vec::with_capacity(self.scalars.len());
        for scalar in &self.scalars {
            let name = scalar.name.as_str();
            if name.is_empty() || name.contains('.') {
                return Err(invalid(name, "quantity names must be non-empty and contain no '.'"));
            }
            if name == "temperature" || RESERVED.contains(&name) {
                return Err(invalid(name, "name is reserved"));
            }
            if seen.contains(&name) {
                return Err(invalid(name, "duplicate quantity"));
            }
            seen.push(name);
            check_finite(&format!("{name}.initial"), scalar.initial)?;
            check_finite(&format!("{name}.rate_per_time"), scalar.rate_per_time)?;
            check_bounds(&format!("{name}.bounds"), scalar.bounds)?;
        }
        Ok(())
    }

    fn advance(&self, state: &mut BioState, dt: f64) {
        if let Some(temp) = &self.temperature {
            if let Some(value) = state.get_mut("temperature") {
                *value = clamp(temp.bounds, *value + temp.delta_per_step + temp.rate_per_time * dt);
            }
        }
        for scalar in &self.scalars {
            if let Some(value) = state.get_mut(&scalar.name) {
                *value = clamp(scalar.bounds, *value + scalar.rate_per_time * dt);
            }
        }
        for process in &self.processes {
            let changes = process.update(state, dt);
            state.extend(changes);
        }
    }

    fn apply_override(&mut self, key: &str, value: &Value) -> Result<(), SolverError> {
        let unknown = || SolverError::UnknownOverride {
            solver: Self::NAME.into(),
            key: key.to_string(),
        };
        let (quantity, field) = key.split_once('.').ok_or_else(unknown)?;
        let number = override_f64(Self::NAME, key, value)?;

        if quantity == "temperature" {
            let temp = self.temperature.get_or_insert_with(TemperatureParams::default);
            match field {
                "initial" => temp.initial = number,
                "delta_per_step" => temp.delta_per_step = number,
                "rate_per_time" => temp.rate_per_time = number,
                "min" => set_min(&mut temp.bounds, number),
                "max" => set_max(&mut temp.bounds, number),
                _ => return Err(unknown()),
            }
            return Ok(());
        }

        let scalar = self
            .scalars
            .iter_mut()
            .find(|s| s.name == quantity)
            .ok_or_else(unknown)?;
        match field {
            "initial" => scalar.initial = number,
            "rate_per_time" => scalar.rate_per_time = number,
            "min" => set_min(&mut scalar.bounds, number),
            "max" => set_max(&mut scalar.bounds, number),
            _ => return Err(unknown()),
        }
        Ok(())
    }
}

impl Solver for DefaultBioSolver {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn simulate(&self, steps: u64, dt: f64, emit: &mut Emit<'_>) -> Result<RunSummary, SolverError> {
        self.validate()?;
        let mut state = self.initial_state();
        let mut t = 0.0;
        for i in 0..steps {
            t += dt;
            self.advance(&mut state, dt);
            let mut payload = Map::new();
            payload.insert("i".into(), json!(i));
            payload.insert("t".into(), json!(t));
            payload.insert("dt".into(), json!(dt));
            for (name, value) in &state {
                payload.insert(name.clone(), json!(value));
            }
            emit(BioWorldEvent::Step, &Value::Object(payload));
        }
        tracing::debug!(steps, quantities = state.len(), "bio solver finished");

        let mut summary = RunSummary::new(steps, t);
        for (name, value) in state {
            summary = summary.with(name, value);
        }
        Ok(summary)
    }

    /// Keys are `"<quantity>.<field>"`. Fields are `initial`,
    /// `rate_per_time`, `min` and `max`; temperature also takes
    /// `delta_per_step`.
    fn with_overrides(&self, overrides: &Overrides) -> Result<Arc<dyn Solver>, SolverError> {
        let mut next = self.clone();
        for (key, value) in overrides {
            next.apply_override(key, value)?;
        }
        next.validate()?;
        Ok(Arc::new(next))
    }
}

fn clamp(bounds: Option<Bounds>, value: f64) -> f64 {
    match bounds {
        Some(b) => b.clamp(value),
        None => value,
    }
}

fn set_min(bounds: &mut Option<Bounds>, min: f64) {
    match bounds {
        Some(b) => b.min = min,
        None => *bounds = Some(Bounds::new(min, f64::INFINITY)),
    }
}

fn set_max(bounds: &mut Option<Bounds>, max: f64) {
    match bounds {
        Some(b) => b.max = max,
        None => *bounds = Some(Bounds::new(f64::NEG_INFINITY, max)),
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> SolverError {
    SolverError::InvalidParameter {
        solver: DefaultBioSolver::NAME.into(),
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn check_finite(name: &str, value: f64) -> Result<(), SolverError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(name, format!("expected a finite number, got {value}")))
    }
}

fn check_bounds(name: &str, bounds: Option<Bounds>) -> Result<(), SolverError> {
    match bounds {
        Some(b) if b.min.is_nan() || b.max.is_nan() || b.min > b.max => {
            Err(invalid(name, format!("min {} must not exceed max {}", b.min, b.max)))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biosim_common::Payload;

    fn run(solver: &dyn Solver, steps: u64, dt: f64) -> (RunSummary, Vec<Payload>) {
        let mut seen = Vec::new();
        let summary = solver
            .simulate(steps, dt, &mut |_, payload| seen.push(payload.clone()))
            .unwrap();
        (summary, seen)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn time_advances_by_dt() {
        let (summary, seen) = run(&DefaultBioSolver::new(), 3, 0.5);
        let ts: Vec<f64> = seen.iter().map(|p| p["t"].as_f64().unwrap()).collect();
        assert_eq!(ts, vec![0.5, 1.0, 1.5]);
        assert_eq!(summary.steps, 3);
        assert!(close(summary.time, 1.5));
    }

    #[test]
    fn temperature_delta_per_step() {
        let solver = DefaultBioSolver::new().with_temperature(TemperatureParams {
            delta_per_step: 1.0,
            ..TemperatureParams::default()
        });
        let (summary, seen) = run(&solver, 3, 0.5);
        let temps: Vec<f64> = seen
            .iter()
            .map(|p| p["temperature"].as_f64().unwrap())
            .collect();
        assert_eq!(temps, vec![1.0, 2.0, 3.0]);
        assert_eq!(summary.get_f64("temperature"), Some(3.0));
    }

    #[test]
    fn temperature_rate_and_bounds() {
        let solver = DefaultBioSolver::new().with_temperature(TemperatureParams {
            initial: 36.0,
            rate_per_time: 2.0,
            bounds: Some(Bounds::new(30.0, 37.0)),
            ..TemperatureParams::default()
        });
        let (summary, _) = run(&solver, 4, 0.25);
        assert_eq!(summary.get_f64("temperature"), Some(37.0));
    }

    #[test]
    fn scalars_clamp_at_lower_bound() {
        let solver = DefaultBioSolver::new()
            .with_scalar(ScalarRateParams::new("water", 1.0, -0.6).bounded(0.0, 1.0))
            .with_scalar(ScalarRateParams::new("oxygen", 0.3, -0.2).bounded(0.0, 1.0));
        let (summary, seen) = run(&solver, 2, 1.0);
        assert!(close(seen[0]["water"].as_f64().unwrap(), 0.4));
        assert!(close(seen[0]["oxygen"].as_f64().unwrap(), 0.1));
        assert_eq!(summary.get_f64("water"), Some(0.0));
        assert_eq!(summary.get_f64("oxygen"), Some(0.0));
    }

    struct Glucose;
    impl Process for Glucose {
        fn name(&self) -> &str {
            "glucose"
        }
        fn init_state(&self) -> BioState {
            BioState::from([("glucose".to_string(), 5.0)])
        }
        fn update(&self, state: &BioState, dt: f64) -> BioState {
            let water = state.get("water").copied().unwrap_or(0.0);
            let glucose = state["glucose"] - dt * (1.0 + water);
            BioState::from([("glucose".to_string(), glucose)])
        }
    }

    #[test]
    fn processes_run_after_builtin_quantities() {
        let solver = DefaultBioSolver::new()
            .with_scalar(ScalarRateParams::new("water", 1.0, 1.0))
            .with_process(Glucose);
        assert_eq!(solver.initial_state()["glucose"], 5.0);
        let (summary, _) = run(&solver, 1, 1.0);
        // water is already 2.0 when glucose updates
        assert_eq!(summary.get_f64("glucose"), Some(2.0));
        assert!(format!("{solver:?}").contains("glucose"));
    }

    #[test]
    fn from_params_reads_configuration() {
        let params = json!({
            "temperature": { "initial": 37.0, "delta_per_step": 0.5 },
            "scalars": [ { "name": "water", "initial": 1.0, "rate_per_time": -0.6,
                           "bounds": { "min": 0.0, "max": 1.0 } } ]
        });
        let solver = DefaultBioSolver::from_params(&params).unwrap();
        assert_eq!(solver.scalars().len(), 1);
        let (summary, _) = run(&solver, 2, 1.0);
        assert_eq!(summary.get_f64("temperature"), Some(38.0));
        assert_eq!(summary.get_f64("water"), Some(0.0));

        assert!(DefaultBioSolver::from_params(&Value::Null).is_ok());
        assert!(DefaultBioSolver::from_params(&json!({ "pressure": 1 })).is_err());
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let inverted = json!({ "scalars": [ { "name": "w", "bounds": { "min": 1.0, "max": 0.0 } } ] });
        assert!(matches!(
            DefaultBioSolver::from_params(&inverted),
            Err(SolverError::InvalidParameter { .. })
        ));
        let duplicate = json!({ "scalars": [ { "name": "w" }, { "name": "w" } ] });
        assert!(DefaultBioSolver::from_params(&duplicate).is_err());
        let reserved = json!({ "scalars": [ { "name": "t" } ] });
        assert!(DefaultBioSolver::from_params(&reserved).is_err());
    }

    #[test]
    fn overrides_produce_a_new_solver() {
        let solver = DefaultBioSolver::new()
            .with_scalar(ScalarRateParams::new("water", 1.0, -0.6).bounded(0.0, 1.0));
        let mut overrides = Overrides::new();
        overrides.insert("water.rate_per_time".into(), json!(0.0));
        overrides.insert("temperature.delta_per_step".into(), json!(2.0));
        let tuned = solver.with_overrides(&overrides).unwrap();

        let (summary, _) = run(tuned.as_ref(), 2, 1.0);
        assert_eq!(summary.get_f64("water"), Some(1.0));
        assert_eq!(summary.get_f64("temperature"), Some(4.0));
        // receiver untouched
        assert!(solver.temperature().is_none());
        assert_eq!(solver.scalars()[0].rate_per_time, -0.6);
    }

    #[test]
    fn bad_overrides_fail() {
        let solver = DefaultBioSolver::new().with_scalar(ScalarRateParams::new("water", 1.0, 0.0));
        for key in ["water", "water.speed", "sodium.initial"] {
            let overrides = Overrides::from_iter([(key.to_string(), json!(1.0))]);
            assert!(matches!(
                solver.with_overrides(&overrides),
                Err(SolverError::UnknownOverride { .. })
            ));
        }
        let inverted = Overrides::from_iter([("water.min".to_string(), json!(2.0)), ("water.max".to_string(), json!(1.0))]);
        assert!(matches!(
            solver.with_overrides(&inverted),
            Err(SolverError::InvalidParameter { .. })
        ));
    }
}
