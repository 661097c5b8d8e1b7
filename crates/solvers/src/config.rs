use crate::bio::DefaultBioSolver;
use crate::variable::VariableStepSolver;
use biosim_kernel::{FixedStepSolver, Solver, SolverError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// How a world's solver is chosen in a configuration document.
///
/// ```yaml
/// solver: fixed                      # built-in by name
/// solver: { name: default_bio, params: { ... } }
/// solver: { factory: my_solver, args: { ... } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SolverConfig {
    Builtin(String),
    BuiltinWithParams {
        name: String,
        #[serde(default)]
        params: Value,
    },
    CustomFactory {
        factory: String,
        #[serde(default)]
        args: Value,
    },
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig::Builtin(FixedStepSolver::NAME.to_string())
    }
}

/// Builds a solver from its parameters (`null` when none were given).
pub type SolverFactory = Box<dyn Fn(&Value) -> Result<Arc<dyn Solver>, SolverError> + Send + Sync>;

/// Resolves [`SolverConfig`]s to solvers.
///
/// Built-in names and custom factory ids live in separate namespaces.
#[derive(Default)]
pub struct SolverRegistry {
    builtins: BTreeMap<String, SolverFactory>,
    factories: BTreeMap<String, SolverFactory>,
}

impl fmt::Debug for SolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolverRegistry")
            .field("builtins", &self.builtins.keys().collect::<Vec<_>>())
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SolverRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// `fixed`, `default_bio` and `variable_step`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_builtin(FixedStepSolver::NAME, |params| {
            no_params(FixedStepSolver::NAME, params)?;
            Ok(Arc::new(FixedStepSolver))
        });
        registry.register_builtin(DefaultBioSolver::NAME, |params| {
            Ok(Arc::new(DefaultBioSolver::from_params(params)?))
        });
        registry.register_builtin(VariableStepSolver::NAME, |params| {
            Ok(Arc::new(VariableStepSolver::from_params(params)?))
        });
        registry
    }

    pub fn register_builtin<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> Result<Arc<dyn Solver>, SolverError> + Send + Sync + 'static,
    {
        self.builtins.insert(name.into(), Box::new(factory));
    }

    pub fn register_factory<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> Result<Arc<dyn Solver>, SolverError> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Box::new(factory));
    }

    pub fn builtin_names(&self) -> impl Iterator<Item = &str> {
        self.builtins.keys().map(String::as_str)
    }

    pub fn resolve(&self, config: &SolverConfig) -> Result<Arc<dyn Solver>, SolverError> {
        let none = Value::Null;
        let (table, key, params) = match config {
            SolverConfig::Builtin(name) => (&self.builtins, name, &none),
            SolverConfig::BuiltinWithParams { name, params } => (&self.builtins, name, params),
            SolverConfig::CustomFactory { factory, args } => (&self.factories, factory, args),
        };
        let factory = table
            .get(key)
            .ok_or_else(|| SolverError::UnknownSolver { name: key.clone() })?;
        let solver = factory(params)?;
        tracing::debug!(requested = %key, solver = solver.name(), "solver resolved");
        Ok(solver)
    }
}

fn no_params(solver: &str, params: &Value) -> Result<(), SolverError> {
    match params {
        Value::Null => Ok(()),
        Value::Object(map) if map.is_empty() => Ok(()),
        other => Err(SolverError::InvalidParameter {
            solver: solver.to_string(),
            name: "params".into(),
            reason: format!("takes no parameters, got {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biosim_kernel::{Emit, Overrides, RunSummary};
    use serde_json::json;

    #[test]
    fn config_forms_deserialize() {
        let plain: SolverConfig = serde_json::from_value(json!("fixed")).unwrap();
        assert_eq!(plain, SolverConfig::Builtin("fixed".into()));

        let with_params: SolverConfig =
            serde_json::from_value(json!({ "name": "variable_step", "params": { "max_dt": 0.1 } }))
                .unwrap();
        assert!(matches!(with_params, SolverConfig::BuiltinWithParams { ref name, .. } if name == "variable_step"));

        let custom: SolverConfig =
            serde_json::from_value(json!({ "factory": "mine" })).unwrap();
        assert_eq!(
            custom,
            SolverConfig::CustomFactory { factory: "mine".into(), args: Value::Null }
        );

        assert_eq!(SolverConfig::default(), plain);
    }

    #[test]
    fn builtins_resolve() {
        let registry = SolverRegistry::with_builtins();
        assert_eq!(
            registry.builtin_names().collect::<Vec<_>>(),
            vec!["default_bio", "fixed", "variable_step"]
        );
        for name in ["fixed", "default_bio", "variable_step"] {
            let solver = registry.resolve(&SolverConfig::Builtin(name.into())).unwrap();
            assert_eq!(solver.name(), name);
        }
    }

    #[test]
    fn builtin_params_are_passed_through() {
        let registry = SolverRegistry::with_builtins();
        let config = SolverConfig::BuiltinWithParams {
            name: "variable_step".into(),
            params: json!({ "max_dt": 0.1 }),
        };
        let solver = registry.resolve(&config).unwrap();
        let summary = solver.simulate(1, 1.0, &mut |_, _| {}).unwrap();
        assert_eq!(summary.get_f64("actual_dt"), Some(0.1));

        let bad = SolverConfig::BuiltinWithParams {
            name: "fixed".into(),
            params: json!({ "dt": 1 }),
        };
        assert!(matches!(
            registry.resolve(&bad),
            Err(SolverError::InvalidParameter { .. })
        ));
    }

    #[derive(Debug)]
    struct Doubling;
    impl Solver for Doubling {
        fn name(&self) -> &str {
            "doubling"
        }
        fn simulate(&self, steps: u64, dt: f64, _emit: &mut Emit<'_>) -> Result<RunSummary, SolverError> {
            Ok(RunSummary::new(steps, 2.0 * dt * steps as f64))
        }
        fn with_overrides(&self, _: &Overrides) -> Result<Arc<dyn Solver>, SolverError> {
            Ok(Arc::new(Doubling))
        }
    }

    #[test]
    fn custom_factories_and_unknown_names() {
        let mut registry = SolverRegistry::with_builtins();
        registry.register_factory("doubling", |_| Ok(Arc::new(Doubling)));

        let solver = registry
            .resolve(&SolverConfig::CustomFactory { factory: "doubling".into(), args: Value::Null })
            .unwrap();
        assert_eq!(solver.name(), "doubling");

        // factory ids are not builtin names
        assert_eq!(
            registry.resolve(&SolverConfig::Builtin("doubling".into())).unwrap_err(),
            SolverError::UnknownSolver { name: "doubling".into() }
        );
        assert!(format!("{registry:?}").contains("doubling"));
    }
}
