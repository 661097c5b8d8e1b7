use crate::error::ConfigError;
use biosim_kernel::Module;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Builds a module from its `args` (`null` when none were given).
pub type ModuleFactory = Box<dyn Fn(&Value) -> Result<Box<dyn Module>, ConfigError>>;

/// Module type name → factory. Populated explicitly at startup; wiring
/// documents can only name types registered here.
#[derive(Default)]
pub struct ModuleRegistry {
    factories: BTreeMap<String, ModuleFactory>,
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `type_name`, replacing any previous one.
    pub fn register<F>(&mut self, type_name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&Value) -> Result<Box<dyn Module>, ConfigError> + 'static,
    {
        let type_name = type_name.into();
        if self.factories.insert(type_name.clone(), Box::new(factory)).is_some() {
            tracing::debug!(type_name, "module factory replaced");
        }
        self
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Instantiate the module registered as `type_name` for `alias`.
    pub fn build(&self, alias: &str, type_name: &str, args: &Value) -> Result<Box<dyn Module>, ConfigError> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| ConfigError::UnknownModuleType {
                alias: alias.to_string(),
                type_name: type_name.to_string(),
            })?;
        factory(args)
    }
}

/// Deserialize module args, treating `null` as `T::default()`.
pub fn parse_args<T>(type_name: &str, args: &Value) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Default,
{
    if args.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(args.clone()).map_err(|e| ConfigError::InvalidArgs {
        type_name: type_name.to_string(),
        reason: e.to_string(),
    })
}
