use biosim_solvers::SolverConfig;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

static NO_ARGS: Value = Value::Null;

/// A parsed wiring document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WiringConfig {
    #[serde(default)]
    pub solver: Option<SolverConfig>,
    /// Alias → entry, in document order.
    #[serde(default, deserialize_with = "ordered_modules")]
    pub modules: Vec<(String, ModuleEntry)>,
    #[serde(default)]
    pub wiring: Vec<WiringEntry>,
}

/// How to build one module: a bare type name, or a type name plus args.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModuleEntry {
    Type(String),
    WithArgs {
        #[serde(rename = "type")]
        type_name: String,
        #[serde(default)]
        args: Value,
    },
}

impl ModuleEntry {
    pub fn type_name(&self) -> &str {
        match self {
            ModuleEntry::Type(name) => name,
            ModuleEntry::WithArgs { type_name, .. } => type_name,
        }
    }

    /// Constructor args; `null` when none were given.
    pub fn args(&self) -> &Value {
        match self {
            ModuleEntry::Type(_) => &NO_ARGS,
            ModuleEntry::WithArgs { args, .. } => args,
        }
    }
}

/// One `{from, to: [...]}` wiring entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WiringEntry {
    pub from: String,
    pub to: Vec<String>,
}

fn ordered_modules<'de, D>(deserializer: D) -> Result<Vec<(String, ModuleEntry)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Ordered;

    impl<'de> Visitor<'de> for Ordered {
        type Value = Vec<(String, ModuleEntry)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a mapping of module alias to module entry")
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut out: Vec<(String, ModuleEntry)> = Vec::new();
            while let Some((alias, entry)) = map.next_entry::<String, ModuleEntry>()? {
                if out.iter().any(|(seen, _)| *seen == alias) {
                    return Err(serde::de::Error::custom(format!(
                        "duplicate module alias '{alias}'"
                    )));
                }
                out.push((alias, entry));
            }
            Ok(out)
        }
    }

    deserializer.deserialize_map(Ordered)
}
