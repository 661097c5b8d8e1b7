use crate::document::WiringConfig;
use crate::error::ConfigError;
use crate::registry::ModuleRegistry;
use biosim_common::ModuleId;
use biosim_kernel::{WiringBuilder, World};
use biosim_solvers::SolverRegistry;
use std::path::Path;

/// What [`build_from_config`] did to the world.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    /// Registered modules, in document order.
    pub modules: Vec<(String, ModuleId)>,
    /// Newly committed routes.
    pub edges: usize,
    /// Name of the solver installed, if the document chose one.
    pub solver: Option<String>,
}

pub fn parse_yaml(text: &str) -> Result<WiringConfig, ConfigError> {
    Ok(serde_yaml::from_str(text)?)
}

pub fn parse_json(text: &str) -> Result<WiringConfig, ConfigError> {
    Ok(serde_json::from_str(text)?)
}

/// Read a wiring document, picking the parser by extension
/// (`.yaml`/`.yml` or `.json`, case-insensitive).
pub fn load_wiring(path: impl AsRef<Path>) -> Result<WiringConfig, ConfigError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let parse: fn(&str) -> Result<WiringConfig, ConfigError> = match extension.as_str() {
        "yaml" | "yml" => parse_yaml,
        "json" => parse_json,
        _ => return Err(ConfigError::UnsupportedFormat { extension }),
    };
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse(&text)?;
    tracing::debug!(
        path = %path.display(),
        modules = config.modules.len(),
        wiring = config.wiring.len(),
        "wiring document loaded"
    );
    Ok(config)
}

/// Apply a parsed document to `world`.
///
/// The solver is resolved first, so a bad solver entry leaves the world
/// untouched. Modules are then registered in document order and the wiring
/// is applied in one step. A failure after registration has begun leaves
/// the modules registered so far in place, with no new routes.
pub fn build_from_config(
    world: &mut World,
    config: &WiringConfig,
    modules: &ModuleRegistry,
    solvers: &SolverRegistry,
) -> Result<BuildReport, ConfigError> {
    let _span = tracing::info_span!(
        "build_from_config",
        modules = config.modules.len(),
        wiring = config.wiring.len()
    )
    .entered();

    let solver = config
        .solver
        .as_ref()
        .map(|cfg| solvers.resolve(cfg))
        .transpose()?;

    let mut built = Vec::with_capacity(config.modules.len());
    for (alias, entry) in &config.modules {
        let module = modules.build(alias, entry.type_name(), entry.args())?;
        built.push((alias.clone(), module));
    }

    let solver_name = solver.as_ref().map(|s| s.name().to_string());
    if let Some(solver) = solver {
        world.set_solver(solver);
    }

    let mut builder = WiringBuilder::new(world);
    for (alias, module) in built {
        builder.add_boxed(alias, module)?;
    }
    for entry in &config.wiring {
        builder.connect(entry.from.as_str(), entry.to.iter().map(String::as_str));
    }
    let edges = builder.apply()?;
    let report_modules: Vec<(String, ModuleId)> = config
        .modules
        .iter()
        .filter_map(|(alias, _)| builder.registry().get(alias).map(|id| (alias.clone(), *id)))
        .collect();

    tracing::info!(
        modules = report_modules.len(),
        edges,
        solver = solver_name.as_deref().unwrap_or("unchanged"),
        "configuration applied"
    );
    Ok(BuildReport {
        modules: report_modules,
        edges,
        solver: solver_name,
    })
}
