use biosim_kernel::{SolverError, WiringError};
use std::path::PathBuf;

/// Errors from loading or applying a wiring document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported wiring file type: '{extension}'")]
    UnsupportedFormat { extension: String },
    #[error("module '{alias}': unknown module type '{type_name}'")]
    UnknownModuleType { alias: String, type_name: String },
    #[error("invalid args for module type '{type_name}': {reason}")]
    InvalidArgs { type_name: String, reason: String },
    #[error(transparent)]
    Wiring(#[from] WiringError),
    #[error(transparent)]
    Solver(#[from] SolverError),
}
