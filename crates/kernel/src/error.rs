use std::fmt;

/// Which side of a connection a port belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Errors raised while building or editing the wiring graph.
///
/// `context` is the connection being attempted, e.g.
/// `connect eye.out.nope -> lgn.in.retina`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WiringError {
    #[error("malformed reference '{reference}': expected 'alias.port' or 'alias.in|out.port'")]
    MalformedReference { reference: String },
    #[error("module alias already registered: '{alias}'")]
    DuplicateAlias { alias: String },
    #[error("{context}: unknown module '{alias}'")]
    UnknownModule { context: String, alias: String },
    #[error("{context}: module '{alias}' has no {direction} port '{port}'")]
    PortNotDeclared {
        context: String,
        alias: String,
        port: String,
        direction: PortDirection,
        declared: Vec<String>,
    },
}

/// Failure reported by a listener or module callback.
///
/// The world logs and suppresses these so one broken handler cannot stall a
/// run.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    Wiring(#[from] WiringError),
}

impl HandlerError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}
