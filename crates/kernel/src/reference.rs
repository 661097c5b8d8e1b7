//! Port reference strings: `alias.port`, `alias.out.port`, `alias.in.port`.
//!
//! The direction token is documentation only and never affects routing.

use crate::error::WiringError;
use std::fmt;
use std::str::FromStr;

/// Optional direction token written in a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

/// A parsed `alias.port` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRef {
    pub alias: String,
    pub direction: Option<Direction>,
    pub port: String,
}

impl PortRef {
    /// Parse a reference string.
    ///
    /// Splits on the first `.`: the head is the alias and the remainder is
    /// `out.<port>`, `in.<port>` or a bare `<port>`. A bare remainder keeps
    /// any further dots as part of the port name.
    pub fn parse(reference: &str) -> Result<Self, WiringError> {
        let malformed = || WiringError::MalformedReference {
            reference: reference.to_string(),
        };
        let (alias, rest) = reference.split_once('.').ok_or_else(malformed)?;
        if alias.is_empty() || rest.is_empty() {
            return Err(malformed());
        }
        let (direction, port) = match rest.split_once('.') {
            Some(("out", port)) => (Some(Direction::Out), port),
            Some(("in", port)) => (Some(Direction::In), port),
            _ => (None, rest),
        };
        if port.is_empty() {
            return Err(malformed());
        }
        Ok(Self {
            alias: alias.to_string(),
            direction,
            port: port.to_string(),
        })
    }
}

impl FromStr for PortRef {
    type Err = WiringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Some(Direction::Out) => write!(f, "{}.out.{}", self.alias, self.port),
            Some(Direction::In) => write!(f, "{}.in.{}", self.alias, self.port),
            None => write!(f, "{}.{}", self.alias, self.port),
        }
    }
}
