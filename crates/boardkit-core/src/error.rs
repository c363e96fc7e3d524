use thiserror::Error;

use crate::board::BoardState;

/// Structurally invalid input: bad transform parameters, unknown or
/// self-referencing definitions, malformed instance names.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("circular transform radius must be finite and non-negative, got {0} mm")]
    InvalidRadius(f64),

    #[error("transform parameter '{0}' must be finite")]
    NonFinite(&'static str),

    #[error("definition '{0}' not found in part library")]
    UnknownDefinition(String),

    #[error("definition '{0}' instantiates itself")]
    RecursiveDefinition(String),

    #[error("net '{net}' needs string parameter '{name}'")]
    MissingParameter { name: String, net: String },

    #[error("invalid instance name '{0}'")]
    InvalidInstanceName(String),
}

/// A net alias that would make canonicalization loop forever.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("net alias cycle: {}", .chain.join(" -> "))]
pub struct AliasCycleError {
    /// The offending chain, starting and ending at the same name.
    pub chain: Vec<String>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("duplicate instance name '{path}'")]
    DuplicateInstance { path: String },

    #[error("cannot {operation} while the board is {state}")]
    Sequencing {
        operation: &'static str,
        state: BoardState,
    },

    #[error(transparent)]
    AliasCycle(#[from] AliasCycleError),

    #[error("circuit DRC found {0} composite violation(s)")]
    CompositeCheck(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
