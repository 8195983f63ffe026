//! Error types for dsactl

use dsa_switch::DsaError;
use thiserror::Error;

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be parsed
    #[error("Parse error in {path}: {message}")]
    Parse { path: String, message: String },

    /// The file parsed but describes an impossible system
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid(message.into())
    }
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors from running a command against an attached system
#[derive(Error, Debug)]
pub enum CommandError {
    /// The DSA layer refused the operation
    #[error(transparent)]
    Dsa(#[from] DsaError),

    /// Rendering the output failed
    #[error("Failed to format output")]
    Format(#[from] std::fmt::Error),
}

impl CommandError {
    /// Negative errno of the underlying DSA failure, if any.
    pub fn errno(&self) -> Option<i32> {
        match self {
            CommandError::Dsa(e) => Some(e.errno()),
            CommandError::Format(_) => None,
        }
    }
}

/// Result type for commands
pub type CommandResult<T> = std::result::Result<T, CommandError>;
