use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Configuration file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Failed to read configuration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {message}")]
    Parse { message: String },

    #[error("Invalid configuration value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Invalid environment override {variable}: {message}")]
    EnvOverride { variable: String, message: String },
}

impl ConfigurationError {
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn env_override(variable: impl Into<String>, message: impl ToString) -> Self {
        Self::EnvOverride {
            variable: variable.into(),
            message: message.to_string(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
