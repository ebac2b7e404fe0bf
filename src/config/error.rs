//! Error types for configuration and environment validation

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while assembling the runtime configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more required environment variables are unset or empty
    #[error("Missing required environment variables: {}", .names.join(", "))]
    MissingEnv { names: Vec<String> },

    /// An explicitly requested config file does not exist
    #[error("config file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    /// A config value is out of range or inconsistent
    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub fn missing_env<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MissingEnv {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_env_lists_all_names() {
        let err = ConfigError::missing_env(["GCP_SA_KEY", "FIREBASE_PROJECT_ID"]);
        assert_eq!(
            err.to_string(),
            "Missing required environment variables: GCP_SA_KEY, FIREBASE_PROJECT_ID"
        );
    }

    #[test]
    fn test_not_found_display() {
        let err = ConfigError::NotFound {
            path: PathBuf::from("/tmp/nope.toml"),
        };
        assert!(err.to_string().contains("/tmp/nope.toml"));
    }
}
