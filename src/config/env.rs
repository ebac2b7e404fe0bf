//! Environment variable snapshot
//!
//! Jobs receive their credentials through the environment. The snapshot is
//! taken once at startup so the rest of the program never reads `std::env`
//! directly.

use super::error::ConfigError;
use std::collections::HashMap;

pub const GCP_SA_KEY: &str = "GCP_SA_KEY";
pub const FIREBASE_PROJECT_ID: &str = "FIREBASE_PROJECT_ID";
pub const FIREBASE_PLATFORM_COLLECTION: &str = "FIREBASE_PLATFORM_COLLECTION";
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const FIRESTORE_EMULATOR_HOST: &str = "FIRESTORE_EMULATOR_HOST";

/// Variables every Firestore-backed job needs
pub const FIREBASE_VARS: &[&str] = &[GCP_SA_KEY, FIREBASE_PROJECT_ID, FIREBASE_PLATFORM_COLLECTION];

const KNOWN_VARS: &[&str] = &[
    GCP_SA_KEY,
    FIREBASE_PROJECT_ID,
    FIREBASE_PLATFORM_COLLECTION,
    ANTHROPIC_API_KEY,
    FIRESTORE_EMULATOR_HOST,
];

/// Snapshot of the environment variables the jobs consume
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Capture the known variables from the current process
    pub fn from_process() -> Self {
        let vars = KNOWN_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok().map(|v| (name.to_string(), v)))
            .collect();
        Self { vars }
    }

    /// Build a snapshot from explicit pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Get a variable; empty values count as unset
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Fail with every missing name when any of `names` is unset
    pub fn require(&self, names: &[&str]) -> Result<(), ConfigError> {
        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| self.get(name).is_none())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::missing_env(missing))
        }
    }

    /// Get a variable that has already been validated with [`require`](Self::require)
    pub fn required(&self, name: &str) -> Result<&str, ConfigError> {
        self.get(name)
            .ok_or_else(|| ConfigError::missing_env([name]))
    }

    pub fn collection(&self) -> Result<&str, ConfigError> {
        self.required(FIREBASE_PLATFORM_COLLECTION)
    }

    pub fn emulator_host(&self) -> Option<&str> {
        self.get(FIRESTORE_EMULATOR_HOST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_all_present() {
        let env = Environment::from_pairs([
            (GCP_SA_KEY, "{}"),
            (FIREBASE_PROJECT_ID, "proj"),
            (FIREBASE_PLATFORM_COLLECTION, "platforms"),
        ]);
        assert!(env.require(FIREBASE_VARS).is_ok());
        assert_eq!(env.collection().unwrap(), "platforms");
    }

    #[test]
    fn test_require_reports_every_missing_name_in_order() {
        let env = Environment::from_pairs([(FIREBASE_PROJECT_ID, "proj")]);
        let err = env.require(FIREBASE_VARS).unwrap_err();
        match err {
            ConfigError::MissingEnv { names } => {
                assert_eq!(names, vec![GCP_SA_KEY, FIREBASE_PLATFORM_COLLECTION]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let env = Environment::from_pairs([(ANTHROPIC_API_KEY, "  ")]);
        assert!(env.get(ANTHROPIC_API_KEY).is_none());
        assert!(env.require(&[ANTHROPIC_API_KEY]).is_err());
    }

    #[test]
    fn test_emulator_host() {
        let env = Environment::from_pairs([(FIRESTORE_EMULATOR_HOST, "localhost:8080")]);
        assert_eq!(env.emulator_host(), Some("localhost:8080"));
        assert!(Environment::default().emulator_host().is_none());
    }
}
