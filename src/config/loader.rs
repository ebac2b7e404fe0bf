//! Configuration loading with multi-layer merge

use super::error::ConfigError;
use super::{HealthConfig, LlmConfig, ReadmeConfig, StoreConfig, UpdateConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "awesome-platforms";

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub readme: ReadmeConfig,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub update: UpdateConfig,
}

impl AppConfig {
    /// Load configuration from the standard hierarchy
    ///
    /// Load order (later overrides earlier):
    /// 1. Built-in defaults
    /// 2. ~/.config/awesome-platforms/config.toml
    /// 3. .awesome-platforms/config.toml (project)
    /// 4. An explicit `--config` file, which must exist
    pub fn load(project_dir: Option<&Path>, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                }
                .into());
            }
        }

        let mut merged = toml::Table::new();
        for path in Self::layer_paths(project_dir, explicit) {
            merge_tables(&mut merged, Self::load_table(&path)?);
        }

        let config: Self = toml::Value::Table(merged)
            .try_into()
            .context("merging configuration layers")?;
        config.validate()?;
        Ok(config)
    }

    /// Config files that exist, in the order `load` merges them
    pub fn layer_paths(project_dir: Option<&Path>, explicit: Option<&Path>) -> Vec<PathBuf> {
        let project_config_path = project_dir
            .map(|p| p.join(".awesome-platforms/config.toml"))
            .unwrap_or_else(|| PathBuf::from(".awesome-platforms/config.toml"));

        Self::user_config_path()
            .into_iter()
            .chain(Some(project_config_path))
            .chain(explicit.map(Path::to_path_buf))
            .filter(|path| path.exists())
            .collect()
    }

    /// Load configuration from a specific file
    pub fn load_file(path: &Path) -> Result<Self> {
        let table = Self::load_table(path)?;
        let config: Self = toml::Value::Table(table)
            .try_into()
            .with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read one layer, rejecting unknown keys before it is merged
    fn load_table(path: &Path) -> Result<toml::Table> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let table: toml::Table =
            toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
        let _: Self = toml::Value::Table(table.clone())
            .try_into()
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(table)
    }

    /// Get the user config path (~/.config/awesome-platforms/config.toml)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR).join("config.toml"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.batch_size == 0 || self.store.batch_size > 500 {
            return Err(ConfigError::invalid(format!(
                "store.batch_size must be between 1 and 500, got {}",
                self.store.batch_size
            )));
        }
        if self.health.concurrency == 0 {
            return Err(ConfigError::invalid("health.concurrency must be at least 1"));
        }
        if self.update.aims.is_empty() {
            return Err(ConfigError::invalid("update.aims must not be empty"));
        }
        if self.readme.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::invalid(format!(
                "unknown timezone '{}'",
                self.readme.timezone
            )));
        }
        Ok(())
    }
}

/// Expand `~` in a configured path
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

/// Recursively merge `other` into `base` (other wins, tables merge key by key)
fn merge_tables(base: &mut toml::Table, other: toml::Table) {
    for (key, value) in other {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
