//! README generation from the platform catalog
//!
//! The catalog is turned into a [`ReadmeContext`] (ordering, ranking, and
//! cell formatting happen here) and rendered through a minijinja template.
//! The built-in template can be replaced with `readme.template`.

mod context;
mod engine;
mod error;
mod filters;

pub use context::{ReadmeContext, SiteInfo};
pub use engine::ReadmeEngine;
pub use error::ReadmeError;

use crate::config::{ReadmeConfig, expand_path};
use crate::platform::Platform;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Result of [`write_if_changed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Changed,
    Unchanged,
}

/// Render the README for `catalog` as of `now`
pub fn generate(
    catalog: &BTreeMap<String, Vec<Platform>>,
    config: &ReadmeConfig,
    now: DateTime<Utc>,
) -> Result<String, ReadmeError> {
    let tz: Tz = config
        .timezone
        .parse()
        .map_err(|_| ReadmeError::Timezone(config.timezone.clone()))?;

    let engine = match &config.template {
        Some(path) => ReadmeEngine::from_file(&expand_path(path))?,
        None => ReadmeEngine::new()?,
    };

    let site = SiteInfo {
        repository: config.repository.clone(),
        workflow_file: config.workflow_file.clone(),
    };
    let ctx = ReadmeContext::build(catalog, site, now, tz);
    let content = engine.render(&ctx)?;
    info!("Generated README content with size: {}", content.len());
    Ok(content)
}

/// Write `content` to `path` unless the file already holds exactly that
pub fn write_if_changed(path: &Path, content: &str) -> Result<WriteOutcome, ReadmeError> {
    match std::fs::read(path) {
        Ok(existing) if existing == content.as_bytes() => {
            debug!(path = %path.display(), "README unchanged");
            return Ok(WriteOutcome::Unchanged);
        }
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(ReadmeError::io(path, e)),
    }

    std::fs::write(path, content).map_err(|e| ReadmeError::io(path, e))?;
    info!("{} has been updated successfully!", path.display());
    Ok(WriteOutcome::Changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_write_if_changed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("README.md");

        assert_eq!(write_if_changed(&path, "one").unwrap(), WriteOutcome::Changed);
        assert_eq!(write_if_changed(&path, "one").unwrap(), WriteOutcome::Unchanged);
        assert_eq!(write_if_changed(&path, "two").unwrap(), WriteOutcome::Changed);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two");
    }

    #[test]
    fn test_generate_rejects_unknown_timezone() {
        let config = ReadmeConfig {
            timezone: "Mars/Olympus".into(),
            ..ReadmeConfig::default()
        };
        let err = generate(&BTreeMap::new(), &config, Utc::now()).unwrap_err();
        assert!(matches!(err, ReadmeError::Timezone(_)));
    }

    #[test]
    fn test_generate_is_stable_for_same_input() {
        let now = Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap();
        let config = ReadmeConfig::default();
        let first = generate(&BTreeMap::new(), &config, now).unwrap();
        let second = generate(&BTreeMap::new(), &config, now).unwrap();
        assert_eq!(first, second);
        assert!(first.contains("Discover 0+ legitimate ways"));
        assert!(first.contains("Last updated: 2024-09-30 20:00:00 EST"));
    }
}
