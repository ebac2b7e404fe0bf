use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const CRATE_TARGET: &str = "awesome_platforms";

/// Filter for the crate's own events; `RUST_LOG` wins when set
fn build_filter(debug: bool, quiet: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = if debug {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };
    EnvFilter::new(format!("{}={}", CRATE_TARGET, level))
}

/// Initialize logging to stderr and optionally to a file
///
/// The returned guard flushes the file writer on drop and must be held
/// until the process exits.
pub fn init_logging(
    debug: bool,
    quiet: bool,
    log_file: Option<&Path>,
) -> anyhow::Result<Option<WorkerGuard>> {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_line_number(debug)
        .with_file(debug)
        .with_writer(std::io::stderr);

    let registry = tracing_subscriber::registry()
        .with(build_filter(debug, quiet))
        .with(fmt_layer);

    let Some(log_path) = log_file else {
        registry.try_init()?;
        return Ok(None);
    };

    if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    // one JSON object per line
    let file_layer = fmt::layer()
        .json()
        .with_writer(writer)
        .with_target(true)
        .with_line_number(true)
        .with_file(true);

    registry.with(file_layer).try_init()?;
    Ok(Some(guard))
}

/// Default log file path for a job run
pub fn default_log_path(job: &str) -> anyhow::Result<PathBuf> {
    let log_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join("awesome-platforms")
        .join("logs");

    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    Ok(log_dir.join(format!("{}-{}.log", job, timestamp)))
}
