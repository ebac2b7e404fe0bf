//! CLI command implementations
//!
//! Each command validates its environment before touching the network and
//! returns the process exit code.

use super::output::OutputMode;
use super::signals::CancellationToken;
use crate::config::{
    ANTHROPIC_API_KEY, AppConfig, Environment, FIREBASE_PLATFORM_COLLECTION, FIREBASE_PROJECT_ID,
    FIREBASE_VARS, GCP_SA_KEY, StoreBackend, expand_path,
};
use crate::firestore;
use crate::health::{HealthChecker, prune_unreachable};
use crate::llm::{LlmClient, RetryPolicy, create_client};
use crate::ops::{CollectionOps, Operation};
use crate::platform::{PlatformUpdater, UpdateOptions, group_by_category, load_platforms};
use crate::publish::{CommitOutcome, GitRepo};
use crate::readme::{self, WriteOutcome};
use crate::store::{DocumentStore, FirestoreStore, SqliteStore};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const FIRESTORE_TIMEOUT: Duration = Duration::from_secs(60);

/// Exit code for a run stopped by a signal (128 + SIGINT)
pub const EXIT_CANCELLED: i32 = 130;

/// Shared state for one invocation
pub struct CommandContext {
    pub config: AppConfig,
    pub env: Environment,
    pub backend: StoreBackend,
    pub cancel: CancellationToken,
    /// Config files that were merged, in load order
    pub config_files: Vec<PathBuf>,
}

impl CommandContext {
    /// Variables a job needs on the selected backend
    fn required_vars(&self, needs_llm: bool) -> Vec<&'static str> {
        let mut vars: Vec<&'static str> = match self.backend {
            StoreBackend::Firestore if self.env.emulator_host().is_some() => {
                vec![FIREBASE_PROJECT_ID, FIREBASE_PLATFORM_COLLECTION]
            }
            StoreBackend::Firestore => FIREBASE_VARS.to_vec(),
            StoreBackend::Sqlite => vec![FIREBASE_PLATFORM_COLLECTION],
        };
        if needs_llm {
            vars.push(ANTHROPIC_API_KEY);
        }
        vars
    }

    fn require(&self, needs_llm: bool) -> Result<()> {
        self.env.require(&self.required_vars(needs_llm))?;
        Ok(())
    }

    async fn open_store(&self) -> Result<Box<dyn DocumentStore>> {
        match self.backend {
            StoreBackend::Firestore => {
                let project_id = self.env.required(FIREBASE_PROJECT_ID)?;
                let retry = RetryPolicy {
                    max_retries: self.config.store.max_retries,
                    ..Default::default()
                };
                let client = firestore::connect(&self.env, project_id, FIRESTORE_TIMEOUT)
                    .context("Error initializing Firebase")?
                    .with_retry(retry);
                Ok(Box::new(FirestoreStore::new(client)))
            }
            StoreBackend::Sqlite => {
                let path = expand_path(&self.config.store.sqlite_path);
                let store = SqliteStore::open(&path)
                    .with_context(|| format!("Failed to open store at {}", path.display()))?;
                info!("Using local store at {}", path.display());
                Ok(Box::new(store))
            }
        }
    }
}

/// Options for `generate-readme`
#[derive(Debug, Clone, Default)]
pub struct ReadmeArgs {
    pub output: Option<PathBuf>,
    pub check_urls: bool,
    pub commit: bool,
    pub push: bool,
}

/// Render README.md from the collection, optionally pruning dead URLs and
/// committing the result
pub async fn generate_readme(ctx: &CommandContext, args: &ReadmeArgs) -> Result<i32> {
    ctx.require(false)?;
    let collection = ctx.env.collection()?;
    let store = ctx.open_store().await?;

    let platforms = load_platforms(store.as_ref(), collection)
        .await
        .context("Error retrieving platforms")?;
    let mut catalog = group_by_category(platforms);

    if args.check_urls {
        let checker = Arc::new(HealthChecker::new(&ctx.config.health)?);
        catalog = prune_unreachable(
            checker,
            store.as_ref(),
            collection,
            catalog,
            ctx.config.health.concurrency,
        )
        .await;
    }

    let content = readme::generate(&catalog, &ctx.config.readme, chrono::Utc::now())?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&ctx.config.readme.output));

    if readme::write_if_changed(&output, &content)? == WriteOutcome::Unchanged {
        info!("{} is already up to date", output.display());
    }

    if args.commit {
        let repo = GitRepo::new(repo_dir(&output));
        let file = output.file_name().map(Path::new).unwrap_or(&output);
        let outcome = repo
            .commit_if_changed(file, &ctx.config.readme.commit_message)
            .await?;
        if outcome == CommitOutcome::Committed && args.push {
            repo.push().await?;
        }
    }

    Ok(0)
}

/// Directory git runs in for `output`
fn repo_dir(output: &Path) -> PathBuf {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Options for `update-platforms`
#[derive(Debug, Clone, Default)]
pub struct UpdateArgs {
    /// Aims to run instead of the configured list
    pub aims: Vec<String>,
    pub dry_run: bool,
}

/// Ask the model for platforms and upsert them into the collection
pub async fn update_platforms(ctx: &CommandContext, args: &UpdateArgs) -> Result<i32> {
    ctx.require(true)?;
    let collection = ctx.env.collection()?;
    let api_key = ctx.env.required(ANTHROPIC_API_KEY)?;

    let llm = create_client(&ctx.config.llm, api_key)?;
    let store = ctx.open_store().await?;
    info!("Using {} via {}", llm.name(), store.name());

    let options = UpdateOptions {
        aims: if args.aims.is_empty() {
            ctx.config.update.aims.clone()
        } else {
            args.aims.clone()
        },
        batch_size: ctx.config.update.batch_size,
        dry_run: args.dry_run,
        system_prompt: ctx.config.llm.system_prompt.clone(),
        as_of: None,
    };

    let updater = PlatformUpdater::new(&llm, store.as_ref(), collection);
    let summary = updater.run(&options, &ctx.cancel).await;

    if summary.cancelled {
        warn!("Update stopped by signal");
        return Ok(EXIT_CANCELLED);
    }
    if summary.all_aims_failed() {
        error!("No aim produced platform data");
        return Ok(1);
    }
    Ok(0)
}

/// Run one collection operation
pub async fn run_operation(
    ctx: &CommandContext,
    op: Operation,
    doc_id: Option<&str>,
    mode: OutputMode,
) -> Result<i32> {
    ctx.require(false)?;
    let collection = ctx.env.collection()?;
    let store = ctx.open_store().await?;

    let ops = CollectionOps::new(store.as_ref(), collection, ctx.config.store.batch_size);
    let mut stdout = std::io::stdout();
    ops.execute(op, doc_id, &mut stdout, mode)
        .await
        .with_context(|| format!("Error running {} operation", op))?;
    Ok(0)
}

/// Check environment, configuration, and tools
pub async fn doctor(ctx: &CommandContext) -> i32 {
    println!("Environment:");
    let mut missing = 0;
    for name in [
        GCP_SA_KEY,
        FIREBASE_PROJECT_ID,
        FIREBASE_PLATFORM_COLLECTION,
        ANTHROPIC_API_KEY,
    ] {
        let set = ctx.env.get(name).is_some();
        if !set && ctx.required_vars(true).contains(&name) {
            missing += 1;
        }
        println!("  {} {}", if set { "✓" } else { "✗" }, name);
    }
    if let Some(host) = ctx.env.emulator_host() {
        println!("  ✓ FIRESTORE_EMULATOR_HOST = {}", host);
    }

    println!("\nConfiguration:");
    if ctx.config_files.is_empty() {
        println!("  config files: (none)");
    }
    for path in &ctx.config_files {
        println!("  config file: {}", path.display());
    }
    println!("  store: {:?}", ctx.backend);
    if ctx.backend == StoreBackend::Sqlite {
        println!("  sqlite path: {}", expand_path(&ctx.config.store.sqlite_path).display());
    }
    println!("  model: {}", ctx.config.llm.model);
    println!("  readme: {} ({})", ctx.config.readme.output, ctx.config.readme.timezone);

    if let Some(raw) = ctx.env.get(GCP_SA_KEY) {
        match firestore::ServiceAccountKey::from_json(raw) {
            Ok(key) => println!("  service account: {}", key.client_email),
            Err(e) => {
                missing += 1;
                println!("  ✗ {}", e);
            }
        }
    }

    println!("\nTools:");
    let git = tokio::process::Command::new("git")
        .arg("--version")
        .output()
        .await;
    match git {
        Ok(out) if out.status.success() => {
            println!("  ✓ {}", String::from_utf8_lossy(&out.stdout).trim())
        }
        _ => println!("  ✗ git not found (needed for --commit)"),
    }

    if missing == 0 { 0 } else { 1 }
}
