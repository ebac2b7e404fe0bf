mod cli;
mod config;
mod firestore;
mod health;
mod llm;
mod logging;
mod ops;
mod platform;
mod publish;
mod readme;
mod store;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::commands;
use cli::{CancellationToken, CommandContext, OutputMode, ReadmeArgs, UpdateArgs};
use config::{AppConfig, Environment, StoreBackend};
use ops::Operation;
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(name = "awesome-platforms")]
#[command(about = "Maintain the awesome-platforms catalog and its README")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Extra config file merged over user and project config
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store backend (overrides config)
    #[arg(long, global = true, value_enum)]
    store: Option<StoreBackend>,

    /// Also write logs to a file (default location when no path is given)
    #[arg(long, global = true, num_args = 0..=1)]
    log_file: Option<Option<PathBuf>>,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Suppress normal output
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render README.md from the platform collection
    GenerateReadme {
        /// Output path (defaults to readme.output from config)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Drop platforms whose URL does not respond, deleting them from the store
        #[arg(long)]
        check_urls: bool,

        /// Commit the README when it changed
        #[arg(long)]
        commit: bool,

        /// Push after committing
        #[arg(long, requires = "commit")]
        push: bool,
    },

    /// Ask the model for new platforms and upsert them
    UpdatePlatforms {
        /// Aim to run (repeatable; defaults to update.aims from config)
        #[arg(long = "aim")]
        aims: Vec<String>,

        /// Fetch and log platforms without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a maintenance operation on the collection
    Ops {
        #[arg(value_enum)]
        operation: Operation,

        /// Target document id
        doc_id: Option<String>,

        /// Print documents as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Check environment, configuration, and tools
    Doctor,
}

impl Commands {
    fn job_name(&self) -> &'static str {
        match self {
            Commands::GenerateReadme { .. } => "generate-readme",
            Commands::UpdatePlatforms { .. } => "update-platforms",
            Commands::Ops { .. } => "ops",
            Commands::Doctor => "doctor",
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_path = match &cli.log_file {
        Some(Some(path)) => Some(path.clone()),
        Some(None) => match logging::default_log_path(cli.command.job_name()) {
            Ok(path) => Some(path),
            Err(e) => {
                eprintln!("{:#}", e);
                std::process::exit(1);
            }
        },
        None => None,
    };

    let guard = match logging::init_logging(cli.debug, cli.quiet, log_path.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            std::process::exit(1);
        }
    };

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    };

    // exit() skips destructors, so flush the file writer first
    drop(guard);
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let config = AppConfig::load(None, cli.config.as_deref())?;
    let config_files = AppConfig::layer_paths(None, cli.config.as_deref());

    let ctx = CommandContext {
        backend: cli.store.unwrap_or(config.store.backend),
        config,
        env: Environment::from_process(),
        cancel: CancellationToken::new(),
        config_files,
    };

    match cli.command {
        Commands::GenerateReadme {
            output,
            check_urls,
            commit,
            push,
        } => {
            let args = ReadmeArgs {
                output,
                check_urls,
                commit,
                push,
            };
            commands::generate_readme(&ctx, &args).await
        }

        Commands::UpdatePlatforms { aims, dry_run } => {
            tokio::spawn(cli::setup_signal_handlers(ctx.cancel.clone()));
            commands::update_platforms(&ctx, &UpdateArgs { aims, dry_run }).await
        }

        Commands::Ops {
            operation,
            doc_id,
            json,
        } => {
            let mode = if json {
                OutputMode::Json
            } else {
                OutputMode::Console
            };
            commands::run_operation(&ctx, operation, doc_id.as_deref(), mode).await
        }

        Commands::Doctor => Ok(commands::doctor(&ctx).await),
    }
}
