//! Command-line surface: job implementations, document output, and signal
//! handling

pub mod commands;
pub mod output;
pub mod signals;

pub use commands::{CommandContext, ReadmeArgs, UpdateArgs};
pub use output::OutputMode;
pub use signals::{CancellationToken, setup_signal_handlers};
