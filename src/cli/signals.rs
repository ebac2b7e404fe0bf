//! Signal handling for graceful shutdown

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, warn};

/// Stop flag shared between the signal task and a running job
///
/// Jobs poll it between units of work; nothing is interrupted mid-write.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Cancel `token` on the first SIGINT or SIGTERM
pub async fn setup_signal_handlers(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let (mut sigint, mut sigterm) =
            match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
                (Ok(int), Ok(term)) => (int, term),
                (Err(e), _) | (_, Err(e)) => {
                    error!("failed to install signal handlers: {}", e);
                    return;
                }
            };

        tokio::select! {
            _ = sigint.recv() => warn!("received SIGINT, stopping after the current step"),
            _ = sigterm.recv() => warn!("received SIGTERM, stopping after the current step"),
        }

        token.cancel();
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            return;
        }
        warn!("received Ctrl+C, stopping after the current step");
        token.cancel();
    }
}
