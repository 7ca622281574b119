use super::share_ledger::ShareLedger;
use crate::config::RetentionSettings;
use log::{error, info};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Periodic out-of-band run of [`ShareLedger::flush_stale`].
pub struct StaleSweeper {
    shares: ShareLedger,
    window: Duration,
    large_window: Duration,
    interval: Duration,
}

impl StaleSweeper {
    pub fn new(shares: ShareLedger, retention: &RetentionSettings) -> Self {
        Self {
            shares,
            window: retention.window(),
            large_window: retention.large_window(),
            interval: retention.sweep_interval(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sweeps on every tick until `shutdown` flips to `true` or its sender
    /// goes away. A failed sweep is logged and retried on the next tick.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut ticker = tokio::time::interval(self.interval);
        let mut removed = 0u64;
        info!(target: "shares", "Stale share sweeper started, every {:?}", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.shares.flush_stale(self.window, self.large_window).await {
                        Ok(n) => removed += n,
                        Err(e) => error!(target: "shares", "Stale share sweep failed: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(target: "shares", "Stale share sweeper stopped, {} entries removed", removed);
        removed
    }

    pub fn spawn(self) -> (watch::Sender<bool>, JoinHandle<u64>) {
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(self.run(rx));
        (tx, handle)
    }
}
