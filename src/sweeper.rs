//! Background retention sweeper
//!
//! Reclaims storage held by expired artifacts. Visibility never depends on
//! it: the store refuses expired reads on its own.

use crate::store::ArtifactStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Periodically deletes expired artifacts from one store
pub struct Sweeper {
    store: Arc<ArtifactStore>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(store: Arc<ArtifactStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Run one sweep on the blocking pool.
    ///
    /// Returns the number of artifacts removed, or `None` if another sweep
    /// of the same store was still running and this one was skipped.
    pub async fn tick(&self) -> Option<usize> {
        let store = self.store.clone();
        let result =
            tokio::task::spawn_blocking(move || store.try_delete_expired(store.now())).await;

        match result {
            Ok(Some(removed)) => {
                if removed > 0 {
                    tracing::info!(
                        removed,
                        remaining = self.store.len(),
                        "Swept expired artifacts"
                    );
                } else {
                    tracing::debug!("Sweep found no expired artifacts");
                }
                Some(removed)
            }
            Ok(None) => {
                tracing::debug!("Previous sweep still running, skipping tick");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "Sweep task failed");
                None
            }
        }
    }

    /// Sweep every `interval` until `shutdown` is cancelled
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // Skip the first immediate tick
            ticker.tick().await;

            tracing::info!(interval_secs = self.interval.as_secs(), "Retention sweeper started");

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        self.tick().await;
                    }
                }
            }

            tracing::info!("Retention sweeper stopped");
        })
    }
}
