// Periodic activation scheduler
//
// One explicitly constructed recurring task instead of an ambient global
// trigger: the scheduler owns the engine reference and a cancellation token,
// and `stop()` shuts the loop down cleanly.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dispatch::DispatchEngine;
use crate::store::RideStore;

/// Runs the activation pass on a fixed interval until stopped
pub struct ActivationScheduler<S> {
    engine: Arc<DispatchEngine<S>>,
    interval: Duration,
    shutdown_token: CancellationToken,
}

impl<S: RideStore> ActivationScheduler<S> {
    pub fn new(engine: Arc<DispatchEngine<S>>, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Spawn the recurring task. The first pass runs one full interval after
    /// startup; every pass is bounded by the store's transaction timeouts,
    /// so the loop always reaches its next tick.
    pub fn spawn(&self) -> JoinHandle<()> {
        let engine = self.engine.clone();
        let shutdown = self.shutdown_token.clone();
        let period = self.interval;

        tracing::info!(interval_secs = period.as_secs(), "Starting activation scheduler");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // Consume the immediate first tick so passes start one period in
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("Activation scheduler shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        engine.run_activation_pass(Utc::now()).await;
                    }
                }
            }
        })
    }

    /// Request a clean shutdown; the loop exits before its next pass
    pub fn stop(&self) {
        self.shutdown_token.cancel();
    }
}
