use async_trait::async_trait;
use rentwatch_core::Result;
use rentwatch_scheduler::Tick;
use rentwatch_storage::SeenStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, info};

use crate::discovery::ListingSource;
use crate::workflow::ListingProcessor;

/// Counts for one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub discovered: usize,
    pub already_seen: usize,
    pub handled: usize,
    pub failed: usize,
    /// Stopped early on a shutdown signal.
    pub interrupted: bool,
}

/// Drives discovery and per-listing processing. The only writer of the seen
/// store.
pub struct Coordinator<S, P> {
    source: S,
    processor: P,
    store: Arc<SeenStore>,
    pause: Duration,
}

impl<S: ListingSource, P: ListingProcessor> Coordinator<S, P> {
    pub fn new(source: S, processor: P, store: Arc<SeenStore>) -> Self {
        Self {
            source,
            processor,
            store,
            pause: Duration::from_secs(2),
        }
    }

    /// Pause between two processed listings.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// One discovery pass. A discovery error aborts the tick; per-listing
    /// failures never do.
    pub async fn run_tick(&self, shutdown: &mut broadcast::Receiver<()>) -> Result<TickReport> {
        let candidates = self.source.discover().await?;
        let mut report = TickReport {
            discovered: candidates.len(),
            ..TickReport::default()
        };

        let mut processed_any = false;
        for id in &candidates {
            if self.store.contains(id) {
                report.already_seen += 1;
                continue;
            }
            if shutdown_requested(shutdown) {
                report.interrupted = true;
                break;
            }
            if processed_any {
                tokio::select! {
                    _ = tokio::time::sleep(self.pause) => {}
                    _ = shutdown_signal(shutdown) => {
                        report.interrupted = true;
                        break;
                    }
                }
            }
            processed_any = true;

            debug!(listing = %id, "Processing listing");
            let outcome = self.processor.process(id).await;
            if outcome.is_handled() {
                self.store.record(id);
                report.handled += 1;
            } else {
                report.failed += 1;
            }
        }

        if report.interrupted {
            info!(
                handled = report.handled,
                failed = report.failed,
                "Tick interrupted by shutdown"
            );
        } else {
            info!(
                discovered = report.discovered,
                already_seen = report.already_seen,
                handled = report.handled,
                failed = report.failed,
                "Tick complete"
            );
        }
        Ok(report)
    }
}

#[async_trait]
impl<S: ListingSource, P: ListingProcessor> Tick for Coordinator<S, P> {
    async fn tick(&self, shutdown: &mut broadcast::Receiver<()>) -> Result<()> {
        self.run_tick(shutdown).await.map(|_| ())
    }
}

/// A dropped sender is not a shutdown request.
fn shutdown_requested(shutdown: &mut broadcast::Receiver<()>) -> bool {
    match shutdown.try_recv() {
        Ok(()) | Err(TryRecvError::Lagged(_)) => true,
        Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => false,
    }
}

async fn shutdown_signal(shutdown: &mut broadcast::Receiver<()>) {
    match shutdown.recv().await {
        Ok(()) | Err(RecvError::Lagged(_)) => {}
        Err(RecvError::Closed) => std::future::pending::<()>().await,
    }
}
