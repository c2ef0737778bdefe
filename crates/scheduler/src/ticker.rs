use async_trait::async_trait;
use chrono::Local;
use rentwatch_core::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Work performed once per tick.
///
/// Each tick gets its own shutdown receiver so a long-running tick can stop at
/// a safe boundary. The service still sees the same signal once it returns.
#[async_trait]
pub trait Tick: Send + Sync {
    async fn tick(&self, shutdown: &mut broadcast::Receiver<()>) -> Result<()>;
}

/// Runs a `Tick` at a fixed interval, first run immediately.
///
/// A tick always completes before the next interval is awaited, so two ticks
/// never run at the same time.
pub struct TickService {
    name: String,
    interval: Duration,
    task: Arc<dyn Tick>,
}

impl TickService {
    pub fn new(name: impl Into<String>, task: Arc<dyn Tick>) -> Self {
        Self {
            name: name.into(),
            interval: Duration::from_secs(30 * 60), // 30 minutes
            task,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn run_loop(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!(
            service = %self.name,
            interval_secs = self.interval.as_secs(),
            "TickService started"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // Shutdown first: a tick that overran the interval leaves the next
            // tick already due.
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!(service = %self.name, "TickService shutting down");
                    break;
                }
                _ = interval.tick() => {
                    info!(service = %self.name, at = %Local::now().format("%Y-%m-%d %H:%M:%S"), "Tick");
                    let mut tick_shutdown = shutdown.resubscribe();
                    if let Err(e) = self.task.tick(&mut tick_shutdown).await {
                        error!(service = %self.name, error = %e, "Tick failed");
                    }
                }
            }
        }
    }
}
