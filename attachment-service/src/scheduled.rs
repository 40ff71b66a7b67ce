//! Cooperative periodic tick driver. The interval is measured between tick
//! starts; a tick that outlasts the interval skips the missed firings, and
//! ticks of one service never overlap.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{error, info};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Error)]
pub enum TickError {
    /// Logged and contained; the service keeps ticking.
    #[error("{0}")]
    Recoverable(Box<dyn std::error::Error + Send + Sync>),
    /// Stops the loop; surfaced through the service handle.
    #[error("{0}")]
    Fatal(String),
}

impl TickError {
    pub fn recoverable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Recoverable(Box::new(err))
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service {service} stopped on fatal error: {reason}")]
    Fatal { service: String, reason: String },
    #[error("service task aborted: {0}")]
    Join(String),
}

#[async_trait]
pub trait ScheduledService: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn tick(&self) -> Result<(), TickError>;
}

/// Starts the tick loop. The first tick fires one full interval after spawn.
pub fn spawn(service: Arc<dyn ScheduledService>, interval: Duration) -> ServiceHandle {
    let (shutdown, receiver) = watch::channel(false);
    let task = tokio::spawn(run_loop(service, interval, receiver));
    ServiceHandle { shutdown, task }
}

async fn run_loop(
    service: Arc<dyn ScheduledService>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ServiceError> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // interval fires immediately on creation; the loop below owns the cadence
    ticker.tick().await;
    info!("{} started, ticking every {:?}", service.name(), interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match service.tick().await {
                    Ok(()) => {}
                    Err(TickError::Recoverable(err)) => {
                        error!("{} tick failed: {err}", service.name());
                    }
                    Err(TickError::Fatal(reason)) => {
                        error!("{} stopping on fatal error: {reason}", service.name());
                        return Err(ServiceError::Fatal {
                            service: service.name().to_string(),
                            reason,
                        });
                    }
                }
            }
            _ = shutdown.changed() => {
                info!("{} stopped", service.name());
                return Ok(());
            }
        }
    }
}

pub struct ServiceHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Result<(), ServiceError>>,
}

impl ServiceHandle {
    /// Signals shutdown and waits for any in-flight tick to finish.
    pub async fn stop(self) -> Result<(), ServiceError> {
        let _ = self.shutdown.send(true);
        self.join().await
    }

    /// Waits for the loop to exit without signalling shutdown.
    pub async fn join(self) -> Result<(), ServiceError> {
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(ServiceError::Join(err.to_string())),
        }
    }

    /// Completes when the loop exits on its own, e.g. on a fatal tick.
    /// Must not be polled again once it has completed.
    pub async fn wait(&mut self) -> Result<(), ServiceError> {
        match (&mut self.task).await {
            Ok(result) => result,
            Err(err) => Err(ServiceError::Join(err.to_string())),
        }
    }
}
