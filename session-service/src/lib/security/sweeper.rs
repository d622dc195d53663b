use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::domain::session::errors::RepositoryError;
use crate::domain::session::ports::TokenRepository;
use crate::security::rate_limit::RateLimiter;
use crate::security::revocation::RevocationCache;

/// Error for a failed sweep pass
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SweepError {
    #[error("Token store sweep failed: {0}")]
    Store(#[from] RepositoryError),
}

/// Idempotent periodic cleanup job.
#[async_trait]
pub trait Sweep: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Run one pass.
    ///
    /// # Returns
    /// Number of purged entries
    ///
    /// # Errors
    /// * `Store` - Backing store failed; the next tick retries
    async fn sweep(&self) -> Result<u64, SweepError>;
}

#[async_trait]
impl Sweep for RevocationCache {
    fn name(&self) -> &'static str {
        "revocation_cache"
    }

    async fn sweep(&self) -> Result<u64, SweepError> {
        Ok(self.sweep_expired().await as u64)
    }
}

#[async_trait]
impl Sweep for RateLimiter {
    fn name(&self) -> &'static str {
        "rate_limiter"
    }

    async fn sweep(&self) -> Result<u64, SweepError> {
        Ok(self.sweep_idle().await as u64)
    }
}

/// Deletes expired refresh, verification and reset tokens from the store.
pub struct ExpiredTokenSweeper<TR>
where
    TR: TokenRepository,
{
    tokens: Arc<TR>,
}

impl<TR> ExpiredTokenSweeper<TR>
where
    TR: TokenRepository,
{
    pub fn new(tokens: Arc<TR>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl<TR> Sweep for ExpiredTokenSweeper<TR>
where
    TR: TokenRepository,
{
    fn name(&self) -> &'static str {
        "expired_tokens"
    }

    async fn sweep(&self) -> Result<u64, SweepError> {
        Ok(self.tokens.sweep_expired().await?)
    }
}

/// Run `task` every `period` until `shutdown` is cancelled.
///
/// The first pass happens one full period after start. Failed passes are
/// logged and retried on the next tick.
pub fn spawn_sweeper<S>(task: Arc<S>, period: Duration, shutdown: CancellationToken) -> JoinHandle<()>
where
    S: Sweep,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(sweeper = task.name(), period_secs = period.as_secs(), "Sweeper started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(sweeper = task.name(), "Sweeper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    match task.sweep().await {
                        Ok(0) => {}
                        Ok(purged) => {
                            tracing::debug!(sweeper = task.name(), purged, "Sweep completed");
                        }
                        Err(e) => {
                            tracing::error!(sweeper = task.name(), error = %e, "Sweep failed");
                        }
                    }
                }
            }
        }
    })
}
