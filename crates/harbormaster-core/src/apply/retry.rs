//! Bounded retries for a single release action.
//!
//! Only atomic actions are retried: without rollback-on-failure a second attempt would
//! run over a half-applied release.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::EngineError;

/// Something that can be applied to the cluster, possibly more than once.
#[async_trait]
pub trait Applicable: Send + Sync {
    fn release_name(&self) -> &str;

    /// Whether a failed apply rolls back its own partial state.
    fn is_atomic(&self) -> bool;

    async fn apply(&self) -> anyhow::Result<()>;
}

/// Counts failed attempts and decides whether another is allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPredicate {
    attempts: u32,
    max_retries: u32,
    atomic: bool,
}

impl RetryPredicate {
    /// `max_retries` counts calls after the first one, so at most `max_retries + 1` applies.
    pub fn new(max_retries: u32, atomic: bool) -> Self {
        Self {
            attempts: 0,
            max_retries,
            atomic,
        }
    }

    /// Record a failed attempt and report whether to try again.
    pub fn should_retry(&mut self, _err: &anyhow::Error) -> bool {
        let retries = self.attempts;
        self.attempts += 1;
        self.atomic && retries < self.max_retries
    }

    /// Failed attempts recorded so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Apply `action`, retrying atomic failures every `interval` up to `max_retries` times.
///
/// Cancellation aborts immediately, including mid-apply and mid-wait.
pub async fn retry_apply(
    cancel: &CancellationToken,
    action: &dyn Applicable,
    interval: Duration,
    max_retries: u32,
) -> Result<(), EngineError> {
    let started = Instant::now();
    let mut predicate = RetryPredicate::new(max_retries, action.is_atomic());

    loop {
        debug!(release = action.release_name(), attempt = predicate.attempts() + 1, "applying release");
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            result = action.apply() => result,
        };

        let err = match result {
            Ok(()) => {
                debug!(
                    release = action.release_name(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "release applied"
                );
                return Ok(());
            }
            Err(err) => err,
        };

        if !predicate.should_retry(&err) {
            return Err(EngineError::Apply {
                release: action.release_name().to_string(),
                attempts: predicate.attempts(),
                elapsed: started.elapsed(),
                source: err,
            });
        }
        warn!(
            release = action.release_name(),
            attempt = predicate.attempts(),
            error = %err,
            "apply failed, retrying in {interval:?}"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
