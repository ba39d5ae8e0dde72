//! Executing planned actions against the cluster.
//!
//! Each action runs pre-hook, apply (with retries), then post-hook. A post-hook only
//! runs after a successful apply, and any failure ends the action.

mod hooks;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, info, info_span};

pub use retry::{Applicable, RetryPredicate, retry_apply};

use crate::cluster::{ClusterClient, Installer};
use crate::error::{EngineError, HookStage};
use crate::plan::{ActionKind, ReleaseAction};

pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(20 * 60);
pub const DEFAULT_READINESS_POLL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    pub interval: Duration,
    /// Retries after the first apply call.
    pub max_retries: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RETRY_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessSettings {
    pub timeout: Duration,
    pub poll: Duration,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_READINESS_TIMEOUT,
            poll: DEFAULT_READINESS_POLL,
        }
    }
}

/// Binds a planned action to the installer that carries it out.
struct InstallerAction<'a> {
    action: &'a ReleaseAction,
    installer: &'a dyn Installer,
}

#[async_trait]
impl Applicable for InstallerAction<'_> {
    fn release_name(&self) -> &str {
        self.action.name()
    }

    fn is_atomic(&self) -> bool {
        self.action.is_atomic()
    }

    async fn apply(&self) -> anyhow::Result<()> {
        match self.action.kind() {
            ActionKind::Install => self.installer.install(self.action.release()).await,
            ActionKind::Upgrade { .. } => {
                self.installer
                    .upgrade(self.action.name(), self.action.release())
                    .await
            }
        }
    }
}

/// Runs one [`ReleaseAction`] at a time.
pub struct ActionExecutor {
    installer: Arc<dyn Installer>,
    cluster: Arc<dyn ClusterClient>,
    retry: RetrySettings,
    readiness: ReadinessSettings,
    span: Span,
}

impl ActionExecutor {
    pub fn new(installer: Arc<dyn Installer>, cluster: Arc<dyn ClusterClient>, span: Span) -> Self {
        Self {
            installer,
            cluster,
            retry: RetrySettings::default(),
            readiness: ReadinessSettings::default(),
            span,
        }
    }

    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_readiness(mut self, readiness: ReadinessSettings) -> Self {
        self.readiness = readiness;
        self
    }

    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        action: &ReleaseAction,
    ) -> Result<(), EngineError> {
        let span = info_span!(
            parent: &self.span,
            "execute",
            release = action.name(),
            kind = %action.kind()
        );
        self.execute_inner(cancel, action).instrument(span).await
    }

    async fn execute_inner(
        &self,
        cancel: &CancellationToken,
        action: &ReleaseAction,
    ) -> Result<(), EngineError> {
        if let Some(hook) = action.pre_hook() {
            hooks::run_hook(
                self.cluster.as_ref(),
                &self.readiness,
                cancel,
                action.name(),
                HookStage::Pre,
                hook,
            )
            .await?;
        }

        let applicable = InstallerAction {
            action,
            installer: self.installer.as_ref(),
        };
        retry_apply(cancel, &applicable, self.retry.interval, self.retry.max_retries).await?;

        if let Some(hook) = action.post_hook() {
            hooks::run_hook(
                self.cluster.as_ref(),
                &self.readiness,
                cancel,
                action.name(),
                HookStage::Post,
                hook,
            )
            .await?;
        }

        info!(
            release = action.name(),
            version = %action.release().target_version,
            "release applied"
        );
        Ok(())
    }
}
