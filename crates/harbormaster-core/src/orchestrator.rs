//! Top-level upgrade runs: plan, back up, then apply in order.

use std::fmt::Write as _;

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, info, info_span, warn};

use crate::apply::ActionExecutor;
use crate::backup::{BackupService, BackupSnapshot, RunId};
use crate::cluster::VersionObserver;
use crate::error::{ClusterError, EngineError, InvalidUpgradeError};
use crate::plan::{ActionFactory, PlanOptions};
use crate::types::Release;
use crate::version::Semver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedVersion {
    Installed(Semver),
    NotInstalled,
}

/// Outcome of a run that did not hit a fatal error.
#[derive(Debug, Default)]
pub struct UpgradeReport {
    /// Present when the plan contained at least one upgrade.
    pub backup: Option<BackupSnapshot>,
    /// Names of applied releases, in execution order.
    pub applied: Vec<String>,
    pub skipped: Vec<InvalidUpgradeError>,
}

impl UpgradeReport {
    pub fn has_skipped(&self) -> bool {
        !self.skipped.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut out = match self.applied.len() {
            1 => "1 release applied".to_string(),
            n => format!("{n} releases applied"),
        };
        if let Some(backup) = &self.backup {
            let _ = write!(out, ", backup {}", backup.run_id);
        }
        if self.skipped.is_empty() {
            return out;
        }
        let _ = match self.skipped.len() {
            1 => write!(out, "\n1 release was skipped:"),
            n => write!(out, "\n{n} releases were skipped:"),
        };
        for err in &self.skipped {
            let _ = write!(out, "\n  - {err}");
        }
        out
    }
}

pub struct UpgradeOrchestrator {
    factory: ActionFactory,
    executor: ActionExecutor,
    backup: BackupService,
    span: Span,
}

impl UpgradeOrchestrator {
    pub fn new(
        factory: ActionFactory,
        executor: ActionExecutor,
        backup: BackupService,
        span: Span,
    ) -> Self {
        Self {
            factory,
            executor,
            backup,
            span,
        }
    }

    pub fn factory(&self) -> &ActionFactory {
        &self.factory
    }

    /// Plan `releases`, back up custom resources when anything is upgraded, then apply
    /// every action in plan order.
    ///
    /// Stops at the first failing action. Releases applied before it stay applied.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        releases: &[Release],
        options: &PlanOptions,
    ) -> Result<UpgradeReport, EngineError> {
        let span = info_span!(parent: &self.span, "upgrade", releases = releases.len());
        self.run_inner(cancel, releases, options).instrument(span).await
    }

    async fn run_inner(
        &self,
        cancel: &CancellationToken,
        releases: &[Release],
        options: &PlanOptions,
    ) -> Result<UpgradeReport, EngineError> {
        let plan = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            plan = self.factory.plan(releases, options) => plan?,
        };

        let mut report = UpgradeReport::default();
        if plan.includes_upgrade() {
            let run_id = RunId::generate();
            info!(run = %run_id, "backing up CRDs and custom resources");
            let snapshot = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                snapshot = self.backup.snapshot(&run_id) => snapshot?,
            };
            report.backup = Some(snapshot);
        }

        let (actions, skipped) = plan.into_parts();
        report.skipped = skipped;
        for action in &actions {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            info!(release = action.name(), kind = %action.kind(), "applying release");
            self.executor.execute(cancel, action).await?;
            report.applied.push(action.name().to_string());
        }

        if report.has_skipped() {
            warn!(skipped = report.skipped.len(), "some releases were skipped");
        }
        info!(applied = report.applied.len(), "upgrade run finished");
        Ok(report)
    }

    /// Observed version of each named release.
    pub async fn versions(
        &self,
        names: &[&str],
    ) -> Result<Vec<(String, ObservedVersion)>, EngineError> {
        observed_versions(self.factory.observer(), names).await
    }
}

/// Ask `observer` for each named release. Only a missing release is tolerated.
pub async fn observed_versions(
    observer: &dyn VersionObserver,
    names: &[&str],
) -> Result<Vec<(String, ObservedVersion)>, EngineError> {
    let mut versions = Vec::with_capacity(names.len());
    for name in names {
        let observed = match observer.current_version(name).await {
            Ok(version) => ObservedVersion::Installed(version),
            Err(ClusterError::NotFound) => ObservedVersion::NotInstalled,
            Err(source) => {
                return Err(EngineError::Observe {
                    release: name.to_string(),
                    source,
                });
            }
        };
        versions.push((name.to_string(), observed));
    }
    Ok(versions)
}
