//! Planned release actions and their hooks.

use std::fmt;

use crate::cluster::WorkloadRef;
use crate::error::InvalidUpgradeError;
use crate::types::{ChartFile, Release};
use crate::version::Semver;

/// Side effect run around the apply step of an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hook {
    /// Push packaged CRD manifests so instances validate against the new schema.
    RefreshCrds { manifests: Vec<ChartFile> },
    /// Block until the workload is ready, then restart it to clear stale state.
    AwaitReadiness { workload: WorkloadRef },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Install,
    Upgrade { from: Semver },
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install => f.write_str("install"),
            Self::Upgrade { from } => write!(f, "upgrade from {from}"),
        }
    }
}

/// An executable install or upgrade of one release.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseAction {
    kind: ActionKind,
    release: Release,
    pre_hook: Option<Hook>,
    post_hook: Option<Hook>,
}

impl ReleaseAction {
    pub fn install(release: Release) -> Self {
        Self {
            kind: ActionKind::Install,
            release,
            pre_hook: None,
            post_hook: None,
        }
    }

    pub fn upgrade(release: Release, from: Semver) -> Self {
        Self {
            kind: ActionKind::Upgrade { from },
            release,
            pre_hook: None,
            post_hook: None,
        }
    }

    pub fn with_pre_hook(mut self, hook: Hook) -> Self {
        self.pre_hook = Some(hook);
        self
    }

    pub fn with_post_hook(mut self, hook: Hook) -> Self {
        self.post_hook = Some(hook);
        self
    }

    pub fn name(&self) -> &str {
        &self.release.name
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    pub fn release(&self) -> &Release {
        &self.release
    }

    pub fn is_upgrade(&self) -> bool {
        matches!(self.kind, ActionKind::Upgrade { .. })
    }

    /// Only atomic actions may be retried.
    pub fn is_atomic(&self) -> bool {
        self.release.is_atomic()
    }

    pub fn pre_hook(&self) -> Option<&Hook> {
        self.pre_hook.as_ref()
    }

    pub fn post_hook(&self) -> Option<&Hook> {
        self.post_hook.as_ref()
    }
}

/// The planner's verdict for one release.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Apply(ReleaseAction),
    /// Version policy forbids touching the release in this run.
    Skip(InvalidUpgradeError),
}
