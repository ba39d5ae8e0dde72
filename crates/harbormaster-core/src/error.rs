//! Error taxonomy for planning and executing release upgrades.
//!
//! [`EngineError`] is closed: the orchestrator matches on it to decide between
//! collecting a per-release problem and aborting the whole run.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::cluster::GroupVersionResource;
use crate::version::Semver;

/// A version string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("empty version string")]
    Empty,
    #[error("malformed version {input:?}: {reason}")]
    Malformed { input: String, reason: String },
}

impl VersionError {
    pub(crate) fn malformed(input: &str, reason: &str) -> Self {
        Self::Malformed {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Why a version pair is not an acceptable upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeRejection {
    /// Candidate is equal to or older than the current version.
    NotNewer,
    MajorMismatch,
    MinorDrift { drift: u64, allowed: u64 },
    /// The build can only install or upgrade to `supported`.
    UnsupportedTarget { supported: Semver },
}

impl fmt::Display for UpgradeRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotNewer => f.write_str("target version is not newer than the current version"),
            Self::MajorMismatch => f.write_str("major versions differ"),
            Self::MinorDrift { drift, allowed } => write!(
                f,
                "minor version drift of {drift} exceeds the allowed drift of {allowed}"
            ),
            Self::UnsupportedTarget { supported } => {
                write!(f, "this build only supports version {supported}")
            }
        }
    }
}

/// A version-policy violation for a single release. Recoverable: collected and reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct InvalidUpgradeError {
    pub release: Option<String>,
    /// `None` when the release is not installed.
    pub from: Option<Semver>,
    pub to: Semver,
    pub reason: UpgradeRejection,
}

impl InvalidUpgradeError {
    pub fn new(from: Option<Semver>, to: Semver, reason: UpgradeRejection) -> Self {
        Self {
            release: None,
            from,
            to,
            reason,
        }
    }

    pub fn for_release(mut self, name: &str) -> Self {
        self.release = Some(name.to_string());
        self
    }

    pub fn is_minor_drift(&self) -> bool {
        matches!(self.reason, UpgradeRejection::MinorDrift { .. })
    }
}

impl fmt::Display for InvalidUpgradeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(release) = &self.release {
            write!(f, "{release}: ")?;
        }
        match &self.from {
            Some(from) => write!(f, "invalid upgrade from {from} to {}: {}", self.to, self.reason),
            None => write!(f, "invalid install of {}: {}", self.to, self.reason),
        }
    }
}

/// Failure reported by a cluster-facing collaborator.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("not found")]
    NotFound,
    #[error("{count} matching releases found, expected exactly one")]
    Ambiguous { count: usize },
    #[error(transparent)]
    Api(#[from] anyhow::Error),
}

impl ClusterError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// A backup could not be completed. Always fatal to the run.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("listing CRDs: {0}")]
    ListCrds(#[source] ClusterError),
    #[error("listing custom resources for {gvr}: {source}")]
    ListResources {
        gvr: GroupVersionResource,
        #[source]
        source: ClusterError,
    },
    #[error("serializing {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("writing {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    Pre,
    Post,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pre => f.write_str("pre"),
            Self::Post => f.write_str("post"),
        }
    }
}

/// Every way planning or executing an upgrade run can fail.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    InvalidUpgrade(#[from] InvalidUpgradeError),

    #[error("upgrading {release} requires explicit confirmation")]
    ConfirmationMissing { release: String },

    #[error("getting version for {release}: {source}")]
    Observe {
        release: String,
        #[source]
        source: ClusterError,
    },

    #[error("creating backup: {0}")]
    Backup(#[from] BackupError),

    #[error("applying {release} failed after {attempts} attempt(s) in {elapsed:?}: {source}")]
    Apply {
        release: String,
        attempts: u32,
        elapsed: Duration,
        #[source]
        source: anyhow::Error,
    },

    #[error("{stage}-hook for {release} failed: {source}")]
    Hook {
        release: String,
        stage: HookStage,
        #[source]
        source: anyhow::Error,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl EngineError {
    /// Per-release policy violations are collected; everything else aborts the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidUpgrade(_))
    }
}
