//! Harbormaster Core Library
//!
//! Decides, for each desired release, whether to install, upgrade, or skip it,
//! and executes those decisions against a live cluster with bounded retries
//! and a CRD backup taken before any upgrade.

pub mod apply;
pub mod backup;
pub mod cluster;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod plan;
pub mod policy;
pub mod types;
pub mod version;

/// Re-exports of commonly used types
pub mod prelude {
    // Errors
    pub use crate::error::{
        BackupError, ClusterError, EngineError, HookStage, InvalidUpgradeError, UpgradeRejection,
        VersionError,
    };

    // Releases and policy
    pub use crate::policy::{PolicyTable, ReleasePolicy};
    pub use crate::types::{ChartDependency, ChartFile, Release, Values, WaitPolicy};

    // Collaborators
    pub use crate::cluster::{
        ClusterClient, Installer, ListedRelease, ListingObserver, ReleaseLister, ReleaseSource,
        VersionObserver, WorkloadRef,
    };

    // Planning and execution
    pub use crate::apply::{ActionExecutor, ReadinessSettings, RetrySettings};
    pub use crate::backup::{BackupService, BackupSnapshot, FileSink, FsSink, RunId};
    pub use crate::orchestrator::{ObservedVersion, UpgradeOrchestrator, UpgradeReport};
    pub use crate::plan::{ActionFactory, ActionKind, Hook, PlanOptions, ReleaseAction, UpgradePlan};

    // Configuration
    pub use crate::config::{ConfigStore, EngineConfig};

    // Version
    pub use crate::version::{DriftAllowance, Semver, check_upgrade, compatible_with_binary, is_upgrade_to};
}
