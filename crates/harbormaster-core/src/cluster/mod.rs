//! Cluster-facing collaborators consumed by the engine.
//!
//! The engine never talks to the cluster API or the chart installer directly;
//! it depends on the narrow traits below. Futures returned by these traits may be
//! dropped at any await point when a run is cancelled.

pub mod crd;
pub mod observer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClusterError;
use crate::types::Release;
use crate::version::Semver;

pub use crd::{
    CRD_API_VERSION, CRD_KIND, CrdDefinition, CrdNames, CrdSpec, CrdVersion, CustomResource,
    GroupVersionResource, ObjectMeta,
};
pub use observer::{ListedRelease, ListingObserver, ReleaseLister};

/// Reports the installed version of a release.
///
/// Contract: exactly one installed release yields its version, none yields
/// [`ClusterError::NotFound`], several yield [`ClusterError::Ambiguous`].
/// Implementations must be read-only.
#[async_trait]
pub trait VersionObserver: Send + Sync {
    async fn current_version(&self, release: &str) -> Result<Semver, ClusterError>;
}

/// Installs or upgrades a single release.
///
/// Calls for releases with an atomic wait policy must roll back their own partial
/// state on failure.
#[async_trait]
pub trait Installer: Send + Sync {
    async fn install(&self, release: &Release) -> anyhow::Result<()>;
    async fn upgrade(&self, name: &str, release: &Release) -> anyhow::Result<()>;
}

/// A namespaced workload whose readiness gates a release.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkloadRef {
    pub namespace: String,
    pub name: String,
}

impl std::fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Resource-level access to the cluster.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn list_crds(&self) -> Result<Vec<CrdDefinition>, ClusterError>;

    /// [`ClusterError::NotFound`] when the resource has no instances.
    async fn list_custom_resources(
        &self,
        gvr: &GroupVersionResource,
    ) -> Result<Vec<CustomResource>, ClusterError>;

    async fn apply_crd(&self, manifest: &[u8]) -> Result<(), ClusterError>;

    /// Whether every replica of the workload reports ready.
    async fn workload_ready(&self, workload: &WorkloadRef) -> Result<bool, ClusterError>;

    async fn restart_workload(&self, workload: &WorkloadRef) -> Result<(), ClusterError>;
}

/// Produces the desired releases. Output is treated as validated.
pub trait ReleaseSource {
    fn load(&self) -> anyhow::Result<Vec<Release>>;
}
