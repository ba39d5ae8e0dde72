//! Observe installed release versions from a release listing.

use async_trait::async_trait;

use super::VersionObserver;
use crate::error::ClusterError;
use crate::version::Semver;

/// One installed release as reported by the release store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedRelease {
    pub name: String,
    /// `None` when the stored release has no chart metadata.
    pub chart_version: Option<String>,
}

/// Lists installed releases filtered by name.
#[async_trait]
pub trait ReleaseLister: Send + Sync {
    async fn list_releases(&self, name: &str) -> anyhow::Result<Vec<ListedRelease>>;
}

/// A [`VersionObserver`] that requires exactly one listed release per name.
#[derive(Debug, Clone)]
pub struct ListingObserver<L> {
    lister: L,
}

impl<L: ReleaseLister> ListingObserver<L> {
    pub fn new(lister: L) -> Self {
        Self { lister }
    }
}

#[async_trait]
impl<L: ReleaseLister> VersionObserver for ListingObserver<L> {
    async fn current_version(&self, release: &str) -> Result<Semver, ClusterError> {
        let mut listed = self.lister.list_releases(release).await?;
        match listed.len() {
            0 => return Err(ClusterError::NotFound),
            1 => {}
            count => return Err(ClusterError::Ambiguous { count }),
        }

        let listed = listed.remove(0);
        let raw = listed
            .chart_version
            .ok_or_else(|| anyhow::anyhow!("received invalid release {release}"))?;
        Semver::parse(&raw).map_err(|e| {
            ClusterError::Api(anyhow::anyhow!(
                "parsing version {raw:?} of release {release}: {e}"
            ))
        })
    }
}
