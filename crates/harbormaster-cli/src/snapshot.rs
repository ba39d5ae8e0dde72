//! Installed releases read from a YAML snapshot.
//!
//! The snapshot maps each release name to the chart versions installed under it.
//! A list with more than one entry models an ambiguous cluster state.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;

use harbormaster_core::cluster::{ListedRelease, ReleaseLister};

#[derive(Debug, Clone, Default)]
pub struct SnapshotLister {
    releases: BTreeMap<String, Vec<String>>,
}

impl SnapshotLister {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read release snapshot: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse release snapshot: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let releases: BTreeMap<String, Vec<String>> = serde_yaml::from_str(content)?;
        Ok(Self { releases })
    }
}

#[async_trait]
impl ReleaseLister for SnapshotLister {
    async fn list_releases(&self, name: &str) -> anyhow::Result<Vec<ListedRelease>> {
        let versions = self.releases.get(name).map(Vec::as_slice).unwrap_or_default();
        Ok(versions
            .iter()
            .map(|version| ListedRelease {
                name: name.to_string(),
                chart_version: Some(version.clone()),
            })
            .collect())
    }
}
