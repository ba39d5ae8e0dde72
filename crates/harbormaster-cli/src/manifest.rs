//! Desired releases read from a YAML manifest.

use std::path::PathBuf;

use anyhow::Context;

use harbormaster_core::cluster::ReleaseSource;
use harbormaster_core::types::Release;

/// A YAML list of releases: `name`, `version`, and optionally `wait`, `values`,
/// `dependencies`.
pub struct ManifestSource {
    path: PathBuf,
}

impl ManifestSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReleaseSource for ManifestSource {
    fn load(&self) -> anyhow::Result<Vec<Release>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read release manifest: {}", self.path.display()))?;
        parse_manifest(&content)
            .with_context(|| format!("Failed to parse release manifest: {}", self.path.display()))
    }
}

pub fn parse_manifest(content: &str) -> anyhow::Result<Vec<Release>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let releases: Vec<Release> = serde_yaml::from_str(content)?;

    let mut seen = std::collections::HashSet::new();
    for release in &releases {
        if !seen.insert(release.name.as_str()) {
            anyhow::bail!("release '{}' is listed more than once", release.name);
        }
    }
    Ok(releases)
}
