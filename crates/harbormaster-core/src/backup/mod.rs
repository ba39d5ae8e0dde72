//! Pre-upgrade snapshots of CRDs and their custom resources.
//!
//! Layout below the sink:
//!
//! ```text
//! <run>/backups/crds/<crd>.yaml
//! <run>/backups/<group>/<version>/[<namespace>/]<kind>/<name>.yaml
//! ```

pub mod sink;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{Instrument, Span, debug, info, info_span};
use uuid::Uuid;

pub use sink::{FileSink, FsSink};

use crate::cluster::{ClusterClient, CrdDefinition, CustomResource, GroupVersionResource};
use crate::error::BackupError;

/// Identifies one upgrade run and its backup directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    /// `upgrade-<UTC timestamp>-<random suffix>`.
    pub fn generate() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!(
            "upgrade-{}-{}",
            Utc::now().format("%Y%m%d%H%M%S"),
            &suffix[..8]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RunId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a completed backup wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSnapshot {
    pub run_id: RunId,
    pub crds: usize,
    pub resources: usize,
}

pub struct BackupService {
    cluster: Arc<dyn ClusterClient>,
    sink: Arc<dyn FileSink>,
    span: Span,
}

impl BackupService {
    pub fn new(cluster: Arc<dyn ClusterClient>, sink: Arc<dyn FileSink>, span: Span) -> Self {
        Self {
            cluster,
            sink,
            span,
        }
    }

    /// Back up every CRD and then every instance of every declared version.
    pub async fn snapshot(&self, run_id: &RunId) -> Result<BackupSnapshot, BackupError> {
        let span = info_span!(parent: &self.span, "backup", run = %run_id);
        async {
            let crds = self.backup_crds(run_id).await?;
            let resources = self.backup_crs(&crds, run_id).await?;
            info!(crds = crds.len(), resources, "backup complete");
            Ok::<_, BackupError>(BackupSnapshot {
                run_id: run_id.clone(),
                crds: crds.len(),
                resources,
            })
        }
        .instrument(span)
        .await
    }

    /// Write every CRD with its canonical type and return them.
    pub async fn backup_crds(&self, run_id: &RunId) -> Result<Vec<CrdDefinition>, BackupError> {
        let dir = backup_root(run_id).join("crds");
        self.create_dir(&dir).await?;

        let crds = self.cluster.list_crds().await.map_err(BackupError::ListCrds)?;
        let mut written = Vec::with_capacity(crds.len());
        for crd in crds {
            let crd = crd.with_canonical_type();
            let path = dir.join(format!("{}.yaml", crd.name()));
            self.write_yaml(&path, &crd).await?;
            debug!(crd = crd.name(), "backed up CRD");
            written.push(crd);
        }
        Ok(written)
    }

    /// Write all instances of `crds`, returning how many were written.
    ///
    /// Versions without instances are skipped.
    pub async fn backup_crs(
        &self,
        crds: &[CrdDefinition],
        run_id: &RunId,
    ) -> Result<usize, BackupError> {
        let mut written = 0;
        for crd in crds {
            for gvr in crd.resources() {
                let resources = match self.cluster.list_custom_resources(&gvr).await {
                    Ok(resources) => resources,
                    Err(err) if err.is_not_found() => {
                        debug!(%gvr, "no custom resources");
                        continue;
                    }
                    Err(source) => return Err(BackupError::ListResources { gvr, source }),
                };

                for mut resource in resources {
                    if resource.kind.is_empty() {
                        resource.kind = crd.spec.names.kind.clone();
                    }
                    if resource.api_version.is_empty() {
                        resource.api_version = format!("{}/{}", gvr.group, gvr.version);
                    }
                    let path = resource_path(run_id, &gvr, &resource);
                    if let Some(dir) = path.parent() {
                        self.create_dir(dir).await?;
                    }
                    self.write_yaml(&path, &resource).await?;
                    written += 1;
                }
                debug!(%gvr, "backed up custom resources");
            }
        }
        Ok(written)
    }

    async fn create_dir(&self, dir: &Path) -> Result<(), BackupError> {
        let sink = Arc::clone(&self.sink);
        let owned = dir.to_path_buf();
        run_blocking(move || sink.create_dir_all(&owned))
            .await
            .map_err(|source| BackupError::Write {
                path: dir.to_path_buf(),
                source,
            })
    }

    async fn write_yaml<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), BackupError> {
        let yaml = serde_yaml::to_string(value).map_err(|source| BackupError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;
        let sink = Arc::clone(&self.sink);
        let owned = path.to_path_buf();
        run_blocking(move || sink.write(&owned, yaml.as_bytes()))
            .await
            .map_err(|source| BackupError::Write {
                path: path.to_path_buf(),
                source,
            })
    }
}

async fn run_blocking<F>(f: F) -> io::Result<()>
where
    F: FnOnce() -> io::Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .unwrap_or_else(|err| Err(io::Error::other(err)))
}

fn backup_root(run_id: &RunId) -> PathBuf {
    Path::new(run_id.as_str()).join("backups")
}

fn resource_path(run_id: &RunId, gvr: &GroupVersionResource, resource: &CustomResource) -> PathBuf {
    let mut path = backup_root(run_id).join(&gvr.group).join(&gvr.version);
    let namespace = resource.namespace();
    if !namespace.is_empty() {
        path.push(namespace);
    }
    path.push(&resource.kind);
    path.push(format!("{}.yaml", resource.name()));
    path
}
