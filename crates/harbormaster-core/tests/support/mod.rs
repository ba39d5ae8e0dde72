#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use harbormaster_core::cluster::{
    ClusterClient, CrdDefinition, CustomResource, GroupVersionResource, Installer, ListedRelease,
    ReleaseLister, WorkloadRef,
};
use harbormaster_core::error::ClusterError;
use harbormaster_core::types::Release;

/// Ordered record of every side effect the fakes observe.
#[derive(Debug, Default, Clone)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

#[derive(Default)]
pub struct FakeCluster {
    pub journal: Journal,
    pub crds: Vec<CrdDefinition>,
    /// Keyed by `group/version/resource`. Missing keys answer `NotFound`.
    pub resources: HashMap<String, Vec<CustomResource>>,
    pub fail_crd_listing: bool,
    pub failing_resources: HashSet<String>,
}

impl FakeCluster {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Default::default()
        }
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn list_crds(&self) -> Result<Vec<CrdDefinition>, ClusterError> {
        self.journal.push("list crds");
        if self.fail_crd_listing {
            return Err(anyhow::anyhow!("connection refused").into());
        }
        Ok(self.crds.clone())
    }

    async fn list_custom_resources(
        &self,
        gvr: &GroupVersionResource,
    ) -> Result<Vec<CustomResource>, ClusterError> {
        let key = gvr.to_string();
        if self.failing_resources.contains(&key) {
            return Err(anyhow::anyhow!("the server is currently unable to handle the request").into());
        }
        self.resources.get(&key).cloned().ok_or(ClusterError::NotFound)
    }

    async fn apply_crd(&self, manifest: &[u8]) -> Result<(), ClusterError> {
        self.journal
            .push(format!("apply crd {}", String::from_utf8_lossy(manifest)));
        Ok(())
    }

    async fn workload_ready(&self, workload: &WorkloadRef) -> Result<bool, ClusterError> {
        self.journal.push(format!("ready? {workload}"));
        Ok(true)
    }

    async fn restart_workload(&self, workload: &WorkloadRef) -> Result<(), ClusterError> {
        self.journal.push(format!("restart {workload}"));
        Ok(())
    }
}

/// Records calls and fails every call for the releases in `failing`.
#[derive(Default)]
pub struct FakeInstaller {
    pub journal: Journal,
    pub failing: HashSet<String>,
}

impl FakeInstaller {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            failing: HashSet::new(),
        }
    }

    pub fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    fn outcome(&self, name: &str) -> anyhow::Result<()> {
        if self.failing.contains(name) {
            anyhow::bail!("release {name} failed: timed out waiting for the condition");
        }
        Ok(())
    }
}

#[async_trait]
impl Installer for FakeInstaller {
    async fn install(&self, release: &Release) -> anyhow::Result<()> {
        self.journal.push(format!("install {}", release.name));
        self.outcome(&release.name)
    }

    async fn upgrade(&self, name: &str, release: &Release) -> anyhow::Result<()> {
        self.journal
            .push(format!("upgrade {name} to {}", release.target_version));
        self.outcome(name)
    }
}

/// Release store keyed by name, one entry per installed copy.
#[derive(Default)]
pub struct MapLister(pub HashMap<String, Vec<String>>);

impl MapLister {
    pub fn with(mut self, name: &str, versions: &[&str]) -> Self {
        self.0.insert(
            name.to_string(),
            versions.iter().map(|v| v.to_string()).collect(),
        );
        self
    }
}

#[async_trait]
impl ReleaseLister for MapLister {
    async fn list_releases(&self, name: &str) -> anyhow::Result<Vec<ListedRelease>> {
        Ok(self
            .0
            .get(name)
            .map(|versions| {
                versions
                    .iter()
                    .map(|version| ListedRelease {
                        name: name.to_string(),
                        chart_version: Some(version.clone()),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

pub const CERTIFICATES_CRD: &str = r#"
metadata:
  name: certificates.cert-manager.io
spec:
  group: cert-manager.io
  scope: Namespaced
  names:
    kind: Certificate
    plural: certificates
  versions:
    - name: v1alpha2
      served: false
      storage: false
    - name: v1
      served: true
      storage: true
"#;

pub fn certificates_crd() -> CrdDefinition {
    serde_yaml::from_str(CERTIFICATES_CRD).unwrap()
}

pub fn certificate(name: &str, namespace: &str, api_version: &str) -> CustomResource {
    serde_yaml::from_str(&format!(
        r#"
apiVersion: {api_version}
kind: Certificate
metadata:
  name: {name}
  namespace: {namespace}
spec:
  secretName: {name}-tls
  dnsNames: ["{name}.example.com"]
"#
    ))
    .unwrap()
}
