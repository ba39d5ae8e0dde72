//! Release data model shared by planning, execution, and the collaborators.

use serde::{Deserialize, Serialize};

use crate::version::Semver;

/// Chart values. Opaque to the engine, handed through to the installer.
pub type Values = serde_json::Map<String, serde_json::Value>;

/// Prefix of packaged CRD manifests inside a chart dependency.
pub const CRD_FILE_PREFIX: &str = "crds/";

/// How the installer waits for a release and whether it rolls back on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitPolicy {
    NoWait,
    WaitForReady,
    /// Wait for readiness and roll the release back if it fails.
    #[default]
    #[serde(alias = "atomic")]
    WaitAndRollbackOnFailure,
}

impl WaitPolicy {
    /// Atomic installs undo their own partial state on failure and are safe to retry.
    pub fn is_atomic(self) -> bool {
        matches!(self, Self::WaitAndRollbackOnFailure)
    }
}

/// A file packaged with a chart dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartFile {
    pub name: String,
    #[serde(default)]
    pub data: String,
}

/// A direct dependency (sub-chart) packaged with a release.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChartDependency {
    pub name: String,
    #[serde(default)]
    pub files: Vec<ChartFile>,
}

/// A named deployable unit with the version it should be running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub name: String,
    #[serde(rename = "version")]
    pub target_version: Semver,
    #[serde(default)]
    pub values: Values,
    #[serde(default, rename = "wait")]
    pub wait_policy: WaitPolicy,
    #[serde(default)]
    pub dependencies: Vec<ChartDependency>,
}

impl Release {
    pub fn new(name: impl Into<String>, target_version: Semver) -> Self {
        Self {
            name: name.into(),
            target_version,
            values: Values::new(),
            wait_policy: WaitPolicy::default(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_wait_policy(mut self, wait_policy: WaitPolicy) -> Self {
        self.wait_policy = wait_policy;
        self
    }

    pub fn with_values(mut self, values: Values) -> Self {
        self.values = values;
        self
    }

    pub fn with_dependency(mut self, dependency: ChartDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn is_atomic(&self) -> bool {
        self.wait_policy.is_atomic()
    }

    /// CRD manifests shipped in the direct dependencies, in declaration order.
    ///
    /// Not recursive: dependencies of dependencies are ignored.
    pub fn crd_manifests(&self) -> Vec<&ChartFile> {
        self.dependencies
            .iter()
            .flat_map(|dep| dep.files.iter())
            .filter(|file| file.name.starts_with(CRD_FILE_PREFIX))
            .collect()
    }
}
