//! Per-release policy table.
//!
//! Which releases are pinned to the build version, which need confirmation, and which
//! tolerate wider version drift is data handed to the planner, not code.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cluster::WorkloadRef;
use crate::version::DriftAllowance;

/// Policy attached to a release name. The default is an unmanaged release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReleasePolicy {
    /// Version must equal the build version unless forced.
    pub locked: bool,
    /// Install and upgrade need explicit confirmation.
    pub destructive: bool,
    /// Minor drift tolerated on top of the default of one.
    #[serde(rename = "max_minor_drift", skip_serializing_if = "Option::is_none")]
    pub drift_exception: Option<DriftAllowance>,
    /// Packaged CRDs are pushed before the upgrade body runs.
    pub owns_crds: bool,
    /// Workload to wait for (and restart) after a fresh install.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readiness: Option<WorkloadRef>,
}

static UNMANAGED: ReleasePolicy = ReleasePolicy {
    locked: false,
    destructive: false,
    drift_exception: None,
    owns_crds: false,
    readiness: None,
};

impl ReleasePolicy {
    pub fn locked() -> Self {
        Self {
            locked: true,
            ..Self::default()
        }
    }

    pub fn destructive() -> Self {
        Self {
            destructive: true,
            ..Self::default()
        }
    }

    pub fn with_drift(mut self, allowance: DriftAllowance) -> Self {
        self.drift_exception = Some(allowance);
        self
    }

    pub fn owning_crds(mut self) -> Self {
        self.owns_crds = true;
        self
    }

    pub fn gated_on(mut self, workload: WorkloadRef) -> Self {
        self.readiness = Some(workload);
        self
    }
}

/// Release name to [`ReleasePolicy`]. Names not in the table are unmanaged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyTable {
    policies: BTreeMap<String, ReleasePolicy>,
}

impl PolicyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, policy: ReleasePolicy) -> Self {
        self.insert(name, policy);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, policy: ReleasePolicy) {
        self.policies.insert(name.into(), policy);
    }

    pub fn get(&self, name: &str) -> &ReleasePolicy {
        self.policies.get(name).unwrap_or(&UNMANAGED)
    }

    pub fn is_locked(&self, name: &str) -> bool {
        self.get(name).locked
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl FromIterator<(String, ReleasePolicy)> for PolicyTable {
    fn from_iter<I: IntoIterator<Item = (String, ReleasePolicy)>>(iter: I) -> Self {
        Self {
            policies: iter.into_iter().collect(),
        }
    }
}
