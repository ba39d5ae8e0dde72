//! harbormaster.toml schema.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::apply::{
    DEFAULT_MAX_RETRIES, DEFAULT_READINESS_POLL, DEFAULT_READINESS_TIMEOUT,
    DEFAULT_RETRY_INTERVAL, ReadinessSettings, RetrySettings,
};
use crate::backup::FsSink;
use crate::policy::{PolicyTable, ReleasePolicy};

pub const DEFAULT_BACKUP_DIR: &str = "harbormaster-upgrade";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Root of the `<run>/backups/...` trees.
    pub backup_dir: PathBuf,
    pub retry: RetryConfig,
    pub readiness: ReadinessConfig,
    #[serde(rename = "release")]
    pub releases: BTreeMap<String, ReleasePolicy>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backup_dir: PathBuf::from(DEFAULT_BACKUP_DIR),
            retry: RetryConfig::default(),
            readiness: ReadinessConfig::default(),
            releases: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub interval_secs: u64,
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_RETRY_INTERVAL.as_secs(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReadinessConfig {
    pub timeout_secs: u64,
    pub poll_secs: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_READINESS_TIMEOUT.as_secs(),
            poll_secs: DEFAULT_READINESS_POLL.as_secs(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.readiness.poll_secs == 0 {
            anyhow::bail!("readiness.poll_secs must be at least 1");
        }
        for (name, policy) in &self.releases {
            validate_policy(policy)
                .with_context(|| format!("Invalid release policy: '{}'", name))?;
        }
        Ok(())
    }

    pub fn policy_table(&self) -> PolicyTable {
        self.releases
            .iter()
            .map(|(name, policy)| (name.clone(), policy.clone()))
            .collect()
    }

    pub fn retry_settings(&self) -> RetrySettings {
        RetrySettings {
            interval: Duration::from_secs(self.retry.interval_secs),
            max_retries: self.retry.max_retries,
        }
    }

    /// Sink rooted at `backup_dir`.
    pub fn backup_sink(&self) -> FsSink {
        FsSink::new(&self.backup_dir)
    }

    pub fn readiness_settings(&self) -> ReadinessSettings {
        ReadinessSettings {
            timeout: Duration::from_secs(self.readiness.timeout_secs),
            poll: Duration::from_secs(self.readiness.poll_secs),
        }
    }
}

fn validate_policy(policy: &ReleasePolicy) -> anyhow::Result<()> {
    if let Some(workload) = &policy.readiness {
        if workload.namespace.trim().is_empty() || workload.name.trim().is_empty() {
            anyhow::bail!("readiness needs both a namespace and a name");
        }
    }
    Ok(())
}
