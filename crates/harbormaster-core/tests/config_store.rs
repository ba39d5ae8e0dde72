use std::path::Path;

use tempfile::TempDir;

use harbormaster_core::backup::FileSink;
use harbormaster_core::cluster::WorkloadRef;
use harbormaster_core::config::{ConfigStore, EngineConfig};
use harbormaster_core::policy::ReleasePolicy;
use harbormaster_core::version::DriftAllowance;

#[test]
fn load_missing_returns_default_config() {
    let temp = TempDir::new().unwrap();
    let store = ConfigStore::from_path(temp.path().join("harbormaster.toml"));

    let config = store.load().unwrap();

    assert_eq!(config, EngineConfig::default());
    assert!(config.releases.is_empty());
}

#[test]
fn save_then_load_roundtrip() {
    let temp = TempDir::new().unwrap();
    let store = ConfigStore::from_path(temp.path().join("nested/dir/harbormaster.toml"));

    let mut config = EngineConfig::new();
    config.retry.max_retries = 5;
    config
        .releases
        .insert("operators".to_string(), ReleasePolicy::locked().owning_crds());
    config.releases.insert(
        "cilium".to_string(),
        ReleasePolicy::default()
            .with_drift(DriftAllowance::Any)
            .gated_on(WorkloadRef {
                namespace: "kube-system".to_string(),
                name: "cilium".to_string(),
            }),
    );

    store.save(&config).unwrap();
    assert!(store.config_path().exists());

    let loaded = store.load().unwrap();
    assert_eq!(loaded, config);
    assert!(loaded.policy_table().is_locked("operators"));
}

#[test]
fn load_reports_path_on_parse_failure() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("harbormaster.toml");
    std::fs::write(&path, "[retry]\nmax_retries = \"three\"\n").unwrap();

    let err = ConfigStore::from_path(&path).load().unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("Failed to parse config file"), "{message}");
    assert!(message.contains("harbormaster.toml"), "{message}");
}

#[test]
fn backup_sink_writes_below_configured_dir() {
    let temp = TempDir::new().unwrap();
    let store = ConfigStore::from_path(temp.path().join("harbormaster.toml"));
    let backup_dir = temp.path().join("backups-root");
    std::fs::write(
        store.config_path(),
        format!("backup_dir = {:?}\n", backup_dir.display().to_string()),
    )
    .unwrap();

    let sink = store.load().unwrap().backup_sink();
    sink.create_dir_all(Path::new("run-1/backups/crds")).unwrap();
    sink.write(Path::new("run-1/backups/crds/a.yaml"), b"kind: x\n")
        .unwrap();

    let written = backup_dir.join("run-1/backups/crds/a.yaml");
    assert_eq!(std::fs::read_to_string(written).unwrap(), "kind: x\n");
}

#[test]
fn default_backup_dir_is_relative() {
    let config = EngineConfig::default();
    assert_eq!(config.backup_dir, Path::new(harbormaster_core::config::DEFAULT_BACKUP_DIR));
}
