//! Pre- and post-apply hooks.

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ReadinessSettings;
use crate::cluster::{ClusterClient, WorkloadRef};
use crate::error::{EngineError, HookStage};
use crate::plan::Hook;
use crate::types::ChartFile;

/// Run `hook` for `release`, aborting promptly when `cancel` fires.
pub(crate) async fn run_hook(
    cluster: &dyn ClusterClient,
    readiness: &ReadinessSettings,
    cancel: &CancellationToken,
    release: &str,
    stage: HookStage,
    hook: &Hook,
) -> Result<(), EngineError> {
    let work = async {
        match hook {
            Hook::RefreshCrds { manifests } => refresh_crds(cluster, manifests).await,
            Hook::AwaitReadiness { workload } => {
                await_then_restart(cluster, workload, readiness).await
            }
        }
    };

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(EngineError::Cancelled),
        result = work => result,
    };
    result.map_err(|source| EngineError::Hook {
        release: release.to_string(),
        stage,
        source,
    })
}

async fn refresh_crds(cluster: &dyn ClusterClient, manifests: &[ChartFile]) -> anyhow::Result<()> {
    for manifest in manifests {
        debug!(file = %manifest.name, "updating CRD");
        cluster
            .apply_crd(manifest.data.as_bytes())
            .await
            .with_context(|| format!("applying {}", manifest.name))?;
    }
    Ok(())
}

async fn await_then_restart(
    cluster: &dyn ClusterClient,
    workload: &WorkloadRef,
    settings: &ReadinessSettings,
) -> anyhow::Result<()> {
    await_readiness(cluster, workload, settings).await?;
    debug!(%workload, "restarting workload");
    cluster
        .restart_workload(workload)
        .await
        .with_context(|| format!("restarting {workload}"))
}

/// Poll until the workload is ready, tolerating check failures until the timeout.
async fn await_readiness(
    cluster: &dyn ClusterClient,
    workload: &WorkloadRef,
    settings: &ReadinessSettings,
) -> anyhow::Result<()> {
    let started = tokio::time::Instant::now();
    let mut last_error = None;

    let poll = async {
        loop {
            match cluster.workload_ready(workload).await {
                Ok(true) => return,
                Ok(false) => debug!(%workload, "workload not ready yet"),
                Err(err) => {
                    warn!(%workload, error = %err, "readiness check failed, retrying");
                    last_error = Some(err);
                }
            }
            tokio::time::sleep(settings.poll).await;
        }
    };

    if tokio::time::timeout(settings.timeout, poll).await.is_err() {
        let timeout = settings.timeout;
        return Err(match last_error {
            Some(err) => anyhow::Error::new(err)
                .context(format!("{workload} did not become ready within {timeout:?}")),
            None => anyhow::anyhow!("{workload} did not become ready within {timeout:?}"),
        });
    }
    info!(%workload, elapsed_secs = started.elapsed().as_secs(), "workload became ready");
    Ok(())
}
