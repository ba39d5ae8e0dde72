//! Decides, per desired release, whether to install, upgrade, or skip it.

use std::sync::Arc;

use tracing::{Instrument, Span, debug, warn};

use super::action::{Decision, Hook, ReleaseAction};
use super::UpgradePlan;
use crate::cluster::VersionObserver;
use crate::error::{ClusterError, EngineError, InvalidUpgradeError, UpgradeRejection};
use crate::policy::{PolicyTable, ReleasePolicy};
use crate::types::Release;
use crate::version::{Semver, is_upgrade_to};

/// Inputs that apply to every release of a planning pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOptions {
    /// Version the operator's configuration asks for. Locked releases must match it.
    pub build_version: Semver,
    /// Skip all version checks.
    pub force: bool,
    /// Confirmation for releases marked destructive.
    pub allow_destructive: bool,
}

impl PlanOptions {
    pub fn new(build_version: Semver) -> Self {
        Self {
            build_version,
            force: false,
            allow_destructive: false,
        }
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn allow_destructive(mut self, allow: bool) -> Self {
        self.allow_destructive = allow;
        self
    }
}

pub struct ActionFactory {
    observer: Arc<dyn VersionObserver>,
    policies: PolicyTable,
    span: Span,
}

impl ActionFactory {
    pub fn new(observer: Arc<dyn VersionObserver>, policies: PolicyTable, span: Span) -> Self {
        Self {
            observer,
            policies,
            span,
        }
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    pub fn observer(&self) -> &dyn VersionObserver {
        self.observer.as_ref()
    }

    /// Plan all releases.
    ///
    /// Version-policy violations are collected in [`UpgradePlan::skipped`]. A missing
    /// confirmation or a failed observation aborts the whole pass.
    pub async fn plan(
        &self,
        releases: &[Release],
        options: &PlanOptions,
    ) -> Result<UpgradePlan, EngineError> {
        async {
            let mut actions = Vec::new();
            let mut skipped = Vec::new();
            for release in releases {
                match self.decide(release, options).await? {
                    Decision::Apply(action) => actions.push(action),
                    Decision::Skip(err) => {
                        warn!(release = %release.name, error = %err, "skipping release");
                        skipped.push(err);
                    }
                }
            }
            let plan = UpgradePlan::new(actions, skipped);
            debug!(
                actions = plan.actions().len(),
                skipped = plan.skipped().len(),
                includes_upgrade = plan.includes_upgrade(),
                "planned releases"
            );
            Ok::<_, EngineError>(plan)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Decide what to do with a single release.
    pub async fn decide(
        &self,
        release: &Release,
        options: &PlanOptions,
    ) -> Result<Decision, EngineError> {
        let policy = self.policies.get(&release.name);
        let target = &release.target_version;
        let build = &options.build_version;

        let current = match self.observer.current_version(&release.name).await {
            Ok(version) => version,
            Err(ClusterError::NotFound) => {
                // Never install a version the build does not ship.
                if policy.locked && !options.force && target != build {
                    return Ok(skip(
                        release,
                        InvalidUpgradeError::new(
                            None,
                            build.clone(),
                            UpgradeRejection::UnsupportedTarget {
                                supported: target.clone(),
                            },
                        ),
                    ));
                }
                confirm(release, policy, options)?;
                debug!(release = %release.name, version = %target, "release not found, installing");
                return Ok(Decision::Apply(self.new_install(release, policy)));
            }
            Err(source) => {
                return Err(EngineError::Observe {
                    release: release.name.clone(),
                    source,
                });
            }
        };
        debug!(release = %release.name, current = %current, target = %target, "observed release");

        if !options.force {
            if policy.locked {
                // The configured version governs eligibility, not just the packaged chart.
                if let Err(err) = is_upgrade_to(build, &current) {
                    return Ok(skip(release, err));
                }
                if target != build {
                    return Ok(skip(
                        release,
                        InvalidUpgradeError::new(
                            Some(current),
                            build.clone(),
                            UpgradeRejection::UnsupportedTarget {
                                supported: target.clone(),
                            },
                        ),
                    ));
                }
            } else if let Err(err) = is_upgrade_to(target, &current) {
                if !drift_excused(&err, policy) {
                    return Ok(skip(release, err));
                }
                debug!(release = %release.name, error = %err, "minor drift allowed by policy");
            }
        }

        confirm(release, policy, options)?;
        debug!(release = %release.name, from = %current, to = %target, "upgrading release");
        Ok(Decision::Apply(self.new_upgrade(release, policy, current)))
    }

    fn new_install(&self, release: &Release, policy: &ReleasePolicy) -> ReleaseAction {
        let action = ReleaseAction::install(release.clone());
        match &policy.readiness {
            Some(workload) => action.with_post_hook(Hook::AwaitReadiness {
                workload: workload.clone(),
            }),
            None => action,
        }
    }

    fn new_upgrade(&self, release: &Release, policy: &ReleasePolicy, from: Semver) -> ReleaseAction {
        let action = ReleaseAction::upgrade(release.clone(), from);
        if policy.owns_crds {
            let manifests = release.crd_manifests().into_iter().cloned().collect();
            return action.with_pre_hook(Hook::RefreshCrds { manifests });
        }
        action
    }
}

fn skip(release: &Release, err: InvalidUpgradeError) -> Decision {
    Decision::Skip(err.for_release(&release.name))
}

fn confirm(release: &Release, policy: &ReleasePolicy, options: &PlanOptions) -> Result<(), EngineError> {
    if policy.destructive && !options.allow_destructive {
        return Err(EngineError::ConfirmationMissing {
            release: release.name.clone(),
        });
    }
    Ok(())
}

fn drift_excused(err: &InvalidUpgradeError, policy: &ReleasePolicy) -> bool {
    match (&err.reason, policy.drift_exception) {
        (UpgradeRejection::MinorDrift { drift, .. }, Some(allowance)) => allowance.allows(*drift),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::cluster::WorkloadRef;
    use crate::types::{ChartDependency, ChartFile};
    use crate::version::DriftAllowance;

    #[derive(Default)]
    struct StubObserver(HashMap<String, Result<Semver, &'static str>>);

    impl StubObserver {
        fn with(mut self, name: &str, version: &str) -> Self {
            self.0
                .insert(name.to_string(), Ok(Semver::parse(version).unwrap()));
            self
        }

        fn failing(mut self, name: &str, kind: &'static str) -> Self {
            self.0.insert(name.to_string(), Err(kind));
            self
        }
    }

    #[async_trait]
    impl VersionObserver for StubObserver {
        async fn current_version(&self, release: &str) -> Result<Semver, ClusterError> {
            match self.0.get(release) {
                None => Err(ClusterError::NotFound),
                Some(Ok(version)) => Ok(version.clone()),
                Some(Err("ambiguous")) => Err(ClusterError::Ambiguous { count: 2 }),
                Some(Err(msg)) => Err(ClusterError::Api(anyhow::anyhow!(*msg))),
            }
        }
    }

    fn v(s: &str) -> Semver {
        Semver::parse(s).unwrap()
    }

    fn factory(observer: StubObserver, policies: PolicyTable) -> ActionFactory {
        ActionFactory::new(Arc::new(observer), policies, Span::none())
    }

    fn locked_table() -> PolicyTable {
        PolicyTable::new().with("app", ReleasePolicy::locked())
    }

    async fn decide(factory: &ActionFactory, release: Release, options: PlanOptions) -> Decision {
        factory.decide(&release, &options).await.unwrap()
    }

    #[tokio::test]
    async fn test_locked_release_one_minor_behind_is_upgraded() {
        let factory = factory(StubObserver::default().with("app", "v1.98.1"), locked_table());
        let plan = factory
            .plan(&[Release::new("app", v("v1.99.0"))], &PlanOptions::new(v("v1.99.0")))
            .await
            .unwrap();
        assert_eq!(plan.actions().len(), 1);
        assert_eq!(plan.actions()[0].kind(), &crate::plan::ActionKind::Upgrade { from: v("v1.98.1") });
        assert!(plan.includes_upgrade());
        assert!(plan.skipped().is_empty());
    }

    #[tokio::test]
    async fn test_locked_release_two_minors_behind_is_skipped() {
        let factory = factory(StubObserver::default().with("app", "v1.97.0"), locked_table());
        let plan = factory
            .plan(&[Release::new("app", v("v1.99.0"))], &PlanOptions::new(v("v1.99.0")))
            .await
            .unwrap();
        assert!(plan.is_empty());
        assert!(!plan.includes_upgrade());
        assert_eq!(plan.skipped().len(), 1);
        assert!(plan.skipped()[0].is_minor_drift());
        assert_eq!(plan.skipped()[0].release.as_deref(), Some("app"));
    }

    #[tokio::test]
    async fn test_locked_release_with_foreign_target_is_not_installed() {
        let factory = factory(StubObserver::default(), locked_table());
        let release = Release::new("app", v("v1.1.0"));

        match decide(&factory, release.clone(), PlanOptions::new(v("v1.0.0"))).await {
            Decision::Skip(err) => {
                assert!(err.from.is_none());
                assert!(matches!(err.reason, UpgradeRejection::UnsupportedTarget { .. }));
            }
            other => panic!("expected skip, got {other:?}"),
        }

        let forced = decide(&factory, release, PlanOptions::new(v("v1.0.0")).force(true)).await;
        assert!(matches!(forced, Decision::Apply(ref a) if !a.is_upgrade()));
    }

    #[tokio::test]
    async fn test_locked_release_chart_must_match_build() {
        let factory = factory(StubObserver::default().with("app", "v1.98.0"), locked_table());
        let decision = decide(
            &factory,
            Release::new("app", v("v1.98.5")),
            PlanOptions::new(v("v1.99.0")),
        )
        .await;
        assert!(matches!(decision, Decision::Skip(_)));
    }

    #[tokio::test]
    async fn test_locked_release_never_applied_with_foreign_target() {
        let build = v("v1.99.0");
        for observed in [None, Some("v1.98.0"), Some("v1.99.0"), Some("v1.97.0")] {
            for target in ["v1.98.0", "v1.100.0", "v1.99.1", "v2.0.0"] {
                let observer = match observed {
                    Some(version) => StubObserver::default().with("app", version),
                    None => StubObserver::default(),
                };
                let factory = factory(observer, locked_table());
                let decision =
                    decide(&factory, Release::new("app", v(target)), PlanOptions::new(build.clone()))
                        .await;
                assert!(
                    matches!(decision, Decision::Skip(_)),
                    "observed {observed:?}, target {target}"
                );
            }
        }
    }

    #[tokio::test]
    async fn test_unmanaged_release_same_version_is_skipped() {
        let factory = factory(StubObserver::default().with("coredns", "v1.11.0"), PolicyTable::new());
        let decision = decide(
            &factory,
            Release::new("coredns", v("v1.11.0")),
            PlanOptions::new(v("v1.99.0")),
        )
        .await;
        match decision {
            Decision::Skip(err) => assert_eq!(err.reason, UpgradeRejection::NotNewer),
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_drift_exception_allows_wider_jump() {
        let policies = PolicyTable::new()
            .with("cilium", ReleasePolicy::default().with_drift(DriftAllowance::Any))
            .with("bounded", ReleasePolicy::default().with_drift(DriftAllowance::AtMost(2)));
        let observer = StubObserver::default()
            .with("cilium", "v1.12.0")
            .with("bounded", "v1.12.0")
            .with("plain", "v1.12.0");
        let factory = factory(observer, policies);
        let options = PlanOptions::new(v("v1.99.0"));

        let cilium = decide(&factory, Release::new("cilium", v("v1.15.8")), options.clone()).await;
        assert!(matches!(cilium, Decision::Apply(_)));

        let bounded = decide(&factory, Release::new("bounded", v("v1.15.0")), options.clone()).await;
        assert!(matches!(bounded, Decision::Skip(_)));

        let plain = decide(&factory, Release::new("plain", v("v1.14.0")), options.clone()).await;
        assert!(matches!(plain, Decision::Skip(_)));

        // The exception covers drift only, never a downgrade or major jump.
        let major = decide(&factory, Release::new("cilium", v("v2.0.0")), options).await;
        assert!(matches!(major, Decision::Skip(_)));
    }

    #[tokio::test]
    async fn test_destructive_release_requires_confirmation() {
        let policies = PolicyTable::new().with("cert-manager", ReleasePolicy::destructive());
        let release = Release::new("cert-manager", v("v1.15.0"));

        for observer in [
            StubObserver::default().with("cert-manager", "v1.14.4"),
            StubObserver::default(),
        ] {
            let factory = factory(observer, policies.clone());
            let err = factory
                .plan(
                    &[Release::new("other", v("v1.0.0")), release.clone()],
                    &PlanOptions::new(v("v1.99.0")),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::ConfirmationMissing { ref release } if release == "cert-manager"));
        }

        let factory = factory(
            StubObserver::default().with("cert-manager", "v1.14.4"),
            policies,
        );
        let plan = factory
            .plan(
                &[release],
                &PlanOptions::new(v("v1.99.0")).allow_destructive(true),
            )
            .await
            .unwrap();
        assert_eq!(plan.actions().len(), 1);
    }

    #[tokio::test]
    async fn test_destructive_release_without_action_needs_no_confirmation() {
        let policies = PolicyTable::new().with("cert-manager", ReleasePolicy::destructive());
        let factory = factory(
            StubObserver::default().with("cert-manager", "v1.15.0"),
            policies,
        );
        let plan = factory
            .plan(
                &[Release::new("cert-manager", v("v1.15.0"))],
                &PlanOptions::new(v("v1.99.0")),
            )
            .await
            .unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.skipped().len(), 1);
    }

    #[tokio::test]
    async fn test_observation_errors_are_fatal() {
        for kind in ["ambiguous", "connection refused"] {
            let factory = factory(StubObserver::default().failing("app", kind), locked_table());
            let err = factory
                .plan(&[Release::new("app", v("v1.99.0"))], &PlanOptions::new(v("v1.99.0")))
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::Observe { .. }), "{kind}: {err}");
            assert!(!err.is_recoverable());
        }
    }

    #[tokio::test]
    async fn test_hooks_are_attached_from_policy() {
        let workload = WorkloadRef {
            namespace: "kube-system".to_string(),
            name: "cilium".to_string(),
        };
        let policies = PolicyTable::new()
            .with("operators", ReleasePolicy::locked().owning_crds())
            .with("cilium", ReleasePolicy::default().gated_on(workload.clone()));
        let factory = factory(StubObserver::default().with("operators", "v1.98.0"), policies);
        let operators = Release::new("operators", v("v1.99.0")).with_dependency(ChartDependency {
            name: "operator".to_string(),
            files: vec![ChartFile {
                name: "crds/nodeversion.yaml".to_string(),
                data: "kind: CustomResourceDefinition".to_string(),
            }],
        });

        let plan = factory
            .plan(
                &[Release::new("cilium", v("v1.15.8")), operators],
                &PlanOptions::new(v("v1.99.0")),
            )
            .await
            .unwrap();

        let names: Vec<&str> = plan.actions().iter().map(ReleaseAction::name).collect();
        assert_eq!(names, vec!["operators", "cilium"]);

        match plan.actions()[0].pre_hook() {
            Some(Hook::RefreshCrds { manifests }) => assert_eq!(manifests.len(), 1),
            other => panic!("expected CRD refresh, got {other:?}"),
        }
        assert_eq!(
            plan.actions()[1].post_hook(),
            Some(&Hook::AwaitReadiness { workload })
        );
        assert!(plan.actions()[1].pre_hook().is_none());
    }

    #[tokio::test]
    async fn test_force_skips_version_checks() {
        let factory = factory(StubObserver::default().with("app", "v1.90.0"), locked_table());
        let decision = decide(
            &factory,
            Release::new("app", v("v1.99.0")),
            PlanOptions::new(v("v1.99.0")).force(true),
        )
        .await;
        assert!(matches!(decision, Decision::Apply(ref a) if a.is_upgrade()));
    }
}
