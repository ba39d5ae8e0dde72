//! Upgrade planning: decide per release, then order the result.

pub mod action;
pub mod factory;

pub use action::{ActionKind, Decision, Hook, ReleaseAction};
pub use factory::{ActionFactory, PlanOptions};

use crate::error::InvalidUpgradeError;

/// Actions for one run, upgrades first, plus the releases skipped by version policy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpgradePlan {
    actions: Vec<ReleaseAction>,
    skipped: Vec<InvalidUpgradeError>,
}

impl UpgradePlan {
    /// Builds a plan, moving every upgrade ahead of every install.
    ///
    /// Relative order inside each group is kept. Installing after upgrading avoids
    /// name collisions when a former sub-chart becomes a standalone release.
    pub fn new(actions: Vec<ReleaseAction>, skipped: Vec<InvalidUpgradeError>) -> Self {
        let (mut ordered, installs): (Vec<_>, Vec<_>) =
            actions.into_iter().partition(ReleaseAction::is_upgrade);
        ordered.extend(installs);
        Self {
            actions: ordered,
            skipped,
        }
    }

    pub fn actions(&self) -> &[ReleaseAction] {
        &self.actions
    }

    pub fn skipped(&self) -> &[InvalidUpgradeError] {
        &self.skipped
    }

    pub fn includes_upgrade(&self) -> bool {
        self.actions.iter().any(ReleaseAction::is_upgrade)
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn into_parts(self) -> (Vec<ReleaseAction>, Vec<InvalidUpgradeError>) {
        (self.actions, self.skipped)
    }
}
