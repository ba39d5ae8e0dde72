//! Upgrade compatibility rules between two versions.
//!
//! An upgrade is valid when the candidate is strictly newer, shares the major version,
//! and moves at most one minor version ahead. Wider drift for specific releases is
//! granted by the policy table, never here.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{InvalidUpgradeError, UpgradeRejection};
use crate::version::Semver;

/// Maximum minor-version distance of a regular upgrade.
pub const DEFAULT_MAX_MINOR_DRIFT: u64 = 1;

/// Minor-version drift granted to a release beyond the default.
///
/// Written as a number or the literal `"any"` in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftAllowance {
    AtMost(u64),
    Any,
}

impl DriftAllowance {
    pub fn allows(&self, drift: u64) -> bool {
        match self {
            Self::AtMost(limit) => drift <= *limit,
            Self::Any => true,
        }
    }
}

/// Check whether `candidate` is a valid upgrade from `current`.
pub fn is_upgrade_to(candidate: &Semver, current: &Semver) -> Result<(), InvalidUpgradeError> {
    check_upgrade(candidate, current, DEFAULT_MAX_MINOR_DRIFT)
}

/// Like [`is_upgrade_to`] but with an explicit minor drift bound.
pub fn check_upgrade(
    candidate: &Semver,
    current: &Semver,
    max_minor_drift: u64,
) -> Result<(), InvalidUpgradeError> {
    let reject = |reason| Err(InvalidUpgradeError::new(Some(current.clone()), candidate.clone(), reason));

    if candidate.major() != current.major() {
        return reject(UpgradeRejection::MajorMismatch);
    }
    if candidate <= current {
        return reject(UpgradeRejection::NotNewer);
    }
    let drift = candidate.minor() - current.minor();
    if drift > max_minor_drift {
        return reject(UpgradeRejection::MinorDrift {
            drift,
            allowed: max_minor_drift,
        });
    }
    Ok(())
}

/// Whether a binary built at `build` may operate on a cluster running `version`.
pub fn compatible_with_binary(version: &Semver, build: &Semver) -> bool {
    version == build || is_upgrade_to(build, version).is_ok()
}

impl Serialize for DriftAllowance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::AtMost(limit) => serializer.serialize_u64(*limit),
            Self::Any => serializer.serialize_str("any"),
        }
    }
}

impl<'de> Deserialize<'de> for DriftAllowance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Limit(u64),
            Word(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Limit(limit) => Ok(Self::AtMost(limit)),
            Raw::Word(word) if word == "any" => Ok(Self::Any),
            Raw::Word(word) => Err(serde::de::Error::custom(format!(
                "expected a number or \"any\", got {word:?}"
            ))),
        }
    }
}
