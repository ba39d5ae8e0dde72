//! Version parsing and upgrade compatibility.

pub mod compat;
pub mod semver;

pub use compat::{DriftAllowance, check_upgrade, compatible_with_binary, is_upgrade_to};
pub use semver::Semver;
