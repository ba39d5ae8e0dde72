//! Engine configuration: retry and readiness tuning plus the release policy table.

pub mod parser;
pub mod schema;
pub mod store;

pub use parser::{parse_config, parse_config_str, to_toml};
pub use schema::{DEFAULT_BACKUP_DIR, EngineConfig, ReadinessConfig, RetryConfig};
pub use store::{CONFIG_FILE_NAME, ConfigStore};
