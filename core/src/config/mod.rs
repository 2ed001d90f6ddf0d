mod load;
mod types;

pub use load::{from_toml_str, load, ConfigError, DEFAULT_CONFIG_FILE};
pub use types::{
    BuilderConfig, CacheConfig, CacheGroupConfig, CacheRule, KeySource, LoggingConfig, TextMatch,
    TreeforgeConfig,
};
