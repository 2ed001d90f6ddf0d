use std::path::{Path, PathBuf};

use thiserror::Error;

use super::types::TreeforgeConfig;

pub const DEFAULT_CONFIG_FILE: &str = "treeforge.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Load configuration.
///
/// Priority: `path` if given, else `./treeforge.toml` if it exists, else
/// defaults. `TREEFORGE_*` environment variables override the result.
pub fn load(path: Option<&Path>) -> Result<TreeforgeConfig, ConfigError> {
    let local = Path::new(DEFAULT_CONFIG_FILE);
    let source = match path {
        Some(p) => Some(p),
        None if local.exists() => Some(local),
        None => None,
    };

    let mut cfg = match source {
        Some(p) => {
            let s = std::fs::read_to_string(p).map_err(|source| ConfigError::Io {
                path: p.to_path_buf(),
                source,
            })?;
            from_toml_str(&s)?
        }
        None => TreeforgeConfig::default(),
    };

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok());
    Ok(cfg)
}

pub fn from_toml_str(s: &str) -> Result<TreeforgeConfig, ConfigError> {
    let cfg: TreeforgeConfig = toml::from_str(s)?;
    validate(&cfg)?;
    Ok(cfg)
}

fn apply_env_overrides(cfg: &mut TreeforgeConfig, var: impl Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = non_empty("TREEFORGE_LOG_LEVEL") {
        cfg.logging.level = v;
    }
    if let Some(v) = non_empty("TREEFORGE_LOG_TIMINGS") {
        cfg.logging.timings = is_truthy(&v);
    }
    if let Some(v) = non_empty("TREEFORGE_WARN_LEGACY_API") {
        cfg.builder.warn_legacy_api = is_truthy(&v);
    }
    if let Some(v) = non_empty("TREEFORGE_TEMP_ROOT") {
        cfg.builder.temp_root = Some(v);
    }
}

fn is_truthy(v: &str) -> bool {
    matches!(v.trim(), "1" | "true" | "yes" | "on")
}

fn validate(cfg: &TreeforgeConfig) -> Result<(), ConfigError> {
    for group in &cfg.cache.groups {
        if group.name.trim().is_empty() {
            return Err(ConfigError::Invalid("cache group with empty name".into()));
        }
        if let Some(unknown) = group
            .invalidated_by
            .iter()
            .find(|c| !cfg.cache.categories.contains_key(c.as_str()))
        {
            return Err(ConfigError::Invalid(format!(
                "cache group `{}` is invalidated by unknown category `{}`",
                group.name, unknown
            )));
        }
    }
    Ok(())
}
