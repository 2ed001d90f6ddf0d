use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::{ChangeCategory, RulePolicy};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeforgeConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub builder: BuilderConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, also log to a file under `directory` (or OS temp dir if unset).
    #[serde(default)]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "treeforge_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    #[serde(default)]
    pub directory: Option<String>,

    /// Print busy/idle time of every unit when its node span closes.
    #[serde(default)]
    pub timings: bool,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: false,
            level: default_logging_level(),
            directory: None,
            timings: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Print a deprecation warning for every unit on the legacy rebuild API.
    #[serde(default)]
    pub warn_legacy_api: bool,

    /// Root for adapter scratch directories. OS temp dir when unset.
    #[serde(default)]
    pub temp_root: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Change category name to the file extensions (without dot) it covers.
    #[serde(default = "default_categories")]
    pub categories: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub groups: Vec<CacheGroupConfig>,
}

fn default_categories() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        ("styles".to_string(), vec!["css".to_string(), "scss".to_string()]),
        ("templates".to_string(), vec!["hbs".to_string()]),
        ("scripts".to_string(), vec!["js".to_string()]),
    ])
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            groups: Vec::new(),
        }
    }
}

impl CacheConfig {
    pub fn policy(&self) -> RulePolicy {
        RulePolicy::new(self.groups.clone())
    }

    /// Change categories touched by `files`, by extension.
    pub fn categorize<P: AsRef<Path>>(&self, files: impl IntoIterator<Item = P>) -> BTreeSet<ChangeCategory> {
        let mut out = BTreeSet::new();
        for file in files {
            let Some(ext) = file.as_ref().extension().and_then(|e| e.to_str()) else {
                continue;
            };
            for (category, extensions) in &self.categories {
                if extensions.iter().any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext)) {
                    out.insert(ChangeCategory::new(category.as_str()));
                }
            }
        }
        out
    }
}

/// One memoization group: units recognized by any of `rules` share its
/// invalidation fate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheGroupConfig {
    pub name: String,

    /// Categories that purge this group. Empty means never purged.
    #[serde(default)]
    pub invalidated_by: Vec<String>,

    /// Annotation substrings that disqualify a unit from this group.
    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub rules: Vec<CacheRule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheRule {
    #[serde(default)]
    pub annotation: Option<TextMatch>,

    #[serde(default)]
    pub name: Option<TextMatch>,

    #[serde(default)]
    pub dest_dir: Option<TextMatch>,

    #[serde(default)]
    pub requires_files: bool,

    #[serde(default)]
    pub key: KeySource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMatch {
    Equals(String),
    Contains(String),
    /// Matches when the value contains any of the listed substrings.
    ContainsAny(Vec<String>),
}

impl TextMatch {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Equals(s) => value == s,
            Self::Contains(s) => value.contains(s.as_str()),
            Self::ContainsAny(list) => list.iter().any(|s| value.contains(s.as_str())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    #[default]
    Annotation,
    AnnotationAndOutputPath,
    NameAndDirectoryPath,
    NameAndDestDir,
    NameAndFiles,
}
