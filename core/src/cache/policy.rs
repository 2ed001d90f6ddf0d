use std::collections::{BTreeSet, HashSet};

use super::strategy::ChangeCategory;
use crate::config::{CacheGroupConfig, CacheRule, KeySource, TextMatch};
use crate::unit::UnitInfo;

/// Structural identity of a memoizable unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    /// Name of the cache group the unit was recognized by.
    pub group: String,
    pub key: String,
}

/// Decides which units may be memoized across passes and which cache groups
/// a set of change categories invalidates.
pub trait RecognitionPolicy: Send + Sync {
    fn recognize(&self, info: &UnitInfo) -> Option<Signature>;

    fn affected_groups(&self, changed: &BTreeSet<ChangeCategory>) -> HashSet<String>;
}

/// Memoizes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMemoization;

impl RecognitionPolicy for NoMemoization {
    fn recognize(&self, _info: &UnitInfo) -> Option<Signature> {
        None
    }

    fn affected_groups(&self, _changed: &BTreeSet<ChangeCategory>) -> HashSet<String> {
        HashSet::new()
    }
}

/// Rule-driven policy built from `[[cache.groups]]`. Groups are tried in
/// declaration order and the first matching rule wins.
#[derive(Debug, Clone, Default)]
pub struct RulePolicy {
    groups: Vec<CacheGroupConfig>,
}

impl RulePolicy {
    pub fn new(groups: Vec<CacheGroupConfig>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[CacheGroupConfig] {
        &self.groups
    }
}

impl RecognitionPolicy for RulePolicy {
    fn recognize(&self, info: &UnitInfo) -> Option<Signature> {
        self.groups.iter().find_map(|group| {
            if is_excluded(group, info) {
                return None;
            }
            group
                .rules
                .iter()
                .filter(|rule| rule_matches(rule, info))
                .find_map(|rule| derive_key(rule.key, info))
                .map(|key| Signature {
                    group: group.name.clone(),
                    key,
                })
        })
    }

    fn affected_groups(&self, changed: &BTreeSet<ChangeCategory>) -> HashSet<String> {
        self.groups
            .iter()
            .filter(|group| {
                group
                    .invalidated_by
                    .iter()
                    .any(|category| changed.iter().any(|c| c.as_str() == category))
            })
            .map(|group| group.name.clone())
            .collect()
    }
}

fn is_excluded(group: &CacheGroupConfig, info: &UnitInfo) -> bool {
    let Some(annotation) = info.annotation.as_deref() else {
        return false;
    };
    group.exclude.iter().any(|needle| annotation.contains(needle.as_str()))
}

fn rule_matches(rule: &CacheRule, info: &UnitInfo) -> bool {
    let field = |matcher: &Option<TextMatch>, value: Option<&str>| match matcher {
        None => true,
        Some(m) => value.is_some_and(|v| m.matches(v)),
    };

    field(&rule.annotation, info.annotation.as_deref())
        && field(&rule.name, info.name.as_deref())
        && field(&rule.dest_dir, info.dest_dir.as_deref())
        && (!rule.requires_files || !info.files.is_empty())
}

fn derive_key(source: KeySource, info: &UnitInfo) -> Option<String> {
    let join = |a: Option<&String>, b: Option<&String>| Some(format!("{}{}", a?, b?));
    match source {
        KeySource::Annotation => info.annotation.clone(),
        KeySource::AnnotationAndOutputPath => join(info.annotation.as_ref(), info.output_path.as_ref()),
        KeySource::NameAndDirectoryPath => join(info.name.as_ref(), info.directory_path.as_ref()),
        KeySource::NameAndDestDir => join(info.name.as_ref(), info.dest_dir.as_ref()),
        KeySource::NameAndFiles => {
            let name = info.name.as_ref()?;
            Some(format!("{}{}", name, info.files.join(":")))
        }
    }
}
