use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A named class of file changes, e.g. `styles` or `scripts`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeCategory(String);

impl ChangeCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChangeCategory {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// What changed since the previous pass, supplied by the caller of
/// [`crate::Builder::build`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStrategy {
    changed: BTreeSet<ChangeCategory>,
    first_pass: bool,
}

impl Default for BuildStrategy {
    fn default() -> Self {
        Self::initial()
    }
}

impl BuildStrategy {
    /// The cache is neither read nor written during an initial pass.
    pub fn initial() -> Self {
        Self {
            changed: BTreeSet::new(),
            first_pass: true,
        }
    }

    pub fn incremental<I, C>(changed: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ChangeCategory>,
    {
        Self {
            changed: changed.into_iter().map(Into::into).collect(),
            first_pass: false,
        }
    }

    pub fn is_first_pass(&self) -> bool {
        self.first_pass
    }

    pub fn changed(&self) -> &BTreeSet<ChangeCategory> {
        &self.changed
    }
}
