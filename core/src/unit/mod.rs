//! Build units: the nodes of the dependency tree a [`crate::Builder`] resolves.
//!
//! A unit is one of three variants, fixed when it is constructed:
//!
//! - [`Unit::Leaf`]: a plain path, which is its own output.
//! - [`Unit::Legacy`]: declares inputs and rebuilds in place; bridged by the
//!   revision adapter.
//! - [`Unit::Modern`]: reads its inputs through a resolver and returns its
//!   output directory.
//!
//! Identity is object identity for the two plugin variants and the path for
//! leaves.

mod traits;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

pub use traits::{InputPaths, LegacyUnit, ModernUnit, RebuildContext};

#[derive(Clone)]
pub enum Unit {
    Leaf(PathBuf),
    Legacy(Arc<dyn LegacyUnit>),
    Modern(Arc<dyn ModernUnit>),
}

/// Identity key of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UnitId {
    Path(PathBuf),
    Object(usize),
}

/// Descriptive metadata a unit may report about itself.
///
/// Used for descriptions, failure envelopes and result-cache recognition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitInfo {
    /// Plugin name, e.g. `Funnel` or `UnwatchedDir`.
    pub name: Option<String>,
    pub annotation: Option<String>,
    pub description: Option<String>,
    pub dest_dir: Option<String>,
    pub output_path: Option<String>,
    pub directory_path: Option<String>,
    pub files: Vec<String>,
    pub instantiation_stack: Option<String>,
}

impl UnitInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn annotated(annotation: impl Into<String>) -> Self {
        Self {
            annotation: Some(annotation.into()),
            ..Self::default()
        }
    }

    /// Annotation, then description, then plugin name.
    pub fn describe(&self) -> String {
        self.annotation
            .as_deref()
            .or(self.description.as_deref())
            .or(self.name.as_deref())
            .unwrap_or("<anonymous unit>")
            .to_string()
    }
}

impl Unit {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Leaf(path.into())
    }

    pub fn id(&self) -> UnitId {
        match self {
            Self::Leaf(path) => UnitId::Path(path.clone()),
            Self::Legacy(unit) => UnitId::Object(Arc::as_ptr(unit) as *const () as usize),
            Self::Modern(unit) => UnitId::Object(Arc::as_ptr(unit) as *const () as usize),
        }
    }

    pub fn same_as(&self, other: &Unit) -> bool {
        self.id() == other.id()
    }

    pub fn info(&self) -> UnitInfo {
        match self {
            Self::Leaf(_) => UnitInfo::default(),
            Self::Legacy(unit) => unit.info(),
            Self::Modern(unit) => unit.info(),
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::Leaf(path) => path.display().to_string(),
            _ => self.info().describe(),
        }
    }

    /// Plain paths have no plugin name.
    pub fn plugin_name(&self) -> Option<String> {
        match self {
            Self::Leaf(_) => None,
            _ => self.info().name,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Leaf(path) => Some(path),
            _ => None,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }

    pub fn downgrade(&self) -> WeakUnit {
        match self {
            Self::Leaf(path) => WeakUnit::Leaf(path.clone()),
            Self::Legacy(unit) => WeakUnit::Legacy(Arc::downgrade(unit)),
            Self::Modern(unit) => WeakUnit::Modern(Arc::downgrade(unit)),
        }
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Leaf(_) => "Leaf",
            Self::Legacy(_) => "Legacy",
            Self::Modern(_) => "Modern",
        };
        f.debug_tuple(kind).field(&self.description()).finish()
    }
}

impl From<&str> for Unit {
    fn from(path: &str) -> Self {
        Self::Leaf(PathBuf::from(path))
    }
}

impl From<String> for Unit {
    fn from(path: String) -> Self {
        Self::Leaf(PathBuf::from(path))
    }
}

impl From<PathBuf> for Unit {
    fn from(path: PathBuf) -> Self {
        Self::Leaf(path)
    }
}

/// Non-owning back reference from a build node to its unit.
#[derive(Clone)]
pub enum WeakUnit {
    Leaf(PathBuf),
    Legacy(Weak<dyn LegacyUnit>),
    Modern(Weak<dyn ModernUnit>),
}

impl WeakUnit {
    pub fn upgrade(&self) -> Option<Unit> {
        match self {
            Self::Leaf(path) => Some(Unit::Leaf(path.clone())),
            Self::Legacy(unit) => unit.upgrade().map(Unit::Legacy),
            Self::Modern(unit) => unit.upgrade().map(Unit::Modern),
        }
    }
}

impl fmt::Debug for WeakUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(unit) => unit.fmt(f),
            None => f.write_str("<dropped unit>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_is_used_over_description() {
        let info = UnitInfo {
            annotation: Some("fakeNode: boo".into()),
            description: Some("fakeNode: who".into()),
            ..UnitInfo::default()
        };
        assert_eq!(info.describe(), "fakeNode: boo");
    }

    #[test]
    fn description_then_plugin_name() {
        let described = UnitInfo {
            description: Some("fakeNode: boo".into()),
            name: Some("FakeBaseNode".into()),
            ..UnitInfo::default()
        };
        assert_eq!(described.describe(), "fakeNode: boo");
        assert_eq!(UnitInfo::named("FakeBaseNode").describe(), "FakeBaseNode");
    }

    #[test]
    fn leaves_describe_as_their_path_and_have_no_plugin() {
        let leaf = Unit::from("some/path/here/");
        assert_eq!(leaf.description(), "some/path/here/");
        assert_eq!(leaf.plugin_name(), None);
    }

    #[test]
    fn leaves_share_identity_by_path() {
        assert!(Unit::from("src").same_as(&Unit::path("src")));
        assert!(!Unit::from("src").same_as(&Unit::from("lib")));
    }
}
