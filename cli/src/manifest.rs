//! TOML description of a unit tree.
//!
//! ```toml
//! root = "dist"
//!
//! [[units]]
//! id = "styles"
//! kind = "path"
//! path = "app/styles"
//!
//! [[units]]
//! id = "dist"
//! kind = "merge"
//! annotation = "TreeMerger (app)"
//! inputs = ["styles", "public"]   # unit ids, else paths
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use treeforge_core::api::{TempDirAllocator, Unit};

use crate::error::CliError;
use crate::units::{LegacyMerge, MergeUnit};

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Unit id or path of the tree root.
    pub root: String,

    #[serde(default)]
    pub units: Vec<UnitDecl>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnitDecl {
    pub id: String,
    pub kind: UnitKind,

    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub inputs: Vec<String>,

    #[serde(default)]
    pub annotation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitKind {
    Path,
    Merge,
    LegacyMerge,
}

enum Binding {
    Modern(Arc<MergeUnit>),
    Legacy(Arc<LegacyMerge>),
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| CliError::Manifest(format!("read {} failed: {e}", path.display())))?;
        Self::parse(&s)
    }

    pub fn parse(s: &str) -> Result<Self, CliError> {
        toml::from_str(s).map_err(|e| CliError::Manifest(e.to_string()))
    }

    /// Turn the manifest into a unit tree. Relative paths resolve against
    /// `base`.
    pub fn instantiate(
        &self,
        base: &Path,
        temp: Arc<dyn TempDirAllocator>,
    ) -> Result<Unit, CliError> {
        let mut units: HashMap<&str, Unit> = HashMap::new();
        let mut bindings = Vec::new();

        for decl in &self.units {
            if units.contains_key(decl.id.as_str()) {
                return Err(CliError::Manifest(format!("duplicate unit id `{}`", decl.id)));
            }
            let unit = match decl.kind {
                UnitKind::Path => {
                    let path = decl.path.as_ref().ok_or_else(|| {
                        CliError::Manifest(format!("path unit `{}` has no `path`", decl.id))
                    })?;
                    Unit::Leaf(base.join(path))
                }
                UnitKind::Merge => {
                    let merge = MergeUnit::new(&decl.id, decl.annotation.clone(), temp.clone());
                    bindings.push((decl, Binding::Modern(merge.clone())));
                    Unit::Modern(merge)
                }
                UnitKind::LegacyMerge => {
                    let merge = LegacyMerge::new(&decl.id, decl.annotation.clone());
                    bindings.push((decl, Binding::Legacy(merge.clone())));
                    Unit::Legacy(merge)
                }
            };
            units.insert(decl.id.as_str(), unit);
        }

        let lookup = |reference: &str| match units.get(reference) {
            Some(unit) => unit.clone(),
            None => Unit::Leaf(base.join(reference)),
        };

        for (decl, binding) in bindings {
            let inputs = decl.inputs.iter().map(|r| lookup(r.as_str())).collect();
            match binding {
                Binding::Modern(merge) => merge.bind(inputs),
                Binding::Legacy(merge) => merge.bind(inputs),
            }
        }

        tracing::debug!(units = units.len(), root = %self.root, "manifest instantiated");
        Ok(lookup(self.root.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treeforge_core::api::TempDirs;

    const SAMPLE: &str = r#"
root = "dist"

[[units]]
id = "styles"
kind = "path"
path = "app/styles"

[[units]]
id = "vendor"
kind = "legacy-merge"
inputs = ["vendor/js", "vendor/css"]

[[units]]
id = "dist"
kind = "merge"
annotation = "TreeMerger (app)"
inputs = ["styles", "vendor", "public"]
"#;

    fn temp() -> Arc<dyn TempDirAllocator> {
        Arc::new(TempDirs::default())
    }

    #[test]
    fn parses_kinds_and_inputs() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        assert_eq!(manifest.root, "dist");
        let kinds: Vec<_> = manifest.units.iter().map(|u| u.kind).collect();
        assert_eq!(kinds, vec![UnitKind::Path, UnitKind::LegacyMerge, UnitKind::Merge]);
    }

    #[test]
    fn root_resolves_to_the_declared_unit() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        let root = manifest.instantiate(Path::new("/project"), temp()).unwrap();
        assert_eq!(root.description(), "TreeMerger (app)");
        assert_eq!(root.plugin_name().as_deref(), Some("MergeUnit"));
    }

    #[test]
    fn unknown_root_is_a_path() {
        let manifest = Manifest::parse("root = \"public\"").unwrap();
        let root = manifest.instantiate(Path::new("/project"), temp()).unwrap();
        assert_eq!(root.as_path(), Some(Path::new("/project/public")));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let manifest = Manifest::parse(
            r#"
root = "a"
[[units]]
id = "a"
kind = "merge"
[[units]]
id = "a"
kind = "merge"
"#,
        )
        .unwrap();
        let err = manifest.instantiate(Path::new("."), temp()).unwrap_err();
        assert!(err.to_string().contains("duplicate unit id"));
    }

    #[test]
    fn path_units_need_a_path() {
        let manifest = Manifest::parse(
            r#"
root = "a"
[[units]]
id = "a"
kind = "path"
"#,
        )
        .unwrap();
        assert!(matches!(
            manifest.instantiate(Path::new("."), temp()),
            Err(CliError::Manifest(_))
        ));
    }
}
