//! Build units the manifest can declare.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use treeforge_core::api::{
    LegacyUnit, ModernUnit, RebuildContext, Resolver, TempDirAllocator, Unit, UnitError, UnitInfo,
};
use walkdir::WalkDir;

/// Copy the contents of `src` into `dest`, overwriting files that already
/// exist.
pub fn copy_tree(src: &Path, dest: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src).map_err(io::Error::other)?;
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Merges its inputs into one directory, later inputs winning.
pub struct MergeUnit {
    id: String,
    annotation: Option<String>,
    inputs: OnceLock<Vec<Unit>>,
    temp: Arc<dyn TempDirAllocator>,
}

impl MergeUnit {
    pub fn new(id: &str, annotation: Option<String>, temp: Arc<dyn TempDirAllocator>) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            annotation,
            inputs: OnceLock::new(),
            temp,
        })
    }

    /// Inputs are bound after every unit of the manifest exists.
    pub fn bind(&self, inputs: Vec<Unit>) {
        let _ = self.inputs.set(inputs);
    }

    fn dir_name(&self) -> String {
        format!("merge-{}", self.id)
    }
}

#[async_trait]
impl ModernUnit for MergeUnit {
    fn info(&self) -> UnitInfo {
        UnitInfo {
            name: Some("MergeUnit".to_string()),
            annotation: self.annotation.clone(),
            description: Some(self.id.clone()),
            ..UnitInfo::default()
        }
    }

    async fn read(&self, resolver: &Resolver<'_>) -> Result<Option<PathBuf>, UnitError> {
        let out = self.temp.make_or_reuse(&self.dir_name())?;
        self.temp.clear(&out)?;
        for input in self.inputs.get().map(Vec::as_slice).unwrap_or_default() {
            let dir = resolver.read(input).await?;
            copy_tree(&dir, &out)?;
        }
        Ok(Some(out))
    }

    async fn cleanup(&self) -> Result<(), UnitError> {
        self.temp.remove(&self.dir_name())?;
        Ok(())
    }
}

/// The same merge, written against the legacy rebuild contract.
pub struct LegacyMerge {
    id: String,
    annotation: Option<String>,
    inputs: OnceLock<Vec<Unit>>,
}

impl LegacyMerge {
    pub fn new(id: &str, annotation: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            annotation,
            inputs: OnceLock::new(),
        })
    }

    pub fn bind(&self, inputs: Vec<Unit>) {
        let _ = self.inputs.set(inputs);
    }
}

#[async_trait]
impl LegacyUnit for LegacyMerge {
    fn info(&self) -> UnitInfo {
        UnitInfo {
            name: Some("LegacyMerge".to_string()),
            annotation: self.annotation.clone(),
            description: Some(self.id.clone()),
            ..UnitInfo::default()
        }
    }

    fn inputs(&self) -> Option<Vec<Unit>> {
        Some(self.inputs.get().cloned().unwrap_or_default())
    }

    async fn rebuild(&self, ctx: &RebuildContext) -> Result<(), UnitError> {
        for input in ctx.input_paths() {
            copy_tree(input, &ctx.output_path)?;
        }
        tracing::debug!(unit = %self.id, inputs = ctx.input_paths().len(), "merged");
        Ok(())
    }
}
