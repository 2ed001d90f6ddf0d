use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{Unit, UnitInfo};
use crate::builder::Resolver;
use crate::error::UnitError;

/// A unit that reads its inputs through a resolver and returns its output
/// directory.
#[async_trait]
pub trait ModernUnit: Send + Sync {
    fn info(&self) -> UnitInfo {
        UnitInfo::default()
    }

    /// Read inputs (one at a time) via `resolver` and return the output
    /// directory. Returning `Ok(None)` fails the pass.
    async fn read(&self, resolver: &Resolver<'_>) -> Result<Option<PathBuf>, UnitError>;

    async fn cleanup(&self) -> Result<(), UnitError> {
        Ok(())
    }
}

/// A unit written against the legacy contract: it declares its inputs up
/// front and rebuilds into the output directory it is handed.
///
/// Exactly one of [`LegacyUnit::input`] and [`LegacyUnit::inputs`] must be
/// provided.
#[async_trait]
pub trait LegacyUnit: Send + Sync {
    fn info(&self) -> UnitInfo {
        UnitInfo::default()
    }

    fn input(&self) -> Option<Unit> {
        None
    }

    fn inputs(&self) -> Option<Vec<Unit>> {
        None
    }

    async fn rebuild(&self, ctx: &RebuildContext) -> Result<(), UnitError>;

    async fn cleanup(&self) -> Result<(), UnitError> {
        Ok(())
    }
}

/// Resolved input directories, shaped like the unit's declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputPaths {
    Single(PathBuf),
    Multiple(Vec<PathBuf>),
}

/// Everything a legacy rebuild gets to work with.
#[derive(Debug, Clone)]
pub struct RebuildContext {
    pub inputs: InputPaths,
    pub output_path: PathBuf,
    pub cache_path: PathBuf,
}

impl RebuildContext {
    pub fn input_path(&self) -> Option<&Path> {
        match &self.inputs {
            InputPaths::Single(path) => Some(path),
            InputPaths::Multiple(_) => None,
        }
    }

    pub fn input_paths(&self) -> &[PathBuf] {
        match &self.inputs {
            InputPaths::Single(path) => std::slice::from_ref(path),
            InputPaths::Multiple(paths) => paths,
        }
    }
}
