use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::builder::Resolver;
use crate::error::{BuildError, UnitError};
use crate::tmp::{sanitize, TempDirAllocator};
use crate::unit::{InputPaths, LegacyUnit, ModernUnit, RebuildContext, Unit, UnitInfo};
use crate::util::lock;

static NEXT_ADAPTER: AtomicU64 = AtomicU64::new(0);

/// Monotonic change marker of a legacy unit's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision(u64);

impl Revision {
    pub const INITIAL: Revision = Revision(0);

    pub fn get(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Revision(self.0 + 1)
    }
}

enum DeclaredInputs {
    Single(Unit),
    Multiple(Vec<Unit>),
}

impl DeclaredInputs {
    fn units(&self) -> &[Unit] {
        match self {
            Self::Single(unit) => std::slice::from_ref(unit),
            Self::Multiple(units) => units,
        }
    }

    fn shape(&self, mut paths: Vec<PathBuf>) -> InputPaths {
        match self {
            Self::Single(_) => InputPaths::Single(paths.remove(0)),
            Self::Multiple(_) => InputPaths::Multiple(paths),
        }
    }
}

struct RevisionState {
    revision: Option<Revision>,
    has_run: bool,
    last_seen: Vec<Option<Revision>>,
}

/// Presents a [`LegacyUnit`] through the [`ModernUnit`] contract, rebuilding
/// only when an input's revision moved since the previous pass.
pub struct RevisionAdapter {
    unit: Arc<dyn LegacyUnit>,
    inputs: DeclaredInputs,
    description: String,
    dir_prefix: String,
    temp: Arc<dyn TempDirAllocator>,
    state: Mutex<RevisionState>,
}

impl RevisionAdapter {
    /// Fails unless the unit declares exactly one of `input` / `inputs`.
    pub fn new(unit: Arc<dyn LegacyUnit>, temp: Arc<dyn TempDirAllocator>) -> Result<Self, BuildError> {
        let description = unit.info().describe();
        let inputs = match (unit.input(), unit.inputs()) {
            (Some(_), Some(_)) => {
                return Err(BuildError::invalid_unit(
                    description,
                    "cannot declare both a single input and multiple inputs",
                ))
            }
            (None, None) => {
                return Err(BuildError::invalid_unit(description, "no input or inputs declared"))
            }
            (Some(input), None) => DeclaredInputs::Single(input),
            (None, Some(inputs)) => DeclaredInputs::Multiple(inputs),
        };
        let slots = inputs.units().len();
        let dir_prefix = format!(
            "{}-{}",
            sanitize(&description),
            NEXT_ADAPTER.fetch_add(1, Ordering::Relaxed)
        );

        Ok(Self {
            unit,
            inputs,
            description,
            dir_prefix,
            temp,
            state: Mutex::new(RevisionState {
                revision: None,
                has_run: false,
                last_seen: vec![None; slots],
            }),
        })
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// `None` until the first rebuild attempt or explicit revision.
    pub fn revision(&self) -> Option<Revision> {
        lock(&self.state).revision
    }

    /// Advance this unit's revision so consumers observe a change.
    pub fn revised(&self) {
        let mut state = lock(&self.state);
        state.revision = Some(match state.revision {
            None => Revision::INITIAL,
            Some(current) => current.next(),
        });
    }

    /// Compare current input revisions with the last observed ones, record
    /// them, and report whether a rebuild is due.
    fn needs_rebuild(&self, current: &[Option<Revision>]) -> bool {
        let mut state = lock(&self.state);
        let mut changed = false;
        for (slot, now) in state.last_seen.iter_mut().zip(current) {
            let last = std::mem::replace(slot, *now);
            // Inputs without a revision cannot prove they are unchanged.
            changed |= match (last, *now) {
                (Some(last), Some(now)) => last != now,
                _ => true,
            };
        }
        changed || !state.has_run
    }

    fn output_dir_name(&self) -> String {
        format!("{}/output", self.dir_prefix)
    }

    fn cache_dir_name(&self) -> String {
        format!("{}/cache", self.dir_prefix)
    }
}

#[async_trait]
impl ModernUnit for RevisionAdapter {
    fn info(&self) -> UnitInfo {
        self.unit.info()
    }

    async fn read(&self, resolver: &Resolver<'_>) -> Result<Option<PathBuf>, UnitError> {
        let cache_path = self.temp.make_or_reuse(&self.cache_dir_name())?;
        let output_path = self.temp.make_or_reuse(&self.output_dir_name())?;

        let mut paths = Vec::with_capacity(self.inputs.units().len());
        for input in self.inputs.units() {
            paths.push(resolver.read(input).await?);
        }

        let current: Vec<_> = self
            .inputs
            .units()
            .iter()
            .map(|input| resolver.revision_of(input))
            .collect();
        if !self.needs_rebuild(&current) {
            tracing::debug!(unit = %self.description, "inputs unchanged; reusing output");
            return Ok(Some(output_path));
        }

        self.temp.clear(&output_path)?;
        let ctx = RebuildContext {
            inputs: self.inputs.shape(paths),
            output_path: output_path.clone(),
            cache_path,
        };
        tracing::debug!(unit = %self.description, "rebuilding");
        let outcome = self.unit.rebuild(&ctx).await;
        // Failed attempts are retried on the next pass.
        lock(&self.state).has_run = outcome.is_ok();
        self.revised();

        match outcome {
            Ok(()) => Ok(Some(output_path)),
            Err(UnitError::Failed(failure)) => Err(UnitError::Failed(failure.promote_legacy_info())),
            Err(other) => Err(other),
        }
    }

    async fn cleanup(&self) -> Result<(), UnitError> {
        self.temp.remove(&self.output_dir_name())?;
        self.temp.remove(&self.cache_dir_name())?;
        self.unit.cleanup().await
    }
}
