use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt};
use tracing::Instrument;
use uuid::Uuid;

use super::node::BuildNode;
use super::{Builder, LeafObserver, Target};
use crate::compat::Revision;
use crate::error::{BuildError, BuildFailure, UnitError, UnitFailure};
use crate::unit::{ModernUnit, Unit, UnitId};
use crate::util::lock;

/// State of one `build()` call layered over the persistent builder state.
pub(crate) struct Pass<'b> {
    builder: &'b Builder,
    id: Uuid,
    leaf_observer: Option<&'b LeafObserver<'b>>,
    index: Mutex<PassIndex>,
    first_failure: Mutex<Option<Arc<BuildFailure>>>,
}

/// Units visited this pass with their nodes, indexed by identity.
#[derive(Default)]
struct PassIndex {
    positions: HashMap<UnitId, usize>,
    units: Vec<Unit>,
    nodes: Vec<Arc<BuildNode>>,
}

enum Registration {
    Fresh(Arc<BuildNode>),
    Existing(Arc<BuildNode>),
}

impl<'b> Pass<'b> {
    pub(crate) fn new(builder: &'b Builder, id: Uuid, leaf_observer: Option<&'b LeafObserver<'b>>) -> Self {
        Self {
            builder,
            id,
            leaf_observer,
            index: Mutex::new(PassIndex::default()),
            first_failure: Mutex::new(None),
        }
    }

    /// Resolve `unit` to its node, visiting it at most once per pass.
    pub(crate) fn resolve(&self, unit: Unit) -> BoxFuture<'_, Result<Arc<BuildNode>, BuildError>> {
        async move {
            if self.builder.is_canceled() {
                tracing::debug!(pass = %self.id, unit = %unit.description(), "pass canceled");
                return Err(BuildError::Canceled);
            }

            self.builder.warn_if_legacy(&unit);
            let target = self.builder.wrap_if_necessary(&unit)?;

            let node = match self.register(&unit)? {
                Registration::Existing(node) => return Ok(node),
                Registration::Fresh(node) => node,
            };
            let _span = node.close_span_on_exit();

            let directory = match target {
                Target::Leaf(path) => {
                    if let Some(observe) = self.leaf_observer {
                        observe(&path);
                    }
                    path
                }
                Target::Read(reader) => self.read(&unit, &node, reader).await?,
            };

            node.settle(directory);
            Ok(node)
        }
        .boxed()
    }

    /// Register a fresh node before recursing so re-entry can be told apart
    /// from sharing.
    fn register(&self, unit: &Unit) -> Result<Registration, BuildError> {
        let id = unit.id();
        let mut index = lock(&self.index);

        if let Some(&position) = index.positions.get(&id) {
            let existing = index.nodes[position].clone();
            if !existing.is_settled() {
                return Err(BuildError::CycleDetected(unit.description()));
            }
            let _cached = tracing::info_span!(
                "node",
                id = existing.id(),
                description = %existing.description(),
                cached = true,
            )
            .entered();
            return Ok(Registration::Existing(existing));
        }

        let node = Arc::new(BuildNode::new(unit));
        let position = index.nodes.len();
        index.positions.insert(id, position);
        index.units.push(unit.clone());
        index.nodes.push(node.clone());
        Ok(Registration::Fresh(node))
    }

    async fn read(
        &self,
        unit: &Unit,
        node: &Arc<BuildNode>,
        reader: Arc<dyn ModernUnit>,
    ) -> Result<PathBuf, BuildError> {
        let resolver = Resolver {
            pass: self,
            parent: node.clone(),
            running: AtomicBool::new(false),
        };

        match reader.read(&resolver).instrument(node.span()).await {
            Ok(Some(directory)) => {
                if resolver.running.load(Ordering::SeqCst) {
                    return Err(BuildError::ReadReturnedEarly(unit.description()));
                }
                Ok(directory)
            }
            Ok(None) => Err(BuildError::MissingDirectory(unit.description())),
            Err(UnitError::Build(err)) => Err(err),
            Err(UnitError::Failed(failure)) => Err(self.contain(unit, failure)),
        }
    }

    /// Wrap the first unit failure of the pass; later ones are dropped in
    /// favour of it.
    fn contain(&self, unit: &Unit, failure: UnitFailure) -> BuildError {
        let mut first = lock(&self.first_failure);
        if let Some(reported) = first.as_ref() {
            tracing::debug!(
                pass = %self.id,
                unit = %unit.description(),
                error = %failure,
                "discarding failure; pass already failed"
            );
            return BuildError::UnitFailed(reported.clone());
        }

        let envelope = Arc::new(BuildFailure::new(unit, failure));
        tracing::debug!(pass = %self.id, unit = %envelope.description, "unit failed");
        *first = Some(envelope.clone());
        BuildError::UnitFailed(envelope)
    }

    fn recall(&self, unit: &Unit) -> Option<Arc<BuildNode>> {
        lock(&self.builder.cache).get(unit)
    }

    fn remember(&self, unit: &Unit, node: &Arc<BuildNode>) {
        lock(&self.builder.cache).put(unit, node.clone());
    }
}

impl Drop for Pass<'_> {
    fn drop(&mut self) {
        let index = std::mem::take(&mut *lock(&self.index));
        self.builder.absorb_visited(index.units);
    }
}

/// Handed to [`ModernUnit::read`] to resolve the unit's inputs.
///
/// One resolver serves one parent. Inputs must be read in sequence: calling
/// [`Resolver::read`] again before the previous call settled fails with
/// [`BuildError::ParallelRead`].
pub struct Resolver<'p> {
    pass: &'p Pass<'p>,
    parent: Arc<BuildNode>,
    running: AtomicBool,
}

impl Resolver<'_> {
    /// Resolve `unit` and return its output directory, attaching it as a
    /// child of the reading unit.
    pub async fn read(&self, unit: &Unit) -> Result<PathBuf, BuildError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(self.parallel_read());
        }

        if let Some(hit) = self.pass.recall(unit) {
            tracing::trace!(unit = %unit.description(), node = hit.id(), "result cache hit");
            let directory = settled_directory(&hit)?;
            self.parent.add_child(hit);
            return Ok(directory);
        }

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(self.parallel_read());
        }
        let _running = RunningGuard(&self.running);

        let started = Instant::now();
        let child = self.pass.resolve(unit.clone()).await;
        self.parent.add_wait(started.elapsed());
        let child = child?;

        self.pass.remember(unit, &child);
        self.parent.add_child(child.clone());
        settled_directory(&child)
    }

    /// Current revision of `unit` if it is a legacy unit that has been wrapped.
    pub(crate) fn revision_of(&self, unit: &Unit) -> Option<Revision> {
        self.pass.builder.adapters.revision_of(unit)
    }

    fn parallel_read(&self) -> BuildError {
        BuildError::ParallelRead(self.parent.description().to_string())
    }
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn settled_directory(node: &BuildNode) -> Result<PathBuf, BuildError> {
    node.directory()
        .map(Path::to_path_buf)
        .ok_or_else(|| BuildError::MissingDirectory(node.description().to_string()))
}
