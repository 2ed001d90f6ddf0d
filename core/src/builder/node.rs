use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use tracing::Span;

use crate::unit::{Unit, WeakUnit};
use crate::util::lock;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

/// Wall-clock accounting of one resolved node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeTiming {
    /// Time not spent waiting on inputs.
    pub self_time: Duration,
    pub total: Duration,
}

/// Per-pass record of one visited unit.
///
/// A node whose directory is unset is still under construction; meeting it
/// again in the same pass means the tree has a cycle.
pub struct BuildNode {
    id: u64,
    unit: WeakUnit,
    description: String,
    plugin_name: Option<String>,
    instantiation_stack: Option<String>,
    children: Mutex<Vec<Arc<BuildNode>>>,
    directory: OnceLock<PathBuf>,
    span: Mutex<Option<Span>>,
    started: Instant,
    waited: Mutex<Duration>,
    timing: OnceLock<NodeTiming>,
}

impl BuildNode {
    pub(crate) fn new(unit: &Unit) -> Self {
        let id = NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed);
        let description = unit.description();
        let plugin_name = unit.plugin_name();
        let span = tracing::info_span!(
            "node",
            id,
            description = %description,
            plugin = plugin_name.as_deref().unwrap_or(""),
            cached = false,
        );
        Self {
            id,
            unit: unit.downgrade(),
            description,
            plugin_name,
            instantiation_stack: unit.info().instantiation_stack,
            children: Mutex::new(Vec::new()),
            directory: OnceLock::new(),
            span: Mutex::new(Some(span)),
            started: Instant::now(),
            waited: Mutex::new(Duration::ZERO),
            timing: OnceLock::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The unit this node was built for, if it is still alive.
    pub fn unit(&self) -> Option<Unit> {
        self.unit.upgrade()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn plugin_name(&self) -> Option<&str> {
        self.plugin_name.as_deref()
    }

    pub fn instantiation_stack(&self) -> Option<&str> {
        self.instantiation_stack.as_deref()
    }

    pub fn children(&self) -> Vec<Arc<BuildNode>> {
        lock(&self.children).clone()
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.get().map(PathBuf::as_path)
    }

    pub fn is_settled(&self) -> bool {
        self.directory.get().is_some()
    }

    /// `None` until the node has settled.
    pub fn timing(&self) -> Option<NodeTiming> {
        self.timing.get().copied()
    }

    pub(crate) fn add_child(&self, child: Arc<BuildNode>) {
        lock(&self.children).push(child);
    }

    pub(crate) fn add_wait(&self, waited: Duration) {
        *lock(&self.waited) += waited;
    }

    pub(crate) fn span(&self) -> Span {
        lock(&self.span).clone().unwrap_or_else(Span::none)
    }

    /// Record the output directory. Only the first call has any effect.
    pub(crate) fn settle(&self, directory: PathBuf) {
        if self.directory.set(directory).is_err() {
            tracing::debug!(id = self.id, "node settled twice; keeping first directory");
            return;
        }
        let total = self.started.elapsed();
        let waited = *lock(&self.waited);
        let _ = self.timing.set(NodeTiming {
            self_time: total.saturating_sub(waited),
            total,
        });
    }

    /// Close the instrumentation span however resolution ended.
    pub(crate) fn close_span_on_exit(self: &Arc<Self>) -> SpanCloser {
        SpanCloser(Arc::clone(self))
    }
}

impl std::fmt::Debug for BuildNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildNode")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("directory", &self.directory.get())
            .field("children", &lock(&self.children).len())
            .finish()
    }
}

pub(crate) struct SpanCloser(Arc<BuildNode>);

impl Drop for SpanCloser {
    fn drop(&mut self) {
        lock(&self.0.span).take();
    }
}
