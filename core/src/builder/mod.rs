//! The pass orchestrator.
//!
//! # Lifecycle
//!
//! ```text
//! Builder::new(root)
//!   ↓ build()   → Pass (dedup index, first-failure latch) → BuildOutput
//!   ↓ build()   → ... (adapters, result cache and visited units persist)
//!   ↓ cleanup() → cancel, await in-flight pass, tear down every unit ever
//!                 visited in first-visited order; builder is now terminal
//! ```

mod events;
mod graph;
mod node;
mod pass;

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tracing::Instrument;
use uuid::Uuid;

pub use events::BuildEvent;
pub use graph::{GraphSnapshot, NodeSnapshot, TimingSnapshot};
pub use node::{BuildNode, NodeTiming};
pub use pass::Resolver;

use crate::cache::{BuildStrategy, NoMemoization, RecognitionPolicy, ResultCache};
use crate::compat::AdapterTable;
use crate::config::TreeforgeConfig;
use crate::error::BuildError;
use crate::tmp::{TempDirAllocator, TempDirs};
use crate::unit::{ModernUnit, Unit, UnitId};
use crate::util::lock;
use pass::Pass;

/// Side-effect-only notification invoked for every leaf path resolved.
pub type LeafObserver<'a> = dyn Fn(&Path) + Send + Sync + 'a;

/// Result of a successful pass.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub directory: PathBuf,
    pub graph: Arc<BuildNode>,
}

impl BuildOutput {
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::from_root(&self.graph)
    }
}

/// Construction-time collaborators of a [`Builder`].
#[derive(Clone)]
pub struct BuilderOptions {
    pub warn_legacy_api: bool,
    pub policy: Arc<dyn RecognitionPolicy>,
    pub temp: Arc<dyn TempDirAllocator>,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            warn_legacy_api: false,
            policy: Arc::new(NoMemoization),
            temp: Arc::new(TempDirs::default()),
        }
    }
}

impl BuilderOptions {
    pub fn from_config(cfg: &TreeforgeConfig) -> Self {
        let temp = match cfg.builder.temp_root.as_deref().map(str::trim) {
            Some(root) if !root.is_empty() => TempDirs::new(root),
            _ => TempDirs::default(),
        };
        Self {
            warn_legacy_api: cfg.builder.warn_legacy_api,
            policy: Arc::new(cfg.cache.policy()),
            temp: Arc::new(temp),
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn RecognitionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_temp(mut self, temp: Arc<dyn TempDirAllocator>) -> Self {
        self.temp = temp;
        self
    }

    pub fn warn_legacy_api(mut self, warn: bool) -> Self {
        self.warn_legacy_api = warn;
        self
    }
}

/// Resolves a unit tree, one pass at a time.
pub struct Builder {
    root: Unit,
    warn_legacy_api: bool,
    canceled: AtomicBool,
    state: Mutex<BuilderState>,
    cache: Mutex<ResultCache>,
    adapters: AdapterTable,
    temp: Arc<dyn TempDirAllocator>,
    events: broadcast::Sender<BuildEvent>,
}

#[derive(Default)]
struct BuilderState {
    /// Every unit visited by any pass, in first-visited order.
    visited: Vec<Unit>,
    visited_ids: HashSet<UnitId>,
    current: Option<watch::Receiver<PassStatus>>,
    warned_intro: bool,
    warned: HashSet<UnitId>,
}

#[derive(Debug, Clone)]
enum PassStatus {
    Running,
    Settled(Result<(), BuildError>),
}

pub(crate) enum Target {
    Leaf(PathBuf),
    Read(Arc<dyn ModernUnit>),
}

struct PassTicket {
    id: Uuid,
    settle: watch::Sender<PassStatus>,
}

impl Builder {
    pub fn new(root: impl Into<Unit>) -> Self {
        Self::with_options(root, BuilderOptions::default())
    }

    pub fn with_options(root: impl Into<Unit>, options: BuilderOptions) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            root: root.into(),
            warn_legacy_api: options.warn_legacy_api,
            canceled: AtomicBool::new(false),
            state: Mutex::new(BuilderState::default()),
            cache: Mutex::new(ResultCache::new(options.policy)),
            adapters: AdapterTable::default(),
            temp: options.temp,
            events,
        }
    }

    pub fn root(&self) -> &Unit {
        &self.root
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BuildEvent> {
        self.events.subscribe()
    }

    /// Run one pass over the tree.
    ///
    /// The terminal check, the in-flight check and the cache strategy are
    /// applied when this is called; units only run once the returned future
    /// is polled, so a `cancel()` in between yields [`BuildError::Canceled`].
    pub fn build<'a>(
        &'a self,
        leaf_observer: Option<&'a LeafObserver<'a>>,
        strategy: BuildStrategy,
    ) -> impl Future<Output = Result<BuildOutput, BuildError>> + Send + 'a {
        let ticket = self.begin_pass(&strategy);

        async move {
            let PassTicket { id, settle } = ticket?;
            let span = tracing::info_span!("build_pass", pass = %id, first = strategy.is_first_pass());

            async move {
                let _ = self.events.send(BuildEvent::Started {
                    pass_id: id,
                    at: Utc::now(),
                });

                let pass = Pass::new(self, id, leaf_observer);
                let resolved = pass.resolve(self.root.clone()).await;
                drop(pass);

                let outcome = resolved.as_ref().map(|_| ()).map_err(|e| e.clone());
                match &outcome {
                    Ok(()) => tracing::info!("build pass finished"),
                    Err(e) if e.was_canceled() => tracing::info!("build pass canceled"),
                    Err(e) => tracing::warn!(error = %e, "build pass failed"),
                }
                let _ = self.events.send(BuildEvent::Finished {
                    pass_id: id,
                    at: Utc::now(),
                    ok: outcome.is_ok(),
                    canceled: outcome.as_ref().is_err_and(BuildError::was_canceled),
                });
                settle.send_replace(PassStatus::Settled(outcome));

                let root = resolved?;
                let directory = root
                    .directory()
                    .map(Path::to_path_buf)
                    .ok_or_else(|| BuildError::MissingDirectory(root.description().to_string()))?;
                Ok(BuildOutput {
                    directory,
                    graph: root,
                })
            }
            .instrument(span)
            .await
        }
    }

    fn begin_pass(&self, strategy: &BuildStrategy) -> Result<PassTicket, BuildError> {
        if self.is_canceled() {
            return Err(BuildError::Terminated);
        }

        let mut state = lock(&self.state);
        if state.current.as_ref().is_some_and(is_running) {
            return Err(BuildError::PassInFlight);
        }

        lock(&self.cache).apply(strategy);

        let (settle, status) = watch::channel(PassStatus::Running);
        state.current = Some(status);
        Ok(PassTicket {
            id: Uuid::new_v4(),
            settle,
        })
    }

    /// Request cooperative cancellation. Units already running finish, but
    /// no further unit is entered; the builder can no longer build.
    pub fn cancel(&self) {
        if !self.canceled.swap(true, Ordering::SeqCst) {
            tracing::debug!("builder canceled");
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Cancel, wait for any in-flight pass, then tear down every unit ever
    /// visited, one at a time in first-visited order.
    ///
    /// Must not be awaited from inside a unit of this builder's own pass.
    pub async fn cleanup(&self) -> Result<(), BuildError> {
        self.cancel();

        let in_flight = lock(&self.state).current.take().filter(is_running);
        let pass_outcome = match in_flight {
            Some(mut status) => match status.wait_for(|s| !matches!(s, PassStatus::Running)).await {
                Ok(settled) => settled_outcome(&settled),
                Err(_) => Ok(()),
            },
            None => Ok(()),
        };

        self.teardown_visited().await?;

        match pass_outcome {
            Err(e) if !e.was_canceled() => Err(e),
            _ => Ok(()),
        }
    }

    async fn teardown_visited(&self) -> Result<(), BuildError> {
        let units = {
            let mut state = lock(&self.state);
            state.visited_ids.clear();
            std::mem::take(&mut state.visited)
        };

        let mut remaining = units.into_iter();
        while let Some(unit) = remaining.next() {
            if let Err(e) = self.teardown(&unit).await {
                let mut state = lock(&self.state);
                state.visited_ids.extend(remaining.clone().map(|u| u.id()));
                state.visited.extend(remaining);
                return Err(BuildError::Teardown {
                    description: unit.description(),
                    message: e.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn teardown(&self, unit: &Unit) -> Result<(), crate::error::UnitError> {
        tracing::debug!(unit = %unit.description(), "tearing down");
        match unit {
            Unit::Leaf(_) => Ok(()),
            Unit::Modern(modern) => modern.cleanup().await,
            Unit::Legacy(_) => match self.adapters.get(&unit.id()) {
                Some(adapter) => adapter.cleanup().await,
                None => Ok(()),
            },
        }
    }

    /// Mark a legacy unit as changed so its consumers rebuild next pass.
    pub fn revise(&self, unit: &Unit) -> Result<(), BuildError> {
        match unit {
            Unit::Legacy(legacy) => {
                self.adapters.wrap(legacy, &self.temp)?.revised();
                Ok(())
            }
            _ => Err(BuildError::invalid_unit(
                unit.description(),
                "only legacy units carry a revision",
            )),
        }
    }

    /// Every unit visited so far, in first-visited order.
    pub fn visited(&self) -> Vec<Unit> {
        lock(&self.state).visited.clone()
    }

    pub(crate) fn wrap_if_necessary(&self, unit: &Unit) -> Result<Target, BuildError> {
        match unit {
            Unit::Leaf(path) => Ok(Target::Leaf(path.clone())),
            Unit::Modern(modern) => Ok(Target::Read(modern.clone())),
            Unit::Legacy(legacy) => {
                let adapter = self.adapters.wrap(legacy, &self.temp)?;
                Ok(Target::Read(adapter))
            }
        }
    }

    pub(crate) fn warn_if_legacy(&self, unit: &Unit) {
        if !self.warn_legacy_api || !unit.is_legacy() {
            return;
        }
        let mut state = lock(&self.state);
        if !state.warned.insert(unit.id()) {
            return;
        }
        if !state.warned_intro {
            state.warned_intro = true;
            tracing::warn!("[API] The legacy rebuild API will stop working in a future version");
            tracing::warn!("[API] Implement ModernUnit instead of LegacyUnit");
        }
        tracing::warn!(unit = %unit.description(), "[API] Plugin uses the legacy rebuild API");
    }

    pub(crate) fn absorb_visited(&self, units: Vec<Unit>) {
        let mut state = lock(&self.state);
        for unit in units {
            if state.visited_ids.insert(unit.id()) {
                state.visited.push(unit);
            }
        }
    }
}

fn is_running(status: &watch::Receiver<PassStatus>) -> bool {
    // A dropped sender means the pass future was abandoned.
    matches!(*status.borrow(), PassStatus::Running) && status.has_changed().is_ok()
}

fn settled_outcome(status: &PassStatus) -> Result<(), BuildError> {
    match status {
        PassStatus::Running => Ok(()),
        PassStatus::Settled(outcome) => outcome.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_without_a_pass_makes_the_builder_terminal() {
        let builder = Builder::new("src");
        tokio_test::block_on(builder.cleanup()).unwrap();

        assert!(builder.is_canceled());
        let err = tokio_test::block_on(builder.build(None, BuildStrategy::initial())).unwrap_err();
        assert!(matches!(err, BuildError::Terminated));
    }

    #[test]
    fn leaf_root_resolves_to_its_path() {
        let builder = Builder::new("src");
        let output = tokio_test::block_on(builder.build(None, BuildStrategy::initial())).unwrap();
        assert_eq!(output.directory, PathBuf::from("src"));
        assert_eq!(builder.visited().len(), 1);
    }
}
