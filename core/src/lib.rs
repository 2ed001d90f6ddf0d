//! Incremental build-graph executor.
//!
//! A [`Builder`] owns a tree of build units and resolves it one pass at a
//! time: every reachable unit is visited exactly once per pass, cycles are
//! reported instead of hanging, cancellation is cooperative, and legacy
//! "rebuild in place" units are bridged onto the modern "return a directory"
//! contract by a revision-tracking adapter.
//!
//! ```text
//! Builder::build(observer, strategy)
//!   ↓ ResultCache::apply(strategy)          (fix cache state up front)
//!   ↓ Pass::resolve(root)                   (depth first, dedup by identity)
//!       Leaf    → path itself
//!       Legacy  → RevisionAdapter::read      (rebuild only when inputs moved)
//!       Modern  → ModernUnit::read(resolver) (resolver consults ResultCache)
//!   ↓ BuildOutput { directory, graph }
//! ```

pub mod api;
pub mod builder;
pub mod cache;
pub mod compat;
pub mod config;
pub mod error;
pub mod tmp;
pub mod unit;
mod util;

pub use builder::{BuildEvent, BuildNode, BuildOutput, Builder, BuilderOptions, Resolver};
pub use error::{BuildError, BuildFailure, UnitError, UnitFailure};
pub use unit::{LegacyUnit, ModernUnit, Unit};
