//! Stable re-exports for consumers (`cli` and external crates).
//!
//! Prefer importing from `treeforge_core::api` instead of reaching into internal modules.

pub use crate::builder::{
    BuildEvent, BuildNode, BuildOutput, Builder, BuilderOptions, GraphSnapshot, LeafObserver,
    NodeSnapshot, NodeTiming, Resolver, TimingSnapshot,
};
pub use crate::cache::{
    BuildStrategy, ChangeCategory, NoMemoization, RecognitionPolicy, RulePolicy, Signature,
};
pub use crate::compat::Revision;
pub use crate::config::{
    from_toml_str, load, BuilderConfig, CacheConfig, CacheGroupConfig, CacheRule, ConfigError,
    KeySource, LoggingConfig, TextMatch, TreeforgeConfig,
};
pub use crate::error::{
    BuildError, BuildFailure, LegacyErrorInfo, SourceLocation, UnitError, UnitFailure,
};
pub use crate::tmp::{TempDirAllocator, TempDirs};
pub use crate::unit::{
    InputPaths, LegacyUnit, ModernUnit, RebuildContext, Unit, UnitId, UnitInfo, WeakUnit,
};
