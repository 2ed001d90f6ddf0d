//! Cross-pass result memoization.
//!
//! Unlike the per-pass dedup index, entries are keyed by a structural
//! [`Signature`] computed by an injected [`RecognitionPolicy`], so a freshly
//! constructed unit that looks like one seen before reuses its node. Entries
//! live until a [`BuildStrategy`] names a change category that invalidates
//! their group.

mod policy;
mod store;
mod strategy;

pub use policy::{NoMemoization, RecognitionPolicy, RulePolicy, Signature};
pub use store::ResultCache;
pub use strategy::{BuildStrategy, ChangeCategory};
