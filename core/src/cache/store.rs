use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::policy::{RecognitionPolicy, Signature};
use super::strategy::{BuildStrategy, ChangeCategory};
use crate::builder::BuildNode;
use crate::unit::Unit;

/// Builder-scoped memo of settled nodes, keyed by structural signature.
pub struct ResultCache {
    policy: Arc<dyn RecognitionPolicy>,
    entries: HashMap<Signature, Arc<BuildNode>>,
    first_pass: bool,
}

impl ResultCache {
    pub fn new(policy: Arc<dyn RecognitionPolicy>) -> Self {
        Self {
            policy,
            entries: HashMap::new(),
            first_pass: true,
        }
    }

    /// Fix the cache state for the pass about to start.
    pub fn apply(&mut self, strategy: &BuildStrategy) {
        self.first_pass = strategy.is_first_pass();
        if !self.first_pass {
            self.invalidate(strategy.changed());
        }
    }

    pub fn get(&self, unit: &Unit) -> Option<Arc<BuildNode>> {
        let signature = self.signature(unit)?;
        self.entries.get(&signature).cloned()
    }

    pub fn put(&mut self, unit: &Unit, node: Arc<BuildNode>) {
        if let Some(signature) = self.signature(unit) {
            self.entries.insert(signature, node);
        }
    }

    /// Drop every entry whose group is affected by `changed`. Returns the
    /// number of entries removed.
    pub fn invalidate(&mut self, changed: &BTreeSet<ChangeCategory>) -> usize {
        if changed.is_empty() {
            return 0;
        }
        let groups = self.policy.affected_groups(changed);
        let before = self.entries.len();
        self.entries.retain(|signature, _| !groups.contains(&signature.group));
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(removed, ?changed, "invalidated cached results");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn signature(&self, unit: &Unit) -> Option<Signature> {
        if self.first_pass || matches!(unit, Unit::Leaf(_)) {
            return None;
        }
        self.policy.recognize(&unit.info())
    }
}
