//! Bridge from the legacy rebuild-in-place contract to the modern read
//! contract.
//!
//! Each legacy unit gets exactly one [`RevisionAdapter`] for the lifetime of
//! its builder, kept in an [`AdapterTable`] side-table keyed by unit identity
//! rather than stored on the unit itself.

mod adapter;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub use adapter::{Revision, RevisionAdapter};

use crate::error::BuildError;
use crate::tmp::TempDirAllocator;
use crate::unit::{LegacyUnit, Unit, UnitId};
use crate::util::lock;

#[derive(Default)]
pub struct AdapterTable {
    adapters: Mutex<HashMap<UnitId, Arc<RevisionAdapter>>>,
}

impl AdapterTable {
    /// The adapter for `unit`, created (and validated) on first use.
    pub fn wrap(
        &self,
        unit: &Arc<dyn LegacyUnit>,
        temp: &Arc<dyn TempDirAllocator>,
    ) -> Result<Arc<RevisionAdapter>, BuildError> {
        let id = Unit::Legacy(unit.clone()).id();
        let mut adapters = lock(&self.adapters);
        if let Some(existing) = adapters.get(&id) {
            return Ok(existing.clone());
        }
        let adapter = Arc::new(RevisionAdapter::new(unit.clone(), temp.clone())?);
        tracing::trace!(unit = %adapter.description(), "wrapped legacy unit");
        adapters.insert(id, adapter.clone());
        Ok(adapter)
    }

    pub fn get(&self, id: &UnitId) -> Option<Arc<RevisionAdapter>> {
        lock(&self.adapters).get(id).cloned()
    }

    /// Revision of a wrapped legacy unit. Anything else has no revision and
    /// counts as changed on every pass.
    pub fn revision_of(&self, unit: &Unit) -> Option<Revision> {
        match unit {
            Unit::Legacy(_) => self.get(&unit.id()).and_then(|a| a.revision()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.adapters).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
