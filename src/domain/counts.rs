use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::detection::WasteClass;

/// Per-class totals. Every known class is present, and values only grow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectCounts(BTreeMap<WasteClass, u64>);

impl ObjectCounts {
    pub fn new() -> Self {
        Self(WasteClass::ALL.into_iter().map(|c| (c, 0)).collect())
    }

    pub fn get(&self, class: WasteClass) -> u64 {
        self.0.get(&class).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (WasteClass, u64)> + '_ {
        self.0.iter().map(|(c, n)| (*c, *n))
    }

    pub(crate) fn increment(&mut self, class: WasteClass) -> u64 {
        let n = self.0.entry(class).or_insert(0);
        *n += 1;
        *n
    }

    /// True when no class in `self` is below its value in `earlier`.
    pub fn dominates(&self, earlier: &ObjectCounts) -> bool {
        earlier.iter().all(|(c, n)| self.get(c) >= n)
    }
}

impl Default for ObjectCounts {
    fn default() -> Self {
        Self::new()
    }
}
