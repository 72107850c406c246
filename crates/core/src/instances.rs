use std::collections::HashMap;

use crate::model::ElementId;

/// Per element id pass counter.
///
/// Starts at 0 and moves forward once each time the id begins a fresh
/// revision pass. Entries appended afterwards carry the new value in their
/// `RenderKey`.
#[derive(Debug, Clone, Default)]
pub struct InstanceCounter {
    counts: HashMap<ElementId, u32>,
}

impl InstanceCounter {
    #[must_use]
    pub fn get(&self, id: &ElementId) -> u32 {
        self.counts.get(id).copied().unwrap_or(0)
    }

    /// Start a fresh pass for `id`, returning the new value.
    pub fn bump(&mut self, id: &ElementId) -> u32 {
        let count = self.counts.entry(id.clone()).or_insert(0);
        *count += 1;
        *count
    }
}
