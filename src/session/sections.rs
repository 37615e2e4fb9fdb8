use std::collections::HashMap;

use crate::document::BlockId;

/// Collapse flags per heading. Absent means expanded.
#[derive(Debug, Default, Clone)]
pub struct SectionState {
    collapsed: HashMap<BlockId, bool>,
}

impl SectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip a heading and return its new collapsed value.
    pub fn toggle(&mut self, id: BlockId) -> bool {
        let flag = self.collapsed.entry(id).or_insert(false);
        *flag = !*flag;
        *flag
    }

    pub fn is_collapsed(&self, id: BlockId) -> bool {
        self.collapsed.get(&id).copied().unwrap_or(false)
    }

    /// Returns true if the heading was collapsed.
    pub fn expand(&mut self, id: BlockId) -> bool {
        self.collapsed.remove(&id).unwrap_or(false)
    }

    pub fn clear(&mut self) {
        self.collapsed.clear();
    }

    /// Collapsed headings, in no particular order.
    pub fn collapsed(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.collapsed
            .iter()
            .filter_map(|(id, collapsed)| collapsed.then_some(*id))
    }
}
