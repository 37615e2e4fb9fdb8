//! Incremental search over the loaded document.
//!
//! Matches are kept in document order. The active match moves with
//! [`SearchEngine::next`] and [`SearchEngine::previous`], wrapping at both
//! ends. Only blocks that are displayable contribute text, so a diagram
//! becomes searchable once its artifact is ready.

use regex::{Regex, RegexBuilder};

use crate::document::{BlockId, Document};

/// One occurrence of the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Match {
    pub block: BlockId,
    /// Byte offset into the block's text
    pub offset: usize,
    /// Byte length of the matched text
    pub len: usize,
}

#[derive(Debug, Default)]
pub struct SearchEngine {
    query: String,
    pattern: Option<Regex>,
    matches: Vec<Match>,
    active: Option<usize>,
}

impl SearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the query and recompute matches from scratch. The active
    /// match is reset; returns the number of matches.
    pub fn set_query(&mut self, doc: &Document, query: &str) -> usize {
        self.query = query.to_string();
        self.pattern = compile(query);
        self.active = None;
        self.matches = self.find_all(doc);
        self.matches.len()
    }

    /// Recompute matches after block states changed. The active match is
    /// kept when it still exists; otherwise the position is clamped.
    pub fn refresh(&mut self, doc: &Document) {
        let previous = self.active_match();
        self.matches = self.find_all(doc);
        self.active = match previous {
            None => None,
            Some(_) if self.matches.is_empty() => None,
            Some(prev) => Some(
                self.matches
                    .iter()
                    .position(|m| *m == prev)
                    .unwrap_or_else(|| self.matches.partition_point(|m| *m < prev))
                    .min(self.matches.len() - 1),
            ),
        };
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Advance to the next match, wrapping to the first.
    pub fn next(&mut self) -> Option<Match> {
        if self.matches.is_empty() {
            return None;
        }
        let index = self.active.map_or(0, |i| (i + 1) % self.matches.len());
        self.active = Some(index);
        self.active_match()
    }

    /// Step back to the previous match, wrapping to the last.
    pub fn previous(&mut self) -> Option<Match> {
        if self.matches.is_empty() {
            return None;
        }
        let last = self.matches.len() - 1;
        let index = match self.active {
            None | Some(0) => last,
            Some(i) => i - 1,
        };
        self.active = Some(index);
        self.active_match()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_active(&self) -> bool {
        self.pattern.is_some()
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn active_match(&self) -> Option<Match> {
        self.active.and_then(|i| self.matches.get(i).copied())
    }

    /// 1-based position of the active match and the total count.
    pub fn position(&self) -> Option<(usize, usize)> {
        self.active.map(|i| (i + 1, self.matches.len()))
    }

    /// Matches inside one block, for highlighting.
    pub fn matches_in(&self, block: BlockId) -> impl Iterator<Item = &Match> {
        let start = self.matches.partition_point(|m| m.block < block);
        self.matches[start..]
            .iter()
            .take_while(move |m| m.block == block)
    }

    fn find_all(&self, doc: &Document) -> Vec<Match> {
        let Some(pattern) = &self.pattern else {
            return Vec::new();
        };
        doc.blocks()
            .iter()
            .flat_map(|block| {
                pattern.find_iter(block.searchable_text()).map(|m| Match {
                    block: block.id(),
                    offset: m.start(),
                    len: m.len(),
                })
            })
            .collect()
    }
}

/// Case-insensitive literal pattern; blank queries match nothing.
fn compile(query: &str) -> Option<Regex> {
    if query.trim().is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
        .ok()
}
