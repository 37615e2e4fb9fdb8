use std::path::{Path, PathBuf};

/// Result of [`NavigationHistory::visit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Moved,
    /// The path was already current.
    NoOp,
}

/// Back/forward stacks for document switches.
#[derive(Debug, Default, Clone)]
pub struct NavigationHistory {
    current: Option<PathBuf>,
    back: Vec<PathBuf>,
    forward: Vec<PathBuf>,
}

impl NavigationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `path` current. The path being left goes onto the back stack
    /// unless it is already on top, and the forward stack is dropped.
    pub fn visit(&mut self, path: impl Into<PathBuf>) -> Visit {
        let path = path.into();
        if self.current.as_ref() == Some(&path) {
            return Visit::NoOp;
        }
        if let Some(leaving) = self.current.replace(path)
            && self.back.last() != Some(&leaving)
        {
            self.back.push(leaving);
        }
        self.forward.clear();
        Visit::Moved
    }

    pub fn back(&mut self) -> Option<PathBuf> {
        let target = self.back.pop()?;
        if let Some(leaving) = self.current.replace(target.clone()) {
            self.forward.push(leaving);
        }
        Some(target)
    }

    pub fn forward(&mut self) -> Option<PathBuf> {
        let target = self.forward.pop()?;
        if let Some(leaving) = self.current.replace(target.clone()) {
            self.back.push(leaving);
        }
        Some(target)
    }

    pub fn current(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    pub fn back_depth(&self) -> usize {
        self.back.len()
    }

    pub fn forward_depth(&self) -> usize {
        self.forward.len()
    }

    pub fn can_go_back(&self) -> bool {
        !self.back.is_empty()
    }

    pub fn can_go_forward(&self) -> bool {
        !self.forward.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    #[test]
    fn test_back_then_forward() {
        let mut history = NavigationHistory::new();
        history.visit("a.md");
        history.visit("b.md");
        assert_eq!(history.back(), Some(p("a.md")));
        assert_eq!(history.current(), Some(Path::new("a.md")));
        assert_eq!(history.forward(), Some(p("b.md")));
        assert_eq!(history.forward(), None);
    }

    #[test]
    fn test_visiting_current_is_noop() {
        let mut history = NavigationHistory::new();
        assert_eq!(history.visit("a.md"), Visit::Moved);
        assert_eq!(history.visit("a.md"), Visit::NoOp);
        assert_eq!(history.back_depth(), 0);
    }

    #[test]
    fn test_visit_clears_forward_stack() {
        let mut history = NavigationHistory::new();
        history.visit("a.md");
        history.visit("b.md");
        history.back();
        assert!(history.can_go_forward());
        history.visit("c.md");
        assert_eq!(history.forward_depth(), 0);
        assert_eq!(history.forward(), None);
        assert_eq!(history.back(), Some(p("a.md")));
    }

    #[test]
    fn test_visit_after_back_records_the_page_left() {
        let mut history = NavigationHistory::new();
        history.visit("a.md");
        history.visit("b.md");
        history.back();
        history.visit("c.md");
        assert_eq!(history.back_depth(), 1);
    }

    #[test]
    fn test_back_on_empty_history() {
        let mut history = NavigationHistory::new();
        assert_eq!(history.back(), None);
        history.visit("only.md");
        assert_eq!(history.back(), None);
        assert_eq!(history.current(), Some(Path::new("only.md")));
    }
}
