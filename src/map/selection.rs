use std::collections::BTreeSet;

/// Feature ids flagged by the render sink (hover, pinned selections).
///
/// Keyed by merged feature id. Ids are positions in the base geometry, so the
/// set stays meaningful across refreshes of the same geometry.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    ids: BTreeSet<usize>,
    hovered: Option<usize>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: usize) {
        self.ids.insert(id);
    }

    pub fn clear(&mut self, id: usize) {
        self.ids.remove(&id);
        if self.hovered == Some(id) {
            self.hovered = None;
        }
    }

    pub fn toggle(&mut self, id: usize) {
        if !self.ids.remove(&id) {
            self.ids.insert(id);
        }
    }

    /// Explicitly set ids, ascending; excludes a hover-only id
    pub fn pinned(&self) -> impl Iterator<Item = usize> + '_ {
        self.ids.iter().copied()
    }

    pub fn clear_all(&mut self) {
        self.ids.clear();
        self.hovered = None;
    }

    pub fn contains(&self, id: usize) -> bool {
        self.hovered == Some(id) || self.ids.contains(&id)
    }

    /// Move the single hover flag; returns true if it changed.
    pub fn hover(&mut self, id: Option<usize>) -> bool {
        if self.hovered == id {
            return false;
        }
        self.hovered = id;
        true
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    pub fn len(&self) -> usize {
        match self.hovered {
            Some(id) if !self.ids.contains(&id) => self.ids.len() + 1,
            _ => self.ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hover_replaces_previous() {
        let mut sel = SelectionSet::new();
        assert!(sel.hover(Some(3)));
        assert!(!sel.hover(Some(3)));
        assert!(sel.hover(Some(5)));
        assert!(!sel.contains(3));
        assert!(sel.contains(5));
        assert!(sel.hover(None));
        assert!(sel.is_empty());
    }

    #[test]
    fn explicit_set_and_clear() {
        let mut sel = SelectionSet::new();
        sel.set(1);
        sel.set(2);
        sel.hover(Some(2));
        assert_eq!(sel.len(), 2);
        sel.hover(Some(4));
        assert!(sel.contains(2));
        assert_eq!(sel.len(), 3);
        sel.clear(2);
        assert_eq!(sel.hovered(), Some(4));
        assert!(sel.contains(1));
        sel.clear_all();
        assert!(sel.is_empty());
    }
}
