//! Selection + scroll bookkeeping for a list that is rebuilt from outside.
//!
//! Filtering happens before items get here; this only tracks which row is
//! selected and which window of rows is on screen.

pub struct ScrollableList<T> {
    pub items: Vec<T>,
    pub selected: usize,
    pub scroll_offset: usize,
}

impl<T> Default for ScrollableList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            selected: 0,
            scroll_offset: 0,
        }
    }
}

impl<T> ScrollableList<T> {
    /// Replace the items, keeping the selection on the first item for which
    /// `keep` returns true (if any).
    pub fn set_items(&mut self, items: Vec<T>, keep: impl Fn(&T) -> bool) {
        let position = items.iter().position(keep);
        self.items = items;
        match position {
            Some(pos) => self.selected = pos,
            None => self.clamp(),
        }
    }

    fn clamp(&mut self) {
        if self.selected >= self.items.len() {
            self.selected = self.items.len().saturating_sub(1);
        }
        if self.scroll_offset > self.selected {
            self.scroll_offset = self.selected;
        }
    }

    pub fn select_up(&mut self, n: usize) {
        self.selected = self.selected.saturating_sub(n);
    }

    pub fn select_down(&mut self, n: usize) {
        if self.items.is_empty() {
            return;
        }
        self.selected = (self.selected + n).min(self.items.len() - 1);
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
        self.scroll_offset = 0;
    }

    pub fn select_last(&mut self) {
        self.selected = self.items.len().saturating_sub(1);
    }

    pub fn select_where(&mut self, pred: impl Fn(&T) -> bool) -> bool {
        match self.items.iter().position(pred) {
            Some(pos) => {
                self.selected = pos;
                true
            }
            None => false,
        }
    }

    pub fn selected_item(&self) -> Option<&T> {
        self.items.get(self.selected)
    }

    /// Scroll so the selection is inside a window of `height` rows.
    pub fn ensure_visible(&mut self, height: usize) {
        if height == 0 {
            return;
        }
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
        } else if self.selected >= self.scroll_offset + height {
            self.scroll_offset = self.selected + 1 - height;
        }
    }

    /// `(index, item)` pairs inside the current window.
    pub fn visible_items(&self, height: usize) -> impl Iterator<Item = (usize, &T)> {
        self.items
            .iter()
            .enumerate()
            .skip(self.scroll_offset)
            .take(height)
    }

    /// Select the item at `row` of the window. Returns false outside the list.
    pub fn handle_click(&mut self, row: usize) -> bool {
        let target = self.scroll_offset + row;
        if target < self.items.len() {
            self.selected = target;
            return true;
        }
        false
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_items_keeps_selection_by_key() {
        let mut list = ScrollableList::default();
        list.set_items(vec![10, 20, 30], |_| false);
        list.select_down(2);
        assert_eq!(list.selected_item(), Some(&30));

        list.set_items(vec![30, 40], |&v| v == 30);
        assert_eq!(list.selected_item(), Some(&30));

        list.set_items(vec![1], |&v| v == 30);
        assert_eq!(list.selected_item(), Some(&1));

        list.set_items(Vec::new(), |_| true);
        assert_eq!(list.selected_item(), None);
        list.select_down(1);
        assert_eq!(list.selected, 0);
    }

    #[test]
    fn test_window_follows_selection() {
        let mut list = ScrollableList::default();
        list.set_items((0..20).collect(), |_| false);
        list.select_down(12);
        list.ensure_visible(5);
        assert_eq!(list.scroll_offset, 8);
        let rows: Vec<usize> = list.visible_items(5).map(|(i, _)| i).collect();
        assert_eq!(rows, vec![8, 9, 10, 11, 12]);

        list.select_first();
        list.ensure_visible(5);
        assert_eq!(list.scroll_offset, 0);
        assert!(list.handle_click(3));
        assert_eq!(list.selected, 3);
        assert!(!list.handle_click(40));
    }
}
