//! Paginated candidate list.
//!
//! Cin tables carry no scores; candidates keep the order in which the table
//! defines them.

use std::ops::Range;

/// A paginated list of candidate strings with cursor navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateList {
    items: Vec<String>,
    page_size: usize,
    page: usize,
    /// Cursor within the current page.
    cursor: usize,
}

impl CandidateList {
    pub fn new() -> Self {
        Self::with_page_size(10)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            items: Vec::new(),
            page_size: page_size.max(1),
            page: 0,
            cursor: 0,
        }
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.reset();
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Replace the candidates, resetting pagination.
    pub fn set_candidates(&mut self, items: Vec<String>) {
        self.items = items;
        self.reset();
    }

    pub fn candidates(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn num_pages(&self) -> usize {
        self.items.len().div_ceil(self.page_size)
    }

    pub fn current_page(&self) -> usize {
        self.page
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn page_range(&self) -> Range<usize> {
        let start = (self.page * self.page_size).min(self.items.len());
        let end = (start + self.page_size).min(self.items.len());
        start..end
    }

    pub fn current_page_candidates(&self) -> &[String] {
        &self.items[self.page_range()]
    }

    /// Candidate under the cursor.
    pub fn selected(&self) -> Option<&str> {
        self.current_page_candidates()
            .get(self.cursor)
            .map(String::as_str)
    }

    pub fn cursor_up(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    pub fn cursor_down(&mut self) -> bool {
        if self.cursor + 1 >= self.current_page_candidates().len() {
            return false;
        }
        self.cursor += 1;
        true
    }

    pub fn page_up(&mut self) -> bool {
        if self.page == 0 {
            return false;
        }
        self.page -= 1;
        self.clamp_cursor();
        true
    }

    pub fn page_down(&mut self) -> bool {
        if self.page + 1 >= self.num_pages() {
            return false;
        }
        self.page += 1;
        self.clamp_cursor();
        true
    }

    /// Move the cursor to `index` on the current page and return that
    /// candidate.
    pub fn select_on_page(&mut self, index: usize) -> Option<&str> {
        if index >= self.current_page_candidates().len() {
            return None;
        }
        self.cursor = index;
        self.selected()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.reset();
    }

    pub fn reset(&mut self) {
        self.page = 0;
        self.cursor = 0;
    }

    fn clamp_cursor(&mut self) {
        let len = self.current_page_candidates().len();
        if len > 0 && self.cursor >= len {
            self.cursor = len - 1;
        }
    }
}

impl Default for CandidateList {
    fn default() -> Self {
        Self::new()
    }
}
