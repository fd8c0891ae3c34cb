//! Host-facing context.
//!
//! After each call into a text service the host reads these fields to update
//! its composition buffer and candidate window. Plain data, no callbacks.

use crate::error::TableError;

/// State the host renders after each key.
#[derive(Debug, Clone, Default)]
pub struct ImeContext {
    /// Composition buffer text.
    pub preedit_text: String,

    /// Cursor within the composition buffer, in characters.
    pub preedit_cursor: usize,

    /// Text to commit to the application (consume and clear).
    pub commit_text: String,

    /// Candidates on the visible page.
    pub candidates: Vec<String>,

    /// Highlighted candidate on the visible page.
    pub candidate_cursor: usize,

    /// Whether the candidate window is open.
    pub show_candidates: bool,

    /// Hint line: reverse-lookup codes, homophone source, mode.
    pub auxiliary_text: String,

    /// Set when the last key was rejected because the composition is full.
    pub overflow: bool,

    /// Table problem the host should surface, if any.
    pub status: Option<TableError>,
}

impl ImeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the composition and candidate state. `commit_text` survives so
    /// the host can still consume it.
    pub fn clear(&mut self) {
        self.preedit_text.clear();
        self.preedit_cursor = 0;
        self.candidates.clear();
        self.candidate_cursor = 0;
        self.show_candidates = false;
        self.overflow = false;
    }

    pub fn take_commit(&mut self) -> String {
        std::mem::take(&mut self.commit_text)
    }

    pub fn has_visible_state(&self) -> bool {
        !self.preedit_text.is_empty() || self.show_candidates
    }

    pub fn has_commit(&self) -> bool {
        !self.commit_text.is_empty()
    }
}
