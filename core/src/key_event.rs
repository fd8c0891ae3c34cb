//! Key events delivered by the host.

/// A key press or release as seen by a text service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    /// Printable character, already shifted by the host.
    Char(char),
    Backspace,
    Delete,
    Left,
    Right,
    Up,
    Down,
    PageUp,
    PageDown,
    Space,
    Enter,
    Escape,
    /// Shift pressed on its own.
    Shift,
    /// Ctrl held with a character.
    Ctrl(char),
    /// Alt held with a character.
    Alt(char),
}

impl KeyEvent {
    /// Whether a modifier other than Shift is held.
    pub fn has_command_modifier(&self) -> bool {
        matches!(self, KeyEvent::Ctrl(_) | KeyEvent::Alt(_))
    }
}

/// Result of processing a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyResult {
    /// Key was handled by the text service
    Handled,
    /// Key was not handled (pass through to application)
    NotHandled,
}

impl KeyResult {
    pub fn handled(self) -> bool {
        self == KeyResult::Handled
    }
}

impl From<bool> for KeyResult {
    fn from(handled: bool) -> Self {
        if handled {
            KeyResult::Handled
        } else {
            KeyResult::NotHandled
        }
    }
}
