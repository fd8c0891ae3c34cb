//! Per-input-method constants.

use crate::composition::DEFAULT_MAX_CHAR_LENGTH;

/// Fixed facts about one table-driven input method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImeProfile {
    /// Directory name used for per-user settings.
    pub name: &'static str,
    /// Maximum keys per syllable.
    pub max_char_length: usize,
    /// Main cin files, indexed by `Configuration::sel_cin_type`.
    pub cin_files: &'static [&'static str],
}

impl ImeProfile {
    pub const fn chephonetic() -> Self {
        Self {
            name: "chephonetic",
            max_char_length: DEFAULT_MAX_CHAR_LENGTH,
            cin_files: &["thphonetic.cin", "CnsPhonetic.cin", "bpmf.cin"],
        }
    }
}

impl Default for ImeProfile {
    fn default() -> Self {
        Self::chephonetic()
    }
}
