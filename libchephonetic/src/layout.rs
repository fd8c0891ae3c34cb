//! Keyboard layouts and phonetic slot classification.
//!
//! Each layout lists its physical keys in bopomofo order (21 initials,
//! 3 medials, 13 finals, 4 tone marks), so the position of a key in its
//! layout identifies the symbol it types. Key codes handed to the tables are
//! always the standard-layout key at that position, which is what the
//! phonetic cin files are keyed by.

use std::fmt;

use libcin_core::ConfigError;

/// Number of keys in every layout.
pub const LAYOUT_KEY_COUNT: usize = 41;

/// Bopomofo symbols in layout order.
pub const BOPOMOFO: &str = "ㄅㄆㄇㄈㄉㄊㄋㄌㄍㄎㄏㄐㄑㄒㄓㄔㄕㄖㄗㄘㄙㄧㄨㄩㄚㄛㄜㄝㄞㄟㄠㄡㄢㄣㄤㄥㄦ˙ˊˇˋ";

const STANDARD_KEYS: &str = "1qaz2wsxedcrfv5tgbyhnujm8ik,9ol.0p;/-7634";
const ET_KEYS: &str = "bpmfdtnlvkhg7c,./j;'sexuaorwiqzy890-=1234";
const IBM_KEYS: &str = "1234567890-qwertyuiopasdfghjkl;zxcvbn/m,.";
const GIN_YIEH_KEYS: &str = "2wsx3edcrfvtgb6yhnujm8ik,9ol.0p;/-['=1qaz";

// layout positions owned by each slot class
const INITIAL_END: usize = 21;
const MEDIAL_END: usize = 24;
const FINAL_END: usize = 37;

/// Supported keyboard layouts, indexed as in the settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyboardLayout {
    #[default]
    Standard,
    Et,
    Ibm,
    GinYieh,
}

impl KeyboardLayout {
    pub const ALL: [KeyboardLayout; 4] = [
        KeyboardLayout::Standard,
        KeyboardLayout::Et,
        KeyboardLayout::Ibm,
        KeyboardLayout::GinYieh,
    ];

    pub fn from_index(index: usize) -> Result<Self, ConfigError> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(ConfigError::UnknownLayout(index))
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            KeyboardLayout::Standard => "standard",
            KeyboardLayout::Et => "et",
            KeyboardLayout::Ibm => "ibm",
            KeyboardLayout::GinYieh => "gin-yieh",
        }
    }

    /// Physical keys in bopomofo order.
    pub fn keys(self) -> &'static str {
        match self {
            KeyboardLayout::Standard => STANDARD_KEYS,
            KeyboardLayout::Et => ET_KEYS,
            KeyboardLayout::Ibm => IBM_KEYS,
            KeyboardLayout::GinYieh => GIN_YIEH_KEYS,
        }
    }

    /// Position of a physical key in this layout.
    pub fn position(self, key: char) -> Option<usize> {
        self.keys().chars().position(|c| c == key)
    }

    /// Canonical key code for a physical key of this layout.
    pub fn key_code(self, key: char) -> Option<char> {
        let pos = self.position(key)?;
        STANDARD_KEYS.chars().nth(pos)
    }

    /// The last four keys of the layout.
    pub fn end_keys(self) -> [char; 4] {
        let mut out = [' '; 4];
        for (slot, key) in out.iter_mut().zip(self.keys().chars().skip(LAYOUT_KEY_COUNT - 4)) {
            *slot = key;
        }
        out
    }
}

impl fmt::Display for KeyboardLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bopomofo symbol typed by a canonical key code.
pub fn symbol_for_code(code: char) -> Option<char> {
    let pos = STANDARD_KEYS.chars().position(|c| c == code)?;
    BOPOMOFO.chars().nth(pos)
}

/// One of the four positions of a syllable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlotClass {
    Initial,
    Medial,
    Final,
    Tone,
}

impl SlotClass {
    /// Fixed classification and rendering order.
    pub const ALL: [SlotClass; 4] = [
        SlotClass::Initial,
        SlotClass::Medial,
        SlotClass::Final,
        SlotClass::Tone,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            SlotClass::Initial => "initial",
            SlotClass::Medial => "medial",
            SlotClass::Final => "final",
            SlotClass::Tone => "tone",
        }
    }
}

impl fmt::Display for SlotClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Maps physical keys of one layout to key codes and key codes to slot
/// classes.
///
/// The end-key set is derived when the classifier is built; changing layout
/// means building a new classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneticClassifier {
    layout: KeyboardLayout,
    tables: [Vec<char>; 4],
    end_keys: [char; 4],
}

impl PhoneticClassifier {
    /// Classifier with the standard bopomofo classification tables.
    pub fn new(layout: KeyboardLayout) -> Self {
        let codes: Vec<char> = STANDARD_KEYS.chars().collect();
        Self {
            layout,
            tables: [
                codes[..INITIAL_END].to_vec(),
                codes[INITIAL_END..MEDIAL_END].to_vec(),
                codes[MEDIAL_END..FINAL_END].to_vec(),
                codes[FINAL_END..].to_vec(),
            ],
            end_keys: layout.end_keys(),
        }
    }

    /// Classifier with custom classification tables, in `SlotClass::ALL`
    /// order. A key code listed under two classes is rejected.
    pub fn from_tables(layout: KeyboardLayout, tables: [&str; 4]) -> Result<Self, ConfigError> {
        for (i, first) in tables.iter().enumerate() {
            for (j, second) in tables.iter().enumerate().skip(i + 1) {
                if let Some(key) = first.chars().find(|c| second.contains(*c)) {
                    return Err(ConfigError::OverlappingClasses {
                        key,
                        first: SlotClass::ALL[i].name(),
                        second: SlotClass::ALL[j].name(),
                    });
                }
            }
        }

        Ok(Self {
            layout,
            tables: tables.map(|t| t.chars().collect()),
            end_keys: layout.end_keys(),
        })
    }

    pub fn layout(&self) -> KeyboardLayout {
        self.layout
    }

    /// Canonical key code for a physical key.
    pub fn key_code(&self, key: char) -> Option<char> {
        self.layout.key_code(key)
    }

    /// Slot class of a key code; `None` when the code is not phonetic.
    pub fn classify(&self, code: char) -> Option<SlotClass> {
        SlotClass::ALL
            .into_iter()
            .find(|class| self.tables[class.index()].contains(&code))
    }

    /// Key code and slot class of a physical key.
    pub fn classify_key(&self, key: char) -> Option<(SlotClass, char)> {
        let code = self.key_code(key)?;
        self.classify(code).map(|class| (class, code))
    }

    pub fn end_keys(&self) -> &[char; 4] {
        &self.end_keys
    }

    pub fn is_end_key(&self, key: char) -> bool {
        self.end_keys.contains(&key)
    }

    /// Whether a physical key belongs to this layout at all.
    pub fn is_layout_key(&self, key: char) -> bool {
        self.layout.position(key).is_some()
    }
}
