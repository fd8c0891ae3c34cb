//! Syllable composition state.
//!
//! Keys are classified into the four slot classes and kept in `raw_keys` as
//! canonical key codes. The syllable shown to the user is always derived from
//! the slots, never from `raw_keys` directly: one symbol per class, the last
//! key typed for a class wins, and classes render in fixed order.

use libcin_core::TableContent;
use thiserror::Error;
use tracing::debug;

use crate::layout::{KeyboardLayout, PhoneticClassifier, SlotClass};

/// Default bound on the keys of one syllable.
pub const DEFAULT_MAX_CHAR_LENGTH: usize = 4;

/// Local rejection of a key; the composition is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositionError {
    #[error("composition already holds {max} symbols")]
    Overflow { max: usize },
}

/// What `accept_key` did with a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Stored in the slot of this class.
    Composed(SlotClass),
    /// Stored, and the key is a layout end key: the syllable is complete.
    EndOfSyllable(SlotClass),
    /// An unclassified end key; the caller should resolve the syllable.
    Commit,
    /// Not a phonetic key. Nothing changed.
    Unmapped,
}

/// A composition resolved against a loaded table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    /// Key names of the filled slots, in class order.
    pub display: String,
    /// Key codes of the filled slots, in class order; the table lookup key.
    pub code: String,
    pub candidates: Vec<String>,
    /// Cursor position in `display`, in characters.
    pub cursor: usize,
}

/// The live syllable being typed.
#[derive(Debug, Clone)]
pub struct CompositionEngine {
    classifier: PhoneticClassifier,
    max_len: usize,
    use_end_key: bool,
    raw_keys: Vec<char>,
    slots: [Option<char>; 4],
}

impl CompositionEngine {
    pub fn new(classifier: PhoneticClassifier) -> Self {
        Self::with_max_len(classifier, DEFAULT_MAX_CHAR_LENGTH)
    }

    pub fn with_max_len(classifier: PhoneticClassifier, max_len: usize) -> Self {
        Self {
            classifier,
            max_len: max_len.max(1),
            use_end_key: true,
            raw_keys: Vec::new(),
            slots: [None; 4],
        }
    }

    pub fn classifier(&self) -> &PhoneticClassifier {
        &self.classifier
    }

    pub fn layout(&self) -> KeyboardLayout {
        self.classifier.layout()
    }

    /// Switch layouts. Stored codes are canonical, so the current syllable
    /// survives; only key classification and the end-key set change.
    pub fn set_layout(&mut self, layout: KeyboardLayout) {
        if self.classifier.layout() != layout {
            debug!(from = %self.classifier.layout(), to = %layout, "keyboard layout changed");
            self.classifier = PhoneticClassifier::new(layout);
        }
    }

    pub fn set_use_end_key(&mut self, enabled: bool) {
        self.use_end_key = enabled;
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Apply one physical key.
    pub fn accept_key(&mut self, key: char) -> Result<KeyOutcome, CompositionError> {
        let end_key = self.use_end_key && self.classifier.is_end_key(key);

        let Some((class, code)) = self.classifier.classify_key(key) else {
            return Ok(if end_key {
                KeyOutcome::Commit
            } else {
                KeyOutcome::Unmapped
            });
        };

        if self.slots[class.index()].is_none() && self.contributors() >= self.max_len {
            debug!(key = %key, max = self.max_len, "composition full, key rejected");
            return Err(CompositionError::Overflow { max: self.max_len });
        }

        self.slots[class.index()] = Some(code);
        self.raw_keys.push(code);
        if self.raw_keys.len() > self.max_len {
            self.compact();
        }

        Ok(if end_key {
            KeyOutcome::EndOfSyllable(class)
        } else {
            KeyOutcome::Composed(class)
        })
    }

    /// Resolve the slots against a loaded table.
    pub fn render(&self, table: &TableContent) -> Rendered {
        let mut display = String::new();
        let mut code = String::new();
        for key in self.slots.iter().flatten() {
            display.push_str(&table.key_name(*key));
            code.push(*key);
        }

        Rendered {
            cursor: display.chars().count(),
            candidates: table.candidates(&code).to_vec(),
            display,
            code,
        }
    }

    /// Key codes of the filled slots, in class order.
    pub fn code(&self) -> String {
        self.slots.iter().flatten().collect()
    }

    pub fn clear(&mut self) {
        self.raw_keys.clear();
        self.slots = [None; 4];
    }

    /// Drop the last key typed. Returns false when there was nothing to drop.
    pub fn backspace(&mut self) -> bool {
        if self.raw_keys.pop().is_none() {
            return false;
        }
        self.rederive();
        true
    }

    pub fn raw_keys(&self) -> &[char] {
        &self.raw_keys
    }

    pub fn slots(&self) -> &[Option<char>; 4] {
        &self.slots
    }

    pub fn slot(&self, class: SlotClass) -> Option<char> {
        self.slots[class.index()]
    }

    /// Number of filled slots.
    pub fn contributors(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.raw_keys.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.contributors() >= self.max_len
    }

    fn rederive(&mut self) {
        self.slots = [None; 4];
        for &code in &self.raw_keys {
            if let Some(class) = self.classifier.classify(code) {
                self.slots[class.index()] = Some(code);
            }
        }
    }

    // drop keys whose slot was overwritten later
    fn compact(&mut self) {
        let mut kept: Vec<char> = Vec::with_capacity(self.max_len);
        let mut seen = [false; 4];
        for &code in self.raw_keys.iter().rev() {
            match self.classifier.classify(code) {
                Some(class) if !seen[class.index()] => {
                    seen[class.index()] = true;
                    kept.push(code);
                }
                _ => {}
            }
        }
        kept.reverse();
        self.raw_keys = kept;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TableContent {
        let mut t = TableContent::new();
        for (key, name) in [
            ('1', "ㄅ"),
            ('q', "ㄆ"),
            ('u', "ㄧ"),
            ('j', "ㄨ"),
            ('8', "ㄚ"),
            ('7', "˙"),
            ('3', "ˇ"),
        ] {
            t.insert_keyname(key, name);
        }
        t.insert_chardef("1u3", "比");
        t.insert_chardef("1u3", "筆");
        t.insert_chardef("187", "吧");
        t
    }

    fn engine() -> CompositionEngine {
        CompositionEngine::new(PhoneticClassifier::new(KeyboardLayout::Standard))
    }

    fn type_keys(engine: &mut CompositionEngine, keys: &str) {
        for key in keys.chars() {
            engine.accept_key(key).unwrap();
        }
    }

    #[test]
    fn full_syllable_in_class_order() {
        let mut e = engine();
        type_keys(&mut e, "1u87");
        assert_eq!(e.slots(), &[Some('1'), Some('u'), Some('8'), Some('7')]);
        let r = e.render(&table());
        assert_eq!(r.display, "ㄅㄧㄚ˙");
        assert_eq!(r.code, "1u87");
        assert_eq!(r.cursor, 4);
    }

    #[test]
    fn typing_order_does_not_matter() {
        let mut e = engine();
        type_keys(&mut e, "3u1");
        let r = e.render(&table());
        assert_eq!(r.display, "ㄅㄧˇ");
        assert_eq!(r.candidates, ["比", "筆"]);
    }

    #[test]
    fn last_key_of_a_class_wins() {
        let mut e = engine();
        type_keys(&mut e, "1q");
        assert_eq!(e.slot(SlotClass::Initial), Some('q'));
        assert_eq!(e.render(&table()).display, "ㄆ");
    }

    #[test]
    fn end_keys_close_the_syllable() {
        let mut e = engine();
        assert_eq!(e.accept_key('1'), Ok(KeyOutcome::Composed(SlotClass::Initial)));
        assert_eq!(e.accept_key('3'), Ok(KeyOutcome::EndOfSyllable(SlotClass::Tone)));

        e.set_use_end_key(false);
        assert_eq!(e.accept_key('7'), Ok(KeyOutcome::Composed(SlotClass::Tone)));
        assert_eq!(e.accept_key('A'), Ok(KeyOutcome::Unmapped));
    }

    #[test]
    fn unclassified_end_key_commits_without_touching_slots() {
        let classifier =
            PhoneticClassifier::from_tables(KeyboardLayout::Standard, ["1qaz", "ujm", "8ik", ""])
                .unwrap();
        let mut e = CompositionEngine::new(classifier);
        type_keys(&mut e, "1u");
        assert_eq!(e.accept_key('4'), Ok(KeyOutcome::Commit));
        assert_eq!(e.raw_keys(), ['1', 'u']);
    }

    #[test]
    fn backspace_equals_never_typing_the_key() {
        let t = table();
        let mut typed = engine();
        type_keys(&mut typed, "1u8");
        typed.backspace();

        let mut direct = engine();
        type_keys(&mut direct, "1u");
        assert_eq!(typed.render(&t), direct.render(&t));

        // a shadowed key reappears once the key that replaced it is removed
        let mut e = engine();
        type_keys(&mut e, "1q");
        assert!(e.backspace());
        assert_eq!(e.slot(SlotClass::Initial), Some('1'));
        assert!(e.backspace());
        assert!(!e.backspace());
        assert!(e.is_empty());
    }

    #[test]
    fn overwrites_never_overflow() {
        let mut e = engine();
        type_keys(&mut e, "1u87");
        assert!(e.is_full());
        type_keys(&mut e, "q3j");
        assert_eq!(e.raw_keys().len(), 4);
        assert_eq!(e.render(&table()).display, "ㄆㄨㄚˇ");
    }

    #[test]
    fn shadowed_key_is_gone_once_the_bound_is_reached() {
        let mut e = engine();
        type_keys(&mut e, "1u87q");
        assert_eq!(e.raw_keys(), ['u', '8', '7', 'q']);
        assert!(e.backspace());
        // '1' was compacted away when 'q' went past the bound
        assert_eq!(e.slot(SlotClass::Initial), None);
        assert_eq!(e.code(), "u87");
    }

    #[test]
    fn new_class_past_the_limit_is_rejected() {
        let classifier = PhoneticClassifier::new(KeyboardLayout::Standard);
        let mut e = CompositionEngine::with_max_len(classifier, 3);
        type_keys(&mut e, "1u8");
        let before = e.raw_keys().to_vec();
        assert_eq!(e.accept_key('7'), Err(CompositionError::Overflow { max: 3 }));
        assert_eq!(e.raw_keys(), before.as_slice());
        assert_eq!(e.slot(SlotClass::Tone), None);
        assert_eq!(e.accept_key('q'), Ok(KeyOutcome::Composed(SlotClass::Initial)));
    }

    #[test]
    fn clear_resets_everything() {
        let mut e = engine();
        type_keys(&mut e, "1u");
        e.clear();
        assert!(e.is_empty());
        assert_eq!(e.slots(), &[None; 4]);
        assert_eq!(e.render(&table()), Rendered::default());
    }

    #[test]
    fn layout_switch_keeps_canonical_codes() {
        let mut e = engine();
        type_keys(&mut e, "1u");
        e.set_layout(KeyboardLayout::Et);
        // ET 'a' is ㄚ
        e.accept_key('a').unwrap();
        assert_eq!(e.code(), "1u8");
        assert!(e.classifier().is_end_key('1'));
    }
}
