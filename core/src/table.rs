//! Loaded symbol tables and the identities they are loaded for.
//!
//! A `TableContent` is immutable once built. Readers share it through an
//! `Arc`, so a reload never disturbs a lookup that is already running.

use std::fmt;
use std::path::PathBuf;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// The three independent tables an input method session keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableKind {
    /// Main lookup table: key codes to candidates.
    Main,
    /// Reverse lookup: a character back to its code in another input method.
    Reverse,
    /// Homophone table: characters sharing a phonetic code.
    Homophone,
}

impl TableKind {
    pub const ALL: [TableKind; 3] = [TableKind::Main, TableKind::Reverse, TableKind::Homophone];

    pub fn name(self) -> &'static str {
        match self {
            TableKind::Main => "main",
            TableKind::Reverse => "reverse-lookup",
            TableKind::Homophone => "homophone",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// What a table entry was (or should be) loaded from.
///
/// Two identities are equal when they select the same entry of the same file
/// list; the resolved paths take part in the comparison so that moving the
/// table directory forces a reload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableIdentity {
    pub selection: usize,
    pub files: Vec<PathBuf>,
}

impl TableIdentity {
    pub fn new<I, P>(selection: usize, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            selection,
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    pub fn single<P: Into<PathBuf>>(selection: usize, file: P) -> Self {
        Self {
            selection,
            files: vec![file.into()],
        }
    }
}

impl fmt::Display for TableIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} [", self.selection)?;
        for (i, path) in self.files.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", path.display())?;
        }
        f.write_str("]")
    }
}

/// Result of comparing a loaded identity against a desired one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityMatch {
    /// Nothing has been loaded yet.
    Unset,
    Matches,
    Differs,
}

impl IdentityMatch {
    pub fn compare(loaded: Option<&TableIdentity>, desired: &TableIdentity) -> Self {
        match loaded {
            None => IdentityMatch::Unset,
            Some(current) if current == desired => IdentityMatch::Matches,
            Some(_) => IdentityMatch::Differs,
        }
    }
}

/// Symbol table content: key names and the code → candidates mapping.
#[derive(Debug, Clone, Default)]
pub struct TableContent {
    /// English name (`%ename`).
    pub ename: String,
    /// Display name (`%cname`).
    pub cname: String,
    /// Selection keys declared by the table (`%selkey`), if any.
    pub selkey: Option<String>,
    keynames: AHashMap<char, String>,
    chardefs: AHashMap<String, Vec<String>>,
    // candidate text -> codes
    reverse: AHashMap<String, Vec<String>>,
}

impl TableContent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the display name of a key code.
    pub fn insert_keyname<S: Into<String>>(&mut self, key: char, name: S) {
        self.keynames.insert(key, name.into());
    }

    /// Append a candidate for a code. Duplicate candidates are ignored.
    pub fn insert_chardef<K: Into<String>, V: Into<String>>(&mut self, code: K, text: V) {
        let code = code.into();
        let text = text.into();
        let list = self.chardefs.entry(code.clone()).or_default();
        if list.contains(&text) {
            return;
        }
        list.push(text.clone());
        let codes = self.reverse.entry(text).or_default();
        if !codes.contains(&code) {
            codes.push(code);
        }
    }

    /// Display symbol for a key code, falling back to the key itself.
    pub fn key_name(&self, key: char) -> String {
        self.keynames
            .get(&key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    /// Candidates for an exact code; empty when the code is unknown.
    pub fn candidates(&self, code: &str) -> &[String] {
        self.chardefs.get(code).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every code that produces `text`.
    pub fn codes_for(&self, text: &str) -> &[String] {
        self.reverse.get(text).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Render a code through the key names (e.g. `1u3` → `ㄅㄧˇ`).
    pub fn code_display(&self, code: &str) -> String {
        code.chars().map(|c| self.key_name(c)).collect()
    }

    /// Characters sharing at least one code with `text`, excluding `text`.
    pub fn homophones(&self, text: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for code in self.codes_for(text) {
            for cand in self.candidates(code) {
                if cand != text && !out.contains(cand) {
                    out.push(cand.clone());
                }
            }
        }
        out
    }

    pub fn keyname_count(&self) -> usize {
        self.keynames.len()
    }

    pub fn code_count(&self) -> usize {
        self.chardefs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chardefs.is_empty()
    }
}
