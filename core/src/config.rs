//! Configuration snapshots and the stores they are read from.
//!
//! A `Configuration` is an immutable value. Stores hand out a fresh snapshot
//! on every `load()`, stamped with the store's version counter; consumers
//! compare versions to decide whether anything needs to be re-applied and
//! replace their snapshot wholesale when it does.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::table::{TableIdentity, TableKind};

/// Reverse-lookup tables offered when the settings list none.
pub const DEFAULT_RCIN_FILES: [&str; 4] = ["checj.cin", "array30.cin", "liu.cin", "dayi3.cin"];

/// Homophone tables offered when the settings list none.
pub const DEFAULT_HCIN_FILES: [&str; 3] = ["thphonetic.cin", "CnsPhonetic.cin", "bpmf.cin"];

fn owned(files: &[&str]) -> Vec<String> {
    files.iter().map(|f| f.to_string()).collect()
}

/// User settings shared by the table-driven input methods.
///
/// Field names are snake_case; the camelCase spellings used by the JSON
/// settings files are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Keyboard layout index (0 standard, 1 ET, 2 IBM, 3 Gin-yieh).
    #[serde(alias = "keyboardLayout")]
    pub keyboard_layout: usize,

    /// Selected entry of the input method's main cin file list.
    #[serde(alias = "selCinType")]
    pub sel_cin_type: usize,

    #[serde(alias = "imeReverseLookup")]
    pub ime_reverse_lookup: bool,
    #[serde(alias = "selRCinType")]
    pub sel_rcin_type: usize,
    #[serde(alias = "rcinFileList")]
    pub rcin_file_list: Vec<String>,

    #[serde(alias = "homophoneQuery")]
    pub homophone_query: bool,
    #[serde(alias = "selHCinType")]
    pub sel_hcin_type: usize,
    #[serde(alias = "hcinFileList")]
    pub hcin_file_list: Vec<String>,

    /// Directory holding the cin files.
    #[serde(alias = "cinDir")]
    pub cin_dir: PathBuf,

    /// Typing a layout end key closes the syllable and shows candidates.
    #[serde(alias = "useEndKey")]
    pub use_end_key: bool,

    /// Show candidates as soon as the composition is full.
    #[serde(alias = "autoShowCandWhenMaxChar")]
    pub auto_show_cand_when_max_char: bool,

    #[serde(alias = "candPerPage")]
    pub candidate_page_size: usize,

    /// Keys selecting candidates on the current page.
    #[serde(alias = "selKeys")]
    pub select_keys: String,

    /// Assigned by the store; never read from or written to disk.
    #[serde(skip)]
    pub version: u64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            keyboard_layout: 0,
            sel_cin_type: 0,
            ime_reverse_lookup: false,
            sel_rcin_type: 0,
            rcin_file_list: owned(&DEFAULT_RCIN_FILES),
            homophone_query: false,
            sel_hcin_type: 0,
            hcin_file_list: owned(&DEFAULT_HCIN_FILES),
            cin_dir: PathBuf::from("cin"),
            use_end_key: true,
            auto_show_cand_when_max_char: true,
            candidate_page_size: 10,
            select_keys: "1234567890".to_string(),
            version: 0,
        }
    }
}

impl Configuration {
    /// Parse a TOML snapshot.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Parse a JSON snapshot.
    pub fn from_json_str(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Read a snapshot from disk; `.json` files are JSON, anything else TOML.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.to_path_buf(),
            error: Arc::new(error),
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            Self::from_json_str(&content).map_err(|e| e.to_string())
        } else {
            Self::from_toml_str(&content).map_err(|e| e.to_string())
        };

        parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn table_enabled(&self, kind: TableKind) -> bool {
        match kind {
            TableKind::Main => true,
            TableKind::Reverse => self.ime_reverse_lookup,
            TableKind::Homophone => self.homophone_query,
        }
    }

    /// Cin file list `kind` selects from. An empty reverse-lookup or
    /// homophone list falls back to the default one.
    pub fn file_list<'a>(&'a self, kind: TableKind, main_files: &[&'a str]) -> Vec<&'a str> {
        let (list, defaults): (&[String], &[&'static str]) = match kind {
            TableKind::Main => return main_files.to_vec(),
            TableKind::Reverse => (self.rcin_file_list.as_slice(), &DEFAULT_RCIN_FILES[..]),
            TableKind::Homophone => (self.hcin_file_list.as_slice(), &DEFAULT_HCIN_FILES[..]),
        };
        if list.is_empty() {
            defaults.to_vec()
        } else {
            list.iter().map(String::as_str).collect()
        }
    }

    fn selection(&self, kind: TableKind) -> usize {
        match kind {
            TableKind::Main => self.sel_cin_type,
            TableKind::Reverse => self.sel_rcin_type,
            TableKind::Homophone => self.sel_hcin_type,
        }
    }

    /// Identity of the table selected for `kind`.
    ///
    /// `main_files` is the input method's own cin file list; the other kinds
    /// take their lists from the configuration. Returns `None` for a kind
    /// that is switched off.
    pub fn identity(
        &self,
        kind: TableKind,
        main_files: &[&str],
    ) -> Result<Option<TableIdentity>, ConfigError> {
        if !self.table_enabled(kind) {
            return Ok(None);
        }

        let selection = self.selection(kind);
        let files = self.file_list(kind, main_files);
        match files.get(selection) {
            Some(name) => Ok(Some(TableIdentity::single(selection, self.cin_dir.join(name)))),
            None => Err(ConfigError::UnknownTable {
                kind,
                selection,
                available: files.len(),
            }),
        }
    }

    /// Select keys limited to the page size.
    pub fn page_select_keys(&self) -> Vec<char> {
        self.select_keys
            .chars()
            .take(self.candidate_page_size.max(1))
            .collect()
    }
}

/// Where configuration snapshots come from.
pub trait ConfigStore: Send + Sync {
    /// Read the current snapshot, stamped with the current version.
    fn load(&self) -> Result<Configuration, ConfigError>;

    /// Monotonic version; changes whenever the stored settings may have.
    fn version(&self) -> u64;
}

/// Configuration file on disk. The version advances whenever the file's
/// modification time changes; a missing file reads as the defaults.
#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
    seen: Mutex<(Option<SystemTime>, u64)>,
}

impl FileConfigStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            seen: Mutex::new((None, 0)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<Configuration, ConfigError> {
        let version = self.version();
        let mut config = if self.path.exists() {
            Configuration::load_file(&self.path)?
        } else {
            debug!(path = %self.path.display(), "config file missing, using defaults");
            Configuration::default()
        };
        config.version = version;
        Ok(config)
    }

    fn version(&self) -> u64 {
        let modified = std::fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .ok();
        let mut seen = self.seen.lock();
        if seen.1 == 0 || seen.0 != modified {
            seen.0 = modified;
            seen.1 += 1;
        }
        seen.1
    }
}

/// In-memory store; every `replace` is a new version.
#[derive(Debug)]
pub struct MemoryConfigStore {
    inner: Mutex<Configuration>,
}

impl MemoryConfigStore {
    pub fn new(mut config: Configuration) -> Self {
        config.version = 1;
        Self {
            inner: Mutex::new(config),
        }
    }

    pub fn replace(&self, mut config: Configuration) {
        let mut inner = self.inner.lock();
        config.version = inner.version + 1;
        *inner = config;
    }

    /// Apply an edit to the stored settings as a new version.
    pub fn update<F: FnOnce(&mut Configuration)>(&self, edit: F) {
        let mut inner = self.inner.lock();
        let version = inner.version + 1;
        edit(&mut *inner);
        inner.version = version;
    }
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        Self::new(Configuration::default())
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<Configuration, ConfigError> {
        Ok(self.inner.lock().clone())
    }

    fn version(&self) -> u64 {
        self.inner.lock().version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIN: [&str; 3] = ["thphonetic.cin", "CnsPhonetic.cin", "bpmf.cin"];

    #[test]
    fn toml_round_trip_skips_version() {
        let mut cfg = Configuration::default();
        cfg.version = 42;
        cfg.keyboard_layout = 2;
        let text = cfg.to_toml_string().unwrap();
        assert!(!text.contains("version"));
        let parsed = Configuration::from_toml_str(&text).unwrap();
        assert_eq!(parsed.keyboard_layout, 2);
        assert_eq!(parsed.version, 0);
    }

    #[test]
    fn json_accepts_camel_case_names() {
        let cfg = Configuration::from_json_str(
            r#"{ "keyboardLayout": 1, "imeReverseLookup": true, "selRCinType": 2, "cinDir": "/tables" }"#,
        )
        .unwrap();
        assert_eq!(cfg.keyboard_layout, 1);
        assert!(cfg.ime_reverse_lookup);
        assert_eq!(cfg.sel_rcin_type, 2);
        assert_eq!(cfg.cin_dir, PathBuf::from("/tables"));
        assert!(cfg.use_end_key);
    }

    #[test]
    fn identity_resolves_against_file_lists() {
        let mut cfg = Configuration::default();
        cfg.sel_cin_type = 2;
        let main = cfg.identity(TableKind::Main, &MAIN).unwrap().unwrap();
        assert_eq!(main.selection, 2);
        assert_eq!(main.files, vec![PathBuf::from("cin").join("bpmf.cin")]);

        assert_eq!(cfg.identity(TableKind::Reverse, &MAIN).unwrap(), None);

        cfg.homophone_query = true;
        cfg.sel_hcin_type = 9;
        assert!(matches!(
            cfg.identity(TableKind::Homophone, &MAIN),
            Err(ConfigError::UnknownTable {
                kind: TableKind::Homophone,
                selection: 9,
                available: 3
            })
        ));
    }

    #[test]
    fn empty_optional_lists_fall_back_to_defaults() {
        let cfg = Configuration::from_json_str(
            r#"{ "imeReverseLookup": true, "rcinFileList": [], "selRCinType": 1, "hcinFileList": [] }"#,
        )
        .unwrap();
        let reverse = cfg.identity(TableKind::Reverse, &MAIN).unwrap().unwrap();
        assert_eq!(reverse.files, vec![PathBuf::from("cin").join("array30.cin")]);
        assert_eq!(cfg.file_list(TableKind::Homophone, &MAIN), DEFAULT_HCIN_FILES);
        assert_eq!(cfg.file_list(TableKind::Main, &MAIN[..1]), ["thphonetic.cin"]);
    }

    #[test]
    fn file_store_versions_follow_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let store = FileConfigStore::new(&path);

        let defaults = store.load().unwrap();
        assert_eq!(defaults.keyboard_layout, 0);
        let v1 = store.version();
        assert_eq!(store.version(), v1);

        std::fs::write(&path, "keyboard_layout = 3\n").unwrap();
        let cfg = store.load().unwrap();
        assert_eq!(cfg.keyboard_layout, 3);
        assert!(cfg.version > v1);
    }

    #[test]
    fn unparsable_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Configuration::load_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn memory_store_bumps_on_replace() {
        let store = MemoryConfigStore::default();
        assert_eq!(store.version(), 1);
        store.update(|cfg| cfg.homophone_query = true);
        assert_eq!(store.version(), 2);
        let cfg = store.load().unwrap();
        assert!(cfg.homophone_query);
        assert_eq!(cfg.version, 2);
    }
}
