//! # libchephonetic
//!
//! Phonetic (bopomofo) input method built on libcin-core.
//!
//! Public API:
//! - `KeyboardLayout` / `PhoneticClassifier` - Layout key maps and slot classification
//! - `CompositionEngine` - The syllable being typed, resolved against a loaded cin table
//! - `ConfigWatcher` - Applies configuration changes and triggers table reloads
//! - `PhoneticTextService` - The host-facing session

pub mod layout;
pub mod composition;
pub mod profile;
pub mod watcher;
pub mod service;

pub use libcin_core::{
    CandidateList, CinFileLoader, ConfigError, ConfigStore, Configuration, FileConfigStore,
    ImeContext, KeyEvent, KeyResult, LoadError, MemoryConfigStore, TableError, TableKind,
    TableLoadCoordinator, TableSet,
};

pub use layout::{KeyboardLayout, PhoneticClassifier, SlotClass, BOPOMOFO, LAYOUT_KEY_COUNT};
pub use composition::{CompositionEngine, CompositionError, KeyOutcome, Rendered};
pub use profile::ImeProfile;
pub use watcher::{ChangeSet, ConfigWatcher, WatchTargets};
pub use service::{PhoneticTextService, PreservedKey, HOMOPHONE_KEY};
