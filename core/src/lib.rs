//! libcin-core
//!
//! Table lifecycle and host plumbing shared by the table-driven input
//! methods (see `libchephonetic`).
//!
//! Public API:
//! - `TableContent` - Loaded cin table: key names and code → candidates
//! - `TableEntry` / `TableSet` - A table plus its load state; the three tables of a session
//! - `TableLoadCoordinator` - Background loading with single-loader guarantees
//! - `CinFileLoader` - `TableLoader` reading `.cin` files
//! - `Configuration` / `ConfigStore` - Immutable settings snapshots and their stores
//! - `ImeContext`, `CandidateList`, `KeyEvent` - What the host reads and sends

pub mod error;
pub use error::{ConfigError, LoadError, TableError};

pub mod table;
pub use table::{IdentityMatch, TableContent, TableIdentity, TableKind};

pub mod loader;
pub use loader::{
    EnsureOutcome, LoadHandle, LoadState, TableEntry, TableLoadCoordinator, TableLoader, TableSet,
};

pub mod cin;
pub use cin::CinFileLoader;

pub mod config;
pub use config::{
    ConfigStore, Configuration, FileConfigStore, MemoryConfigStore, DEFAULT_HCIN_FILES,
    DEFAULT_RCIN_FILES,
};

pub mod candidate;
pub use candidate::CandidateList;

pub mod context;
pub use context::ImeContext;

pub mod key_event;
pub use key_event::{KeyEvent, KeyResult};
