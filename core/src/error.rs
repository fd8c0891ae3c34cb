//! Error types shared by the table lifecycle and configuration layers.
//!
//! Load and configuration failures travel as values: a background loader
//! stores its `LoadError` on the table entry and waiters receive a clone of
//! it, so nothing ever unwinds across the loader thread boundary.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::table::TableKind;

/// Errors raised while resolving or reading configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Layout index outside the known layouts.
    #[error("unknown keyboard layout index {0}")]
    UnknownLayout(usize),

    /// A key code appears in more than one slot class.
    #[error("key {key:?} is classified as both {first} and {second}")]
    OverlappingClasses {
        key: char,
        first: &'static str,
        second: &'static str,
    },

    /// A table selection index outside the configured file list.
    #[error("{kind} table selection {selection} is out of range ({available} available)")]
    UnknownTable {
        kind: TableKind,
        selection: usize,
        available: usize,
    },

    /// Error reading a configuration file.
    #[error("I/O error reading {path}: {error}")]
    Io {
        path: PathBuf,
        error: Arc<std::io::Error>,
    },

    /// The configuration file could not be parsed.
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Errors raised by a table loader.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// A table file could not be read.
    #[error("cannot read table file {path}: {error}")]
    Io {
        path: PathBuf,
        error: Arc<std::io::Error>,
    },

    /// A table file was read but holds no usable definitions.
    #[error("malformed table file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    /// The identity named no files.
    #[error("no table files selected")]
    EmptyFileSet,

    /// A newer load replaced this one before it could be observed.
    #[error("table load superseded by a newer selection")]
    Superseded,

    /// The loader panicked; the entry is released so a later call can retry.
    #[error("table loader aborted: {0}")]
    Aborted(String),
}

/// Status reported to the foreground when a table cannot serve lookups.
#[derive(Debug, Clone, Error)]
pub enum TableError {
    /// No identity has been selected for this table.
    #[error("no {0} table selected")]
    NotSelected(TableKind),

    /// The table failed to load; there are no candidates for this kind.
    #[error("no candidates available from the {kind} table: {source}")]
    LoadFailed {
        kind: TableKind,
        #[source]
        source: LoadError,
    },

    /// The table is disabled by configuration.
    #[error("{0} table is disabled")]
    Disabled(TableKind),

    /// The selection for this table does not resolve to a file.
    #[error("{kind} table is misconfigured: {source}")]
    Misconfigured {
        kind: TableKind,
        #[source]
        source: ConfigError,
    },
}

impl TableError {
    pub fn kind(&self) -> TableKind {
        match self {
            TableError::NotSelected(kind) | TableError::Disabled(kind) => *kind,
            TableError::LoadFailed { kind, .. } | TableError::Misconfigured { kind, .. } => *kind,
        }
    }
}
