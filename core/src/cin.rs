//! Reader for `.cin` table files.
//!
//! Only the sections the composition core consumes are interpreted:
//! `%ename`, `%cname`, `%selkey`, the `%keyname` block and the `%chardef`
//! block. Other directives are skipped. When an identity names several files,
//! they are read in order into one table and later files extend earlier ones.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::error::LoadError;
use crate::loader::TableLoader;
use crate::table::{TableContent, TableIdentity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    KeyName,
    CharDef,
}

/// Parse one cin source into `content`.
pub fn parse_cin(path: &Path, source: &str, content: &mut TableContent) -> Result<(), LoadError> {
    let mut section = Section::Header;

    for (lineno, raw) in source.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.splitn(2, char::is_whitespace);
        let head = parts.next().unwrap_or_default();
        let rest = parts.next().map(str::trim).unwrap_or_default();

        if let Some(directive) = head.strip_prefix('%') {
            match (directive, rest) {
                ("keyname", "begin") => section = Section::KeyName,
                ("chardef", "begin") => section = Section::CharDef,
                ("keyname", "end") | ("chardef", "end") => section = Section::Header,
                ("ename", name) => content.ename = name.to_string(),
                ("cname", name) => content.cname = name.to_string(),
                ("selkey", keys) if !keys.is_empty() => content.selkey = Some(keys.to_string()),
                _ => {}
            }
            continue;
        }

        match section {
            Section::Header => {}
            Section::KeyName => {
                let mut chars = head.chars();
                match (chars.next(), chars.next()) {
                    (Some(key), None) if !rest.is_empty() => {
                        let name: String = rest.nfc().collect();
                        content.insert_keyname(key.to_ascii_lowercase(), name);
                    }
                    _ => {
                        return Err(LoadError::Malformed {
                            path: path.to_path_buf(),
                            reason: format!("line {}: bad %keyname entry {:?}", lineno + 1, line),
                        });
                    }
                }
            }
            Section::CharDef => {
                if rest.is_empty() {
                    continue;
                }
                content.insert_chardef(head.to_ascii_lowercase(), rest.nfc().collect::<String>());
            }
        }
    }

    Ok(())
}

/// Loads tables from `.cin` files on disk.
#[derive(Debug, Clone, Default)]
pub struct CinFileLoader;

impl CinFileLoader {
    pub fn new() -> Self {
        Self
    }
}

impl TableLoader for CinFileLoader {
    fn load_table(&self, identity: &TableIdentity) -> Result<TableContent, LoadError> {
        if identity.files.is_empty() {
            return Err(LoadError::EmptyFileSet);
        }

        let mut content = TableContent::new();
        for path in &identity.files {
            let source = std::fs::read_to_string(path).map_err(|error| LoadError::Io {
                path: path.clone(),
                error: Arc::new(error),
            })?;
            parse_cin(path, &source, &mut content)?;
        }

        if content.is_empty() {
            let path = identity.files.last().cloned().unwrap_or_default();
            return Err(LoadError::Malformed {
                path,
                reason: "no %chardef entries".to_string(),
            });
        }

        debug!(
            ename = %content.ename,
            keynames = content.keyname_count(),
            codes = content.code_count(),
            "parsed cin table"
        );
        Ok(content)
    }
}
