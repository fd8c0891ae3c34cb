//! Applying configuration changes mid-session.
//!
//! The watcher keeps the last snapshot it applied as its baseline. A poll
//! compares the store's version against it, diffs the new snapshot field by
//! field, validates what changed, applies it and only then adopts the new
//! snapshot. A snapshot with a bad layout or main table selection leaves the
//! baseline alone; a bad reverse-lookup or homophone selection only disables
//! that table.

use libcin_core::{
    ConfigError, ConfigStore, Configuration, EnsureOutcome, TableIdentity, TableKind,
    TableLoadCoordinator, TableSet,
};
use tracing::{debug, info, warn};

use crate::composition::CompositionEngine;
use crate::layout::KeyboardLayout;

/// Field-level differences between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// New layout index, when it changed.
    pub layout: Option<usize>,
    /// Table kinds whose selection, file list or directory changed.
    pub tables: Vec<TableKind>,
    pub reverse_toggled: bool,
    pub homophone_toggled: bool,
    /// End-key, auto-show or candidate paging settings changed.
    pub behavior: bool,
}

impl ChangeSet {
    /// Everything in `config`, as seen by a session with no baseline.
    pub fn all(config: &Configuration) -> Self {
        Self {
            layout: Some(config.keyboard_layout),
            tables: TableKind::ALL.to_vec(),
            reverse_toggled: config.ime_reverse_lookup,
            homophone_toggled: config.homophone_query,
            behavior: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.layout.is_none()
            && self.tables.is_empty()
            && !self.reverse_toggled
            && !self.homophone_toggled
            && !self.behavior
    }
}

/// What a poll applies changes to.
pub struct WatchTargets<'a> {
    pub coordinator: &'a TableLoadCoordinator,
    pub tables: &'a TableSet,
    pub engine: &'a mut CompositionEngine,
    /// Main cin file list of the input method.
    pub main_files: &'a [&'a str],
}

/// Detects and applies configuration changes.
#[derive(Debug, Default)]
pub struct ConfigWatcher {
    baseline: Option<Configuration>,
    rejected_version: Option<u64>,
}

impl ConfigWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// The snapshot currently in effect.
    pub fn current(&self) -> Option<&Configuration> {
        self.baseline.as_ref()
    }

    /// Diff two snapshots. `previous` is never modified; `None` means
    /// everything is new.
    pub fn check_for_change(
        current: &Configuration,
        previous: Option<&Configuration>,
    ) -> ChangeSet {
        let Some(previous) = previous else {
            return ChangeSet::all(current);
        };

        let mut changes = ChangeSet::default();
        if current.keyboard_layout != previous.keyboard_layout {
            changes.layout = Some(current.keyboard_layout);
        }

        let dir_changed = current.cin_dir != previous.cin_dir;
        if dir_changed || current.sel_cin_type != previous.sel_cin_type {
            changes.tables.push(TableKind::Main);
        }

        changes.reverse_toggled = current.ime_reverse_lookup != previous.ime_reverse_lookup;
        if dir_changed
            || changes.reverse_toggled
            || current.sel_rcin_type != previous.sel_rcin_type
            || current.rcin_file_list != previous.rcin_file_list
        {
            changes.tables.push(TableKind::Reverse);
        }

        changes.homophone_toggled = current.homophone_query != previous.homophone_query;
        if dir_changed
            || changes.homophone_toggled
            || current.sel_hcin_type != previous.sel_hcin_type
            || current.hcin_file_list != previous.hcin_file_list
        {
            changes.tables.push(TableKind::Homophone);
        }

        changes.behavior = current.use_end_key != previous.use_end_key
            || current.auto_show_cand_when_max_char != previous.auto_show_cand_when_max_char
            || current.candidate_page_size != previous.candidate_page_size
            || current.select_keys != previous.select_keys;

        changes
    }

    /// Check the store and apply whatever changed.
    ///
    /// Returns `Ok(None)` when the store has nothing new. Table loads are
    /// started, not awaited; a load failure is logged and left on the table
    /// entry for the foreground to report.
    pub fn poll(
        &mut self,
        store: &dyn ConfigStore,
        targets: WatchTargets<'_>,
    ) -> Result<Option<ChangeSet>, ConfigError> {
        let version = store.version();
        if self.baseline.as_ref().is_some_and(|b| b.version == version)
            || self.rejected_version == Some(version)
        {
            return Ok(None);
        }

        let current = store.load()?;
        let changes = Self::check_for_change(&current, self.baseline.as_ref());
        if changes.is_empty() {
            debug!(version = current.version, "configuration touched without changes");
            self.baseline = Some(current);
            return Ok(None);
        }

        let (layout, loads) = match Self::validate(&current, &changes, targets.main_files) {
            Ok(validated) => validated,
            Err(err) => {
                warn!(version = current.version, error = %err, "configuration rejected");
                self.rejected_version = Some(current.version);
                return Err(err);
            }
        };

        info!(version = current.version, changes = ?changes, "applying configuration");
        targets.engine.set_layout(layout);
        targets.engine.set_use_end_key(current.use_end_key);

        for (kind, identity) in loads {
            match targets.coordinator.ensure_loaded(targets.tables.get(kind), &identity) {
                Ok(EnsureOutcome::Ready(_)) => debug!(kind = %kind, "table already loaded"),
                Ok(EnsureOutcome::Started(handle)) => {
                    debug!(kind = %kind, identity = %handle.identity(), "table load started")
                }
                Err(err) => warn!(kind = %kind, error = %err, "table load failed"),
            }
        }

        self.rejected_version = None;
        self.baseline = Some(current);
        Ok(Some(changes))
    }

    fn validate(
        current: &Configuration,
        changes: &ChangeSet,
        main_files: &[&str],
    ) -> Result<(KeyboardLayout, Vec<(TableKind, TableIdentity)>), ConfigError> {
        let layout = KeyboardLayout::from_index(current.keyboard_layout)?;
        let mut loads = Vec::new();
        for &kind in &changes.tables {
            match current.identity(kind, main_files) {
                Ok(Some(identity)) => loads.push((kind, identity)),
                Ok(None) => {}
                Err(err) if kind == TableKind::Main => return Err(err),
                // reported through the table status until the selection is fixed
                Err(err) => warn!(kind = %kind, error = %err, "optional table skipped"),
            }
        }
        Ok((layout, loads))
    }
}
