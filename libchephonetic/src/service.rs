//! The phonetic text service driven by the host.
//!
//! The host calls the `filter_*`/`on_*` methods as keys arrive and reads the
//! [`ImeContext`] afterwards. Tables are loaded in the background by the
//! coordinator; the service only blocks on the main table, and only when it
//! actually needs to resolve a syllable.

use std::sync::Arc;

use libcin_core::{
    CandidateList, ConfigError, ConfigStore, Configuration, ImeContext, KeyEvent, KeyResult,
    TableContent, TableError, TableKind, TableLoadCoordinator, TableSet,
};
use tracing::{debug, info, warn};

use crate::composition::{CompositionEngine, CompositionError, KeyOutcome};
use crate::layout::{symbol_for_code, KeyboardLayout, PhoneticClassifier};
use crate::profile::ImeProfile;
use crate::watcher::{ChangeSet, ConfigWatcher, WatchTargets};

/// Key that replaces the candidate list with homophones of the highlighted
/// candidate.
pub const HOMOPHONE_KEY: char = '`';

/// Keys the host reserves for the service regardless of focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreservedKey {
    /// Switch between Chinese and ASCII input.
    ToggleMode,
}

/// A phonetic (bopomofo) input method session.
pub struct PhoneticTextService {
    profile: ImeProfile,
    store: Arc<dyn ConfigStore>,
    coordinator: TableLoadCoordinator,
    tables: TableSet,
    engine: CompositionEngine,
    watcher: ConfigWatcher,
    candidates: CandidateList,
    ctx: ImeContext,
    chinese_mode: bool,
    activated: bool,
    shift_pending: bool,
}

impl std::fmt::Debug for PhoneticTextService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhoneticTextService")
            .field("profile", &self.profile.name)
            .field("layout", &self.engine.layout())
            .field("chinese_mode", &self.chinese_mode)
            .field("activated", &self.activated)
            .finish_non_exhaustive()
    }
}

impl PhoneticTextService {
    pub fn new(
        profile: ImeProfile,
        store: Arc<dyn ConfigStore>,
        coordinator: TableLoadCoordinator,
    ) -> Self {
        Self::with_tables(profile, store, coordinator, TableSet::new())
    }

    /// Session sharing `tables` with other sessions of the same process.
    pub fn with_tables(
        profile: ImeProfile,
        store: Arc<dyn ConfigStore>,
        coordinator: TableLoadCoordinator,
        tables: TableSet,
    ) -> Self {
        let classifier = PhoneticClassifier::new(KeyboardLayout::default());
        Self {
            engine: CompositionEngine::with_max_len(classifier, profile.max_char_length),
            profile,
            store,
            coordinator,
            tables,
            watcher: ConfigWatcher::new(),
            candidates: CandidateList::new(),
            ctx: ImeContext::new(),
            chinese_mode: true,
            activated: false,
            shift_pending: false,
        }
    }

    pub fn profile(&self) -> &ImeProfile {
        &self.profile
    }

    pub fn context(&self) -> &ImeContext {
        &self.ctx
    }

    /// Take the text committed by the last key, if any.
    pub fn take_commit(&mut self) -> String {
        self.ctx.take_commit()
    }

    pub fn engine(&self) -> &CompositionEngine {
        &self.engine
    }

    pub fn tables(&self) -> &TableSet {
        &self.tables
    }

    pub fn candidates(&self) -> &CandidateList {
        &self.candidates
    }

    /// The configuration snapshot in effect, once one has been applied.
    pub fn config(&self) -> Option<&Configuration> {
        self.watcher.current()
    }

    pub fn is_chinese_mode(&self) -> bool {
        self.chinese_mode
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    fn is_composing(&self) -> bool {
        !self.engine.is_empty() || self.ctx.show_candidates
    }

    /// Pick up configuration changes from the store.
    pub fn check_config_change(&mut self) -> Result<Option<ChangeSet>, ConfigError> {
        let changes = self.watcher.poll(
            self.store.as_ref(),
            WatchTargets {
                coordinator: &self.coordinator,
                tables: &self.tables,
                engine: &mut self.engine,
                main_files: self.profile.cin_files,
            },
        )?;

        if let (Some(changes), Some(config)) = (&changes, self.watcher.current()) {
            if changes.behavior {
                self.candidates.set_page_size(config.candidate_page_size);
            }
        }
        Ok(changes)
    }

    fn poll_config(&mut self) {
        if let Err(err) = self.check_config_change() {
            warn!(error = %err, "keeping previous configuration");
        }
    }

    fn config_flag(&self, f: impl Fn(&Configuration) -> bool) -> bool {
        self.watcher.current().is_some_and(f)
    }

    // Host lifecycle

    pub fn on_activate(&mut self) {
        info!(ime = self.profile.name, "activated");
        self.activated = true;
        self.poll_config();
    }

    pub fn on_deactivate(&mut self) {
        info!(ime = self.profile.name, "deactivated");
        self.activated = false;
        self.shift_pending = false;
        self.reset_composition();
    }

    /// The host ended the composition. When `forced` (focus moved away, the
    /// application closed the context) everything is dropped without a
    /// commit.
    pub fn on_composition_terminated(&mut self, forced: bool) {
        if forced {
            info!("composition terminated by host");
            self.reset_composition();
        } else {
            debug!("composition ended");
        }
    }

    /// Called when the host keyboard is opened or closed.
    pub fn on_keyboard_status_changed(&mut self, opened: bool) {
        if !opened {
            self.reset_composition();
        }
    }

    pub fn on_preserved_key(&mut self, key: PreservedKey) -> bool {
        match key {
            PreservedKey::ToggleMode => {
                self.toggle_mode();
                true
            }
        }
    }

    // Key handling

    /// Whether the service wants `event`; `true` means `on_key_down` follows.
    pub fn filter_key_down(&mut self, event: &KeyEvent) -> bool {
        self.poll_config();
        self.shift_pending = *event == KeyEvent::Shift;

        if !self.activated || !self.chinese_mode || event.has_command_modifier() {
            return false;
        }
        if self.is_composing() {
            return true;
        }
        match event {
            KeyEvent::Char(c) => self.engine.classifier().is_layout_key(*c),
            _ => false,
        }
    }

    pub fn on_key_down(&mut self, event: &KeyEvent) -> KeyResult {
        self.ctx.overflow = false;

        if self.ctx.show_candidates {
            if let Some(result) = self.on_candidate_key(event) {
                return result;
            }
        }

        match *event {
            KeyEvent::Char(c) => self.on_char(c),
            KeyEvent::Space if !self.engine.is_empty() => {
                self.show_candidates();
                KeyResult::Handled
            }
            KeyEvent::Enter if !self.engine.is_empty() => {
                let text = self.ctx.preedit_text.clone();
                self.commit(&text, false);
                KeyResult::Handled
            }
            KeyEvent::Backspace if !self.engine.is_empty() => {
                self.engine.backspace();
                self.update_composition();
                KeyResult::Handled
            }
            KeyEvent::Escape if !self.engine.is_empty() => {
                self.reset_composition();
                KeyResult::Handled
            }
            _ => self.is_composing().into(),
        }
    }

    /// A lone Shift press and release toggles the input mode.
    pub fn filter_key_up(&mut self, event: &KeyEvent) -> bool {
        self.activated && self.shift_pending && *event == KeyEvent::Shift
    }

    pub fn on_key_up(&mut self, event: &KeyEvent) -> KeyResult {
        if self.shift_pending && *event == KeyEvent::Shift {
            self.shift_pending = false;
            self.toggle_mode();
            return KeyResult::Handled;
        }
        KeyResult::NotHandled
    }

    fn toggle_mode(&mut self) {
        self.chinese_mode = !self.chinese_mode;
        self.reset_composition();
        let mode = if self.chinese_mode { "中" } else { "英" };
        self.ctx.auxiliary_text = mode.to_string();
        info!(chinese = self.chinese_mode, "input mode toggled");
    }

    fn on_char(&mut self, key: char) -> KeyResult {
        match self.engine.accept_key(key) {
            Err(CompositionError::Overflow { .. }) => {
                self.ctx.overflow = true;
                KeyResult::Handled
            }
            Ok(KeyOutcome::Composed(_)) => {
                self.update_composition();
                let auto_show = self.config_flag(|c| c.auto_show_cand_when_max_char);
                if auto_show && self.engine.is_full() {
                    self.show_candidates();
                }
                KeyResult::Handled
            }
            Ok(KeyOutcome::EndOfSyllable(_)) => {
                self.update_composition();
                self.show_candidates();
                KeyResult::Handled
            }
            Ok(KeyOutcome::Commit) => {
                if !self.engine.is_empty() {
                    self.show_candidates();
                }
                KeyResult::Handled
            }
            Ok(KeyOutcome::Unmapped) => self.is_composing().into(),
        }
    }

    /// Keys while the candidate window is open. `None` hands the key on to
    /// the composition.
    fn on_candidate_key(&mut self, event: &KeyEvent) -> Option<KeyResult> {
        match *event {
            KeyEvent::Char(HOMOPHONE_KEY) => {
                self.show_homophones();
                Some(KeyResult::Handled)
            }
            KeyEvent::Char(c) => {
                if let Some(index) = self.select_key_index(c) {
                    if let Some(text) = self.candidates.select_on_page(index).map(str::to_owned) {
                        self.commit(&text, true);
                    }
                    return Some(KeyResult::Handled);
                }
                if self.engine.classifier().is_layout_key(c) {
                    // a new syllable starts; the highlighted candidate goes out first
                    if let Some(text) = self.candidates.selected().map(str::to_owned) {
                        self.commit(&text, true);
                    }
                }
                None
            }
            KeyEvent::Enter => {
                if let Some(text) = self.candidates.selected().map(str::to_owned) {
                    self.commit(&text, true);
                }
                Some(KeyResult::Handled)
            }
            KeyEvent::Up => Some(self.navigate(CandidateList::cursor_up)),
            KeyEvent::Down => Some(self.navigate(CandidateList::cursor_down)),
            KeyEvent::PageUp | KeyEvent::Left => Some(self.navigate(CandidateList::page_up)),
            KeyEvent::PageDown | KeyEvent::Right | KeyEvent::Space => {
                if !self.candidates.page_down() {
                    self.candidates.reset();
                }
                self.sync_candidates();
                Some(KeyResult::Handled)
            }
            KeyEvent::Escape => {
                self.hide_candidates();
                Some(KeyResult::Handled)
            }
            KeyEvent::Backspace => {
                self.hide_candidates();
                self.engine.backspace();
                self.update_composition();
                Some(KeyResult::Handled)
            }
            _ => Some(KeyResult::Handled),
        }
    }

    fn navigate(&mut self, step: fn(&mut CandidateList) -> bool) -> KeyResult {
        step(&mut self.candidates);
        self.sync_candidates();
        KeyResult::Handled
    }

    fn select_key_index(&self, key: char) -> Option<usize> {
        let config = self.watcher.current()?;
        config.page_select_keys().iter().position(|&k| k == key)
    }

    // Composition and candidates

    /// Main table content, waiting for an in-flight load if there is one.
    /// A failure is left in `ctx.status`.
    fn main_table(&mut self) -> Option<Arc<TableContent>> {
        let identity = self
            .watcher
            .current()
            .and_then(|c| c.identity(TableKind::Main, self.profile.cin_files).ok())
            .flatten();
        let Some(identity) = identity else {
            self.ctx.status = Some(TableError::NotSelected(TableKind::Main));
            return None;
        };

        match self.coordinator.wait_ready(&self.tables.main, &identity) {
            Ok(content) => {
                if matches!(&self.ctx.status, Some(err) if err.kind() == TableKind::Main) {
                    self.ctx.status = None;
                }
                Some(content)
            }
            Err(source) => {
                warn!(error = %source, "main table unavailable");
                self.ctx.status = Some(TableError::LoadFailed {
                    kind: TableKind::Main,
                    source,
                });
                None
            }
        }
    }

    /// Status of one table under the current configuration, without blocking
    /// or starting a load.
    pub fn table_status(&self, kind: TableKind) -> Result<Arc<TableContent>, TableError> {
        let config = self
            .watcher
            .current()
            .ok_or(TableError::NotSelected(kind))?;
        match config.identity(kind, self.profile.cin_files) {
            Ok(Some(identity)) => self.tables.get(kind).status(&identity),
            Ok(None) => Err(TableError::Disabled(kind)),
            Err(source) => Err(TableError::Misconfigured { kind, source }),
        }
    }

    /// Content of an optional table, without blocking. `None` when the table
    /// is disabled or not ready; a failed load or a bad selection is left in
    /// `ctx.status`.
    fn optional_table(&mut self, kind: TableKind) -> Option<Arc<TableContent>> {
        match self.table_status(kind) {
            Ok(content) => Some(content),
            Err(err @ (TableError::LoadFailed { .. } | TableError::Misconfigured { .. })) => {
                self.ctx.status = Some(err);
                None
            }
            Err(_) => None,
        }
    }

    fn update_composition(&mut self) {
        if self.engine.is_empty() {
            self.ctx.preedit_text.clear();
            self.ctx.preedit_cursor = 0;
            return;
        }

        match self.main_table() {
            Some(table) => {
                let rendered = self.engine.render(&table);
                self.ctx.preedit_text = rendered.display;
                self.ctx.preedit_cursor = rendered.cursor;
            }
            None => {
                // without a table, show the built-in symbols; nothing resolves
                self.ctx.preedit_text = self
                    .engine
                    .code()
                    .chars()
                    .map(|c| symbol_for_code(c).unwrap_or(c))
                    .collect();
                self.ctx.preedit_cursor = self.ctx.preedit_text.chars().count();
            }
        }
    }

    fn show_candidates(&mut self) {
        let Some(table) = self.main_table() else {
            return;
        };
        let rendered = self.engine.render(&table);
        if rendered.candidates.is_empty() {
            debug!(code = %rendered.code, "no candidates");
            self.ctx.auxiliary_text.clear();
            return;
        }
        self.candidates.set_candidates(rendered.candidates);
        self.sync_candidates();
    }

    fn show_homophones(&mut self) {
        if !self.config_flag(|c| c.homophone_query) {
            return;
        }
        let Some(source) = self.candidates.selected().map(str::to_owned) else {
            return;
        };
        let Some(table) = self.optional_table(TableKind::Homophone) else {
            return;
        };

        let homophones = table.homophones(&source);
        if homophones.is_empty() {
            return;
        }
        let mut list = Vec::with_capacity(homophones.len() + 1);
        list.push(source.clone());
        list.extend(homophones);
        self.candidates.set_candidates(list);
        self.sync_candidates();
        self.ctx.auxiliary_text = format!("同音字: {source}");
    }

    fn sync_candidates(&mut self) {
        self.ctx.candidates = self.candidates.current_page_candidates().to_vec();
        self.ctx.candidate_cursor = self.candidates.cursor();
        self.ctx.show_candidates = !self.ctx.candidates.is_empty();
    }

    fn hide_candidates(&mut self) {
        self.candidates.clear();
        self.ctx.candidates.clear();
        self.ctx.candidate_cursor = 0;
        self.ctx.show_candidates = false;
    }

    fn commit(&mut self, text: &str, from_candidates: bool) {
        debug!(text = %text, "commit");
        self.ctx.commit_text.push_str(text);
        self.engine.clear();
        self.hide_candidates();
        self.ctx.clear();
        self.ctx.auxiliary_text = if from_candidates {
            self.reverse_lookup(text).unwrap_or_default()
        } else {
            String::new()
        };
    }

    /// Codes of `text` in the reverse-lookup table, rendered through its key
    /// names.
    fn reverse_lookup(&mut self, text: &str) -> Option<String> {
        if !self.config_flag(|c| c.ime_reverse_lookup) {
            return None;
        }
        let table = self.optional_table(TableKind::Reverse)?;
        let codes = table.codes_for(text);
        if codes.is_empty() {
            return None;
        }
        let rendered: Vec<String> = codes.iter().map(|code| table.code_display(code)).collect();
        Some(format!("{text}: {}", rendered.join(" ")))
    }

    fn reset_composition(&mut self) {
        self.engine.clear();
        self.hide_candidates();
        self.ctx.clear();
        self.ctx.auxiliary_text.clear();
    }
}
