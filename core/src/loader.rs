//! Table entries and the coordinator that loads them in the background.
//!
//! Every `TableEntry` walks the same state machine:
//!
//! ```text
//! Idle --(identity mismatch)--> Loading --(load completes)--> Ready
//!   ^                              |                            |
//!   +-------(load fails)-----------+    <--(identity mismatch)--+
//! ```
//!
//! The claim on `Loading` is a check-and-set under the entry mutex, so two
//! callers racing on the same entry agree on a single loader. Content is
//! published under the same mutex and waiters park on a condition variable
//! until the loader signals completion.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::error::{LoadError, TableError};
use crate::table::{IdentityMatch, TableContent, TableIdentity, TableKind};

/// Source of table content. Implementations may block; they are always
/// invoked on a loader thread.
pub trait TableLoader: Send + Sync + 'static {
    fn load_table(&self, identity: &TableIdentity) -> Result<TableContent, LoadError>;
}

impl<T: TableLoader + ?Sized> TableLoader for Arc<T> {
    fn load_table(&self, identity: &TableIdentity) -> Result<TableContent, LoadError> {
        (**self).load_table(identity)
    }
}

/// Load state of a single table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
}

#[derive(Debug)]
struct Slot {
    state: LoadState,
    /// Identity of the published content.
    identity: Option<TableIdentity>,
    /// Identity currently being loaded.
    pending: Option<TableIdentity>,
    content: Option<Arc<TableContent>>,
    /// Last failure, with the identity it was for.
    error: Option<(TableIdentity, LoadError)>,
    /// Incremented every time a load settles.
    generation: u64,
}

/// Outcome of the check-and-set performed by `TableEntry::begin`.
enum Begin {
    Ready(Arc<TableContent>),
    Claimed(u64),
    InFlight(TableIdentity),
}

/// One loadable table plus its load state.
#[derive(Debug)]
pub struct TableEntry {
    kind: TableKind,
    slot: Mutex<Slot>,
    settled: Condvar,
    loads_started: AtomicUsize,
}

impl TableEntry {
    pub fn new(kind: TableKind) -> Self {
        Self {
            kind,
            slot: Mutex::new(Slot {
                state: LoadState::Idle,
                identity: None,
                pending: None,
                content: None,
                error: None,
                generation: 0,
            }),
            settled: Condvar::new(),
            loads_started: AtomicUsize::new(0),
        }
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn state(&self) -> LoadState {
        self.slot.lock().state
    }

    /// Identity of the content currently published, if any.
    pub fn identity(&self) -> Option<TableIdentity> {
        self.slot.lock().identity.clone()
    }

    pub fn compare(&self, desired: &TableIdentity) -> IdentityMatch {
        IdentityMatch::compare(self.slot.lock().identity.as_ref(), desired)
    }

    /// Content, only while the entry is `Ready`.
    pub fn content(&self) -> Option<Arc<TableContent>> {
        let slot = self.slot.lock();
        match slot.state {
            LoadState::Ready => slot.content.clone(),
            _ => None,
        }
    }

    /// Content, only while `Ready` for exactly `desired`.
    pub fn ready_content(&self, desired: &TableIdentity) -> Option<Arc<TableContent>> {
        let slot = self.slot.lock();
        match (&slot.state, &slot.identity) {
            (LoadState::Ready, Some(id)) if id == desired => slot.content.clone(),
            _ => None,
        }
    }

    /// Failure recorded for `identity` by the most recent load of it.
    pub fn error_for(&self, identity: &TableIdentity) -> Option<LoadError> {
        match &self.slot.lock().error {
            Some((id, err)) if id == identity => Some(err.clone()),
            _ => None,
        }
    }

    /// Number of loads this entry has started over its lifetime.
    pub fn loads_started(&self) -> usize {
        self.loads_started.load(Ordering::Acquire)
    }

    /// Service-level status for `desired`, without blocking or loading.
    pub fn status(&self, desired: &TableIdentity) -> Result<Arc<TableContent>, TableError> {
        if let Some(content) = self.ready_content(desired) {
            return Ok(content);
        }
        match self.error_for(desired) {
            Some(source) => Err(TableError::LoadFailed {
                kind: self.kind,
                source,
            }),
            None => Err(TableError::NotSelected(self.kind)),
        }
    }

    fn begin(&self, desired: &TableIdentity) -> Begin {
        let mut slot = self.slot.lock();
        if slot.state == LoadState::Loading {
            let pending = slot.pending.clone().unwrap_or_else(|| desired.clone());
            return Begin::InFlight(pending);
        }
        if slot.state == LoadState::Ready && slot.identity.as_ref() == Some(desired) {
            if let Some(content) = slot.content.clone() {
                return Begin::Ready(content);
            }
        }
        self.claim(&mut slot, desired)
    }

    fn claim(&self, slot: &mut Slot, desired: &TableIdentity) -> Begin {
        slot.state = LoadState::Loading;
        slot.pending = Some(desired.clone());
        slot.content = None;
        self.loads_started.fetch_add(1, Ordering::AcqRel);
        Begin::Claimed(slot.generation)
    }

    fn finish(&self, identity: TableIdentity, result: Result<TableContent, LoadError>) {
        let mut slot = self.slot.lock();
        slot.pending = None;
        slot.generation += 1;
        match result {
            Ok(content) => {
                slot.state = LoadState::Ready;
                slot.identity = Some(identity);
                slot.content = Some(Arc::new(content));
                slot.error = None;
            }
            Err(err) => {
                slot.state = LoadState::Idle;
                slot.identity = None;
                slot.content = None;
                slot.error = Some((identity, err));
            }
        }
        drop(slot);
        self.settled.notify_all();
    }

    /// Block until no load is in flight.
    pub fn wait_settled(&self) {
        let mut slot = self.slot.lock();
        while slot.state == LoadState::Loading {
            self.settled.wait(&mut slot);
        }
    }

    fn wait_generation(
        &self,
        after: u64,
        identity: &TableIdentity,
    ) -> Result<Arc<TableContent>, LoadError> {
        let mut slot = self.slot.lock();
        while slot.generation <= after {
            self.settled.wait(&mut slot);
        }
        match (&slot.state, &slot.identity, &slot.content) {
            (LoadState::Ready, Some(id), Some(content)) if id == identity => Ok(content.clone()),
            _ => match &slot.error {
                Some((id, err)) if id == identity => Err(err.clone()),
                _ => Err(LoadError::Superseded),
            },
        }
    }
}

/// Handle on a load started by `TableLoadCoordinator::ensure_loaded`.
#[derive(Debug)]
pub struct LoadHandle {
    entry: Arc<TableEntry>,
    identity: TableIdentity,
    generation: u64,
    thread: Option<JoinHandle<()>>,
}

impl LoadHandle {
    pub fn identity(&self) -> &TableIdentity {
        &self.identity
    }

    /// Block until this load settles and return its content.
    pub fn wait(mut self) -> Result<Arc<TableContent>, LoadError> {
        let result = self.entry.wait_generation(self.generation, &self.identity);
        if let Some(thread) = self.thread.take() {
            // the loader has already published; this only reaps the thread
            let _ = thread.join();
        }
        result
    }
}

/// What `ensure_loaded` did.
#[derive(Debug)]
pub enum EnsureOutcome {
    /// The entry already held the desired identity; nothing was started.
    Ready(Arc<TableContent>),
    /// A background load was started for the desired identity.
    Started(LoadHandle),
}

/// Runs table loads on background threads and guards entries against
/// duplicate loads.
#[derive(Clone)]
pub struct TableLoadCoordinator {
    loader: Arc<dyn TableLoader>,
}

impl std::fmt::Debug for TableLoadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableLoadCoordinator").finish_non_exhaustive()
    }
}

impl TableLoadCoordinator {
    pub fn new<L: TableLoader>(loader: L) -> Self {
        Self {
            loader: Arc::new(loader),
        }
    }

    /// Make sure `entry` holds `desired`.
    ///
    /// Returns immediately when the entry is already `Ready` for `desired`.
    /// Otherwise claims the entry and starts a background load, unless a load
    /// is already in flight, in which case this waits for it to settle and
    /// re-evaluates. Fails only when an awaited load of `desired` itself
    /// failed or the loader thread could not be spawned.
    pub fn ensure_loaded(
        &self,
        entry: &Arc<TableEntry>,
        desired: &TableIdentity,
    ) -> Result<EnsureOutcome, LoadError> {
        loop {
            match entry.begin(desired) {
                Begin::Ready(content) => return Ok(EnsureOutcome::Ready(content)),
                Begin::Claimed(generation) => {
                    return self
                        .spawn(entry.clone(), desired.clone(), generation)
                        .map(EnsureOutcome::Started)
                }
                Begin::InFlight(pending) => {
                    debug!(kind = %entry.kind(), pending = %pending, "waiting for in-flight load");
                    entry.wait_settled();
                    if pending == *desired {
                        if let Some(err) = entry.error_for(desired) {
                            return Err(err);
                        }
                    }
                }
            }
        }
    }

    /// Block until `entry` is `Ready` for `desired`, loading it if needed.
    ///
    /// A previous failure for `desired` is returned as is instead of
    /// triggering another load; a new selection (or `ensure_loaded`) retries.
    pub fn wait_ready(
        &self,
        entry: &Arc<TableEntry>,
        desired: &TableIdentity,
    ) -> Result<Arc<TableContent>, LoadError> {
        loop {
            if let Some(content) = entry.ready_content(desired) {
                return Ok(content);
            }
            if entry.state() == LoadState::Loading {
                entry.wait_settled();
                continue;
            }
            if let Some(err) = entry.error_for(desired) {
                return Err(err);
            }
            return match self.ensure_loaded(entry, desired)? {
                EnsureOutcome::Ready(content) => Ok(content),
                EnsureOutcome::Started(handle) => handle.wait(),
            };
        }
    }

    fn spawn(
        &self,
        entry: Arc<TableEntry>,
        identity: TableIdentity,
        generation: u64,
    ) -> Result<LoadHandle, LoadError> {
        let loader = self.loader.clone();
        let worker_entry = entry.clone();
        let worker_identity = identity.clone();

        info!(kind = %entry.kind(), identity = %identity, "loading table");
        let spawned = std::thread::Builder::new()
            .name(format!("cin-load-{}", entry.kind()))
            .spawn(move || {
                let started = Instant::now();
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    loader.load_table(&worker_identity)
                }))
                .unwrap_or_else(|_| Err(LoadError::Aborted("loader panicked".to_string())));

                match &result {
                    Ok(content) => info!(
                        kind = %worker_entry.kind(),
                        codes = content.code_count(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "table ready"
                    ),
                    Err(err) => {
                        warn!(kind = %worker_entry.kind(), error = %err, "table load failed")
                    }
                }
                worker_entry.finish(worker_identity, result);
            });

        match spawned {
            Ok(thread) => Ok(LoadHandle {
                entry,
                identity,
                generation,
                thread: Some(thread),
            }),
            Err(err) => {
                let err = LoadError::Aborted(format!("cannot spawn loader thread: {err}"));
                entry.finish(identity, Err(err.clone()));
                Err(err)
            }
        }
    }
}

/// The three tables of a session, owned explicitly rather than as globals.
#[derive(Debug, Clone)]
pub struct TableSet {
    pub main: Arc<TableEntry>,
    pub reverse: Arc<TableEntry>,
    pub homophone: Arc<TableEntry>,
}

impl TableSet {
    pub fn new() -> Self {
        Self {
            main: Arc::new(TableEntry::new(TableKind::Main)),
            reverse: Arc::new(TableEntry::new(TableKind::Reverse)),
            homophone: Arc::new(TableEntry::new(TableKind::Homophone)),
        }
    }

    pub fn get(&self, kind: TableKind) -> &Arc<TableEntry> {
        match kind {
            TableKind::Main => &self.main,
            TableKind::Reverse => &self.reverse,
            TableKind::Homophone => &self.homophone,
        }
    }
}

impl Default for TableSet {
    fn default() -> Self {
        Self::new()
    }
}
