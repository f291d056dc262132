//! Session orchestration: polling, autosave, save and restore.
//!
//! A [`TrackerService`] owns everything about one tracked tree: the scanner,
//! the snapshot store, the last-known state, and the two background tasks.
//! Every mutation of the last-known state goes through it.
//!
//! # Lifecycle
//!
//! `Uninitialized → Initialized → Active → Terminated`. [`TrackerService::initialize`]
//! (or [`TrackerService::attach`] for one-shot use) establishes the baseline,
//! [`TrackerService::start`] spawns the poll and autosave tasks, and
//! [`TrackerService::shutdown`] stops them and removes the session marker.
//!
//! # Concurrency
//!
//! Save, autosave and restore are serialized by a commit lock, so concurrent
//! callers queue. Poll only reads the last-known state and never waits on a
//! commit in progress.

/// Interval-driven worker threads
pub mod scheduler;

use crate::config::{Config, validate_autosave_interval};
use crate::error::{Result, TrackerError};
use crate::marker::SessionMarker;
use crate::storage::{RestoreMode, SaveReport, SnapshotId, SnapshotStore, SnapshotSummary};
use crate::tracking::{ChangeSet, FileState, TreeScanner, changes};
use crossbeam_channel::{Receiver, Sender, unbounded};
use scheduler::PeriodicTask;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Comment given to the snapshot taken when a tree is first tracked.
pub const INITIAL_COMMENT: &str = "Initial state";

/// Lifecycle of a [`TrackerService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initialized,
    Active,
    Terminated,
}

impl SessionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Active => "active",
            Self::Terminated => "terminated",
        }
    }

    /// States in which the tree may be scanned, saved, or restored.
    const fn is_ready(self) -> bool {
        matches!(self, Self::Initialized | Self::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current autosave configuration of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveSettings {
    pub enabled: bool,
    pub interval_minutes: u64,
}

impl AutosaveSettings {
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }

    /// Timer period for the autosave task, `None` while disabled.
    #[must_use]
    pub const fn schedule(&self) -> Option<Duration> {
        if self.enabled {
            Some(self.interval())
        } else {
            None
        }
    }
}

impl Default for AutosaveSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: 15,
        }
    }
}

/// Snapshot of a session's state for presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerStatus {
    pub state: SessionState,
    pub autosave: AutosaveSettings,
    /// Files in the last-known state.
    pub tracked_files: usize,
}

/// Results produced by the background tasks.
#[derive(Debug)]
pub enum TrackerEvent {
    /// The poll task found a change set different from the last one reported.
    Changes(ChangeSet),
    /// The autosave task wrote a snapshot.
    Autosaved(SaveReport),
    /// The autosave task failed; the session keeps running.
    AutosaveFailed(TrackerError),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the service handle and its task threads.
struct TrackerCore {
    root: PathBuf,
    scanner: TreeScanner,
    store: SnapshotStore,
    state: RwLock<SessionState>,
    last_known: RwLock<FileState>,
    autosave: Mutex<AutosaveSettings>,
    /// Serializes save, autosave and restore
    commit: Mutex<()>,
}

impl TrackerCore {
    fn state(&self) -> SessionState {
        *read(&self.state)
    }

    fn require_ready(&self, operation: &'static str) -> Result<()> {
        let state = self.state();
        if state.is_ready() {
            Ok(())
        } else {
            Err(TrackerError::SessionState {
                state: state.as_str(),
                operation,
            })
        }
    }

    fn require_alive(&self, operation: &'static str) -> Result<()> {
        match self.state() {
            SessionState::Terminated => Err(TrackerError::SessionState {
                state: SessionState::Terminated.as_str(),
                operation,
            }),
            _ => Ok(()),
        }
    }

    fn poll(&self) -> Result<ChangeSet> {
        self.require_ready("poll")?;
        let current = self.scanner.scan(&self.root);
        let last_known = read(&self.last_known);
        Ok(changes::diff(&last_known, &current))
    }

    fn save_now(&self, comment: &str) -> Result<SaveReport> {
        self.require_ready("save")?;
        let _commit = lock(&self.commit);

        let current = self.scanner.scan(&self.root);
        let report = self.store.save(&self.root, &current, comment)?;
        *write(&self.last_known) = current;
        Ok(report)
    }

    fn restore_to(&self, id: &SnapshotId, mode: RestoreMode) -> Result<FileState> {
        self.require_ready("restore")?;
        let _commit = lock(&self.commit);

        match self.store.restore_with(id, &self.root, mode) {
            Ok(state) => {
                *write(&self.last_known) = state.clone();
                Ok(state)
            }
            Err(err) => {
                if let TrackerError::PartialRestore { restored, .. } = &err {
                    *write(&self.last_known) = restored.clone();
                }
                Err(err)
            }
        }
    }

    fn autosave_tick(&self) -> Result<Option<SaveReport>> {
        self.require_ready("autosave")?;
        if !lock(&self.autosave).enabled {
            return Ok(None);
        }
        let _commit = lock(&self.commit);

        let current = self.scanner.scan(&self.root);
        let pending = changes::diff(&read(&self.last_known), &current);
        if pending.is_empty() {
            debug!("Autosave skipped, no changes");
            return Ok(None);
        }

        let report = self
            .store
            .save_with(&self.root, &current, |id| format!("Autosave at {id}"))?;
        *write(&self.last_known) = current;
        info!(id = %report.id, changes = pending.len(), "Autosaved");
        Ok(Some(report))
    }
}

/// The poll and autosave threads of an active session.
struct Workers {
    poll: PeriodicTask,
    autosave: PeriodicTask,
}

/// One tracking session over one working tree.
pub struct TrackerService {
    core: Arc<TrackerCore>,
    marker_path: PathBuf,
    marker: Option<SessionMarker>,
    poll_interval: Duration,
    workers: Option<Workers>,
    events: (Sender<TrackerEvent>, Receiver<TrackerEvent>),
}

impl fmt::Debug for TrackerService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerService")
            .field("root", &self.core.root)
            .field("marker_path", &self.marker_path)
            .field("marker", &self.marker)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl TrackerService {
    /// Creates an uninitialized session for `root` configured by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Config`] if `config` holds invalid values.
    pub fn new(root: impl Into<PathBuf>, config: &Config) -> Result<Self> {
        config.validate()?;
        let root = root.into();
        let scanner = config.scanner();
        let store = SnapshotStore::new(config.store_dir(&root)).with_scanner(scanner.clone());

        let core = TrackerCore {
            root: root.clone(),
            scanner,
            store,
            state: RwLock::new(SessionState::Uninitialized),
            last_known: RwLock::new(FileState::new()),
            autosave: Mutex::new(AutosaveSettings {
                enabled: config.schedule.autosave_enabled,
                interval_minutes: config.schedule.autosave_interval_minutes,
            }),
            commit: Mutex::new(()),
        };

        Ok(Self {
            core: Arc::new(core),
            marker_path: config.marker_path(&root),
            marker: None,
            poll_interval: config.schedule.poll_interval(),
            workers: None,
            events: unbounded(),
        })
    }

    /// Overrides the poll period used by [`TrackerService::start`].
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Begins a long-lived session: takes the session marker, creates the
    /// store with an "Initial state" snapshot on first run, and sets the
    /// last-known state to a fresh scan.
    ///
    /// # Errors
    ///
    /// - [`TrackerError::SessionState`] unless the session is uninitialized
    /// - [`TrackerError::SessionBusy`] if another session holds the marker
    /// - [`TrackerError::Storage`] if the store or initial snapshot cannot be written
    pub fn initialize(&mut self) -> Result<()> {
        self.require_uninitialized("initialize")?;
        let marker = SessionMarker::acquire(&self.marker_path)?;

        let baseline = match self.create_store_if_missing()? {
            Some(initial) => initial,
            None => self.core.scanner.scan(&self.core.root),
        };

        *write(&self.core.last_known) = baseline;
        info!(
            root = %self.core.root.display(),
            marker = %marker.path().display(),
            "Session initialized"
        );
        self.marker = Some(marker);
        self.set_state(SessionState::Initialized);
        Ok(())
    }

    /// Begins a one-shot session without a marker, using the newest
    /// snapshot's state as the last-known state.
    ///
    /// The store and "Initial state" snapshot are created on first run.
    ///
    /// # Errors
    ///
    /// Same as [`TrackerService::initialize`], except `SessionBusy`.
    pub fn attach(&mut self) -> Result<()> {
        self.require_uninitialized("attach")?;

        let baseline = match self.create_store_if_missing()? {
            Some(initial) => initial,
            None => match self.core.store.latest()? {
                Some(newest) => self.core.store.load(&newest.id)?.files,
                None => self.core.scanner.scan(&self.core.root),
            },
        };

        *write(&self.core.last_known) = baseline;
        self.set_state(SessionState::Initialized);
        debug!(root = %self.core.root.display(), "Session attached");
        Ok(())
    }

    /// Like [`TrackerService::attach`], but holds the session marker until
    /// shutdown so no other session can save or restore on the tree meanwhile.
    ///
    /// # Errors
    ///
    /// Same as [`TrackerService::initialize`].
    pub fn attach_exclusive(&mut self) -> Result<()> {
        self.require_uninitialized("attach")?;
        let marker = SessionMarker::acquire(&self.marker_path)?;
        self.attach()?;
        self.marker = Some(marker);
        Ok(())
    }

    /// Spawns the poll and autosave tasks. Their results arrive on
    /// [`TrackerService::events`].
    ///
    /// # Errors
    ///
    /// - [`TrackerError::SessionState`] unless the session is initialized
    /// - [`TrackerError::TaskSpawn`] if a thread cannot be started
    pub fn start(&mut self) -> Result<()> {
        let state = self.core.state();
        if state != SessionState::Initialized {
            return Err(TrackerError::SessionState {
                state: state.as_str(),
                operation: "start",
            });
        }

        let poll = self.spawn_poll_task()?;
        let autosave = self.spawn_autosave_task()?;
        self.workers = Some(Workers { poll, autosave });
        self.set_state(SessionState::Active);
        info!(poll_interval = ?self.poll_interval, "Session active");
        Ok(())
    }

    /// Scans and compares against the last-known state. Never writes.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::SessionState`] unless initialized or active.
    pub fn poll(&self) -> Result<ChangeSet> {
        self.core.poll()
    }

    /// Scans and saves a snapshot; the last-known state is replaced only on success.
    ///
    /// # Errors
    ///
    /// - [`TrackerError::SessionState`] unless initialized or active
    /// - [`TrackerError::Storage`] / [`TrackerError::Metadata`] if the save fails
    pub fn save_now(&self, comment: &str) -> Result<SaveReport> {
        self.core.save_now(comment)
    }

    /// Restores snapshot `id` over the working tree and adopts its state.
    ///
    /// # Errors
    ///
    /// See [`SnapshotStore::restore_with`]. On `PartialRestore` the partially
    /// restored state has been adopted.
    pub fn restore_to(&self, id: &SnapshotId) -> Result<FileState> {
        self.core.restore_to(id, RestoreMode::Overlay)
    }

    /// Like [`TrackerService::restore_to`] with an explicit [`RestoreMode`].
    ///
    /// # Errors
    ///
    /// Same as [`TrackerService::restore_to`].
    pub fn restore_to_with(&self, id: &SnapshotId, mode: RestoreMode) -> Result<FileState> {
        self.core.restore_to(id, mode)
    }

    /// Updates autosave settings and reschedules the running task.
    ///
    /// Nothing changes if `interval_minutes` is outside 1..=60.
    ///
    /// # Errors
    ///
    /// - [`TrackerError::Config`] for an out-of-range interval
    /// - [`TrackerError::SessionState`] once terminated
    pub fn set_autosave(&self, enabled: bool, interval_minutes: u64) -> Result<()> {
        self.core.require_alive("configure autosave")?;
        validate_autosave_interval(interval_minutes)?;

        let settings = AutosaveSettings {
            enabled,
            interval_minutes,
        };
        *lock(&self.core.autosave) = settings;
        if let Some(workers) = &self.workers {
            workers.autosave.reschedule(settings.schedule());
        }
        info!(enabled, interval_minutes, "Autosave settings updated");
        Ok(())
    }

    /// Saves a snapshot if autosave is enabled and the tree changed.
    ///
    /// The comment is `Autosave at <id>`.
    ///
    /// # Errors
    ///
    /// Same as [`TrackerService::save_now`].
    pub fn autosave_tick(&self) -> Result<Option<SaveReport>> {
        self.core.autosave_tick()
    }

    /// Every readable snapshot, oldest first.
    ///
    /// # Errors
    ///
    /// - [`TrackerError::SessionState`] once terminated
    /// - [`TrackerError::Storage`] if the store cannot be read
    pub fn list(&self) -> Result<Vec<SnapshotSummary>> {
        self.core.require_alive("list")?;
        self.core.store.list()
    }

    #[must_use]
    pub fn status(&self) -> TrackerStatus {
        TrackerStatus {
            state: self.core.state(),
            autosave: *lock(&self.core.autosave),
            tracked_files: read(&self.core.last_known).len(),
        }
    }

    /// Receiver for background task results. All clones share one queue.
    #[must_use]
    pub fn events(&self) -> Receiver<TrackerEvent> {
        self.events.1.clone()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.core.state()
    }

    #[must_use]
    pub fn last_known(&self) -> FileState {
        read(&self.core.last_known).clone()
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.core.root
    }

    #[must_use]
    pub fn store(&self) -> &SnapshotStore {
        &self.core.store
    }

    /// Stops both tasks, removes the session marker, and terminates.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::SessionState`] if already terminated.
    pub fn shutdown(&mut self) -> Result<()> {
        self.core.require_alive("shut down")?;
        self.terminate();
        info!(root = %self.core.root.display(), "Session terminated");
        Ok(())
    }

    fn terminate(&mut self) {
        // Set first so a tick already in flight sees the session as gone.
        self.set_state(SessionState::Terminated);
        if let Some(workers) = self.workers.take() {
            workers.poll.stop();
            workers.autosave.stop();
        }
        if let Some(marker) = self.marker.take()
            && let Err(e) = marker.release()
        {
            warn!(error = %e, "Could not remove session marker");
        }
    }

    fn set_state(&self, state: SessionState) {
        *write(&self.core.state) = state;
    }

    fn require_uninitialized(&self, operation: &'static str) -> Result<()> {
        let state = self.core.state();
        if state == SessionState::Uninitialized {
            Ok(())
        } else {
            Err(TrackerError::SessionState {
                state: state.as_str(),
                operation,
            })
        }
    }

    /// Creates the store and takes the initial snapshot if the store is absent.
    ///
    /// Returns the initial state when a snapshot was taken.
    fn create_store_if_missing(&self) -> Result<Option<FileState>> {
        if self.core.store.exists() {
            return Ok(None);
        }
        self.core.store.create()?;
        let initial = self.core.scanner.scan(&self.core.root);
        let report = self.core.store.save(&self.core.root, &initial, INITIAL_COMMENT)?;
        info!(id = %report.id, files = initial.len(), "Created initial snapshot");
        Ok(Some(initial))
    }

    fn spawn_poll_task(&self) -> Result<PeriodicTask> {
        let core = Arc::clone(&self.core);
        let sender = self.events.0.clone();
        let mut last_reported = ChangeSet::default();

        PeriodicTask::spawn("snaptrack-poll", Some(self.poll_interval), move || {
            match core.poll() {
                Ok(changes) if changes != last_reported => {
                    last_reported = changes.clone();
                    let _ = sender.send(TrackerEvent::Changes(changes));
                }
                Ok(_) => {}
                Err(e) => debug!(error = %e, "Poll skipped"),
            }
        })
        .map_err(|source| TrackerError::TaskSpawn {
            task: "poll",
            source,
        })
    }

    fn spawn_autosave_task(&self) -> Result<PeriodicTask> {
        let core = Arc::clone(&self.core);
        let sender = self.events.0.clone();
        let schedule = lock(&self.core.autosave).schedule();

        PeriodicTask::spawn("snaptrack-autosave", schedule, move || {
            match core.autosave_tick() {
                Ok(Some(report)) => {
                    let _ = sender.send(TrackerEvent::Autosaved(report));
                }
                Ok(None) => {}
                Err(e @ TrackerError::SessionState { .. }) => debug!(error = %e, "Autosave skipped"),
                Err(e) => {
                    warn!(error = %e, "Autosave failed");
                    let _ = sender.send(TrackerEvent::AutosaveFailed(e));
                }
            }
        })
        .map_err(|source| TrackerError::TaskSpawn {
            task: "autosave",
            source,
        })
    }
}

impl Drop for TrackerService {
    fn drop(&mut self) {
        if self.core.state() != SessionState::Terminated {
            self.terminate();
        }
    }
}
