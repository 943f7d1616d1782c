//! The offline sync queue
//!
//! [`OfflineSyncQueue`] journals write intents that could not reach the
//! document store and replays them, in enqueue order, once connectivity is
//! available.
//!
//! ## State
//!
//! - The in-memory queue is a flat FIFO list mirrored to the journal under a
//!   single key. Every mutation writes the new list to the journal first and
//!   only then replaces the in-memory copy; a gate serializes mutations so the
//!   two never interleave.
//! - Replay passes are serialized. Background triggers (registration,
//!   connectivity coming back, leaving manual offline mode) coalesce: at most
//!   one pass waits behind the one in flight.
//!
//! ## Observing
//!
//! Status snapshots are published whenever connectivity, manual mode,
//! persistence health, or the pending count change. Every completed pass
//! publishes a [`SyncSummary`].

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use canteen_core::{
    CanteenError, CanteenResult, Clock, ConnectivityEvent, ConnectivityMonitor, ConnectivityState,
    DocumentStore, JournalError, LocalJournal, NewOperation, OperationId, PendingOperation,
    PermanentFailure, SyncStatus, SyncSummary, SystemClock,
};
use canteen_logging::OriginContextGuard;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::SyncQueueConfig;
use crate::observer::{ObserverId, Subject};
use crate::replay;

/// Builder for [`OfflineSyncQueue`]
pub struct SyncQueueBuilder {
    store: Arc<dyn DocumentStore>,
    journal: Arc<dyn LocalJournal>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    clock: Arc<dyn Clock>,
    config: SyncQueueConfig,
}

impl SyncQueueBuilder {
    pub fn with_config(mut self, config: SyncQueueConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom clock (e.g. `MockClock` in tests)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> OfflineSyncQueue {
        let capacity = self.config.status_channel_capacity;
        let initial_status = SyncStatus {
            is_online: self.connectivity.is_online(),
            manual_offline_mode: false,
            persistence_enabled: true,
            pending_count: 0,
        };
        let (status_tx, _) = watch::channel(initial_status);

        OfflineSyncQueue {
            inner: Arc::new(Inner {
                config: self.config,
                store: self.store,
                journal: self.journal,
                connectivity: self.connectivity,
                clock: self.clock,
                queue: RwLock::new(Vec::new()),
                write_gate: tokio::sync::Mutex::new(()),
                sync_lock: tokio::sync::Mutex::new(()),
                sync_scheduled: AtomicBool::new(false),
                init_lock: tokio::sync::Mutex::new(()),
                initialized: AtomicBool::new(false),
                manual_offline: AtomicBool::new(false),
                persistence_enabled: AtomicBool::new(true),
                journal_loaded: AtomicBool::new(false),
                status_tx,
                status_subject: Subject::new(capacity),
                sync_subject: Subject::new(capacity),
                listener: Mutex::new(None),
            }),
        }
    }
}

/// Journaled queue of pending writes with replay
///
/// Cheap to clone; clones share the same queue.
#[derive(Clone)]
pub struct OfflineSyncQueue {
    inner: Arc<Inner>,
}

struct Inner {
    config: SyncQueueConfig,
    store: Arc<dyn DocumentStore>,
    journal: Arc<dyn LocalJournal>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    clock: Arc<dyn Clock>,

    /// In-memory mirror of the journal, oldest first
    queue: RwLock<Vec<PendingOperation>>,
    /// Held while a new list is written to the journal and swapped in
    write_gate: tokio::sync::Mutex<()>,
    /// Held for the duration of a replay pass
    sync_lock: tokio::sync::Mutex<()>,
    /// A background pass is waiting to run
    sync_scheduled: AtomicBool,

    init_lock: tokio::sync::Mutex<()>,
    initialized: AtomicBool,

    manual_offline: AtomicBool,
    persistence_enabled: AtomicBool,
    /// The stored queue has been read; until then it must not be overwritten
    journal_loaded: AtomicBool,

    status_tx: watch::Sender<SyncStatus>,
    status_subject: Subject<SyncStatus>,
    sync_subject: Subject<SyncSummary>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl OfflineSyncQueue {
    /// Create a queue with the default configuration and system clock
    pub fn new(
        store: Arc<dyn DocumentStore>,
        journal: Arc<dyn LocalJournal>,
        connectivity: Arc<dyn ConnectivityMonitor>,
    ) -> Self {
        Self::builder(store, journal, connectivity).build()
    }

    pub fn builder(
        store: Arc<dyn DocumentStore>,
        journal: Arc<dyn LocalJournal>,
        connectivity: Arc<dyn ConnectivityMonitor>,
    ) -> SyncQueueBuilder {
        SyncQueueBuilder {
            store,
            journal,
            connectivity,
            clock: Arc::new(SystemClock),
            config: SyncQueueConfig::default(),
        }
    }

    pub fn config(&self) -> &SyncQueueConfig {
        &self.inner.config
    }

    /// The store writes are replayed against
    pub fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.inner.store)
    }

    /// Load the journal and start following connectivity
    ///
    /// Does not contact the document store. Calling again after a successful
    /// call is a no-op. An unreadable journal disables persistence and starts
    /// from an empty queue; the stored value is not written again until a
    /// later read succeeds and its operations are merged back in. A journal
    /// that cannot be parsed is an error and is left untouched.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> CanteenResult<()> {
        let inner = &self.inner;
        let _init = inner.init_lock.lock().await;
        if inner.initialized.load(Ordering::SeqCst) {
            trace!("Already initialized");
            return Ok(());
        }

        let loaded = inner.load_journal().await?;
        {
            let _gate = inner.write_gate.lock().await;
            *inner.queue.write() = loaded;
        }

        let events = inner.connectivity.subscribe();
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(listen_for_connectivity(weak, events));
        *inner.listener.lock() = Some(handle);

        inner.initialized.store(true, Ordering::SeqCst);
        inner.refresh_status();
        info!(
            pending = inner.pending_count(),
            durable = inner.journal.is_durable(),
            persistence_enabled = inner.persistence_enabled.load(Ordering::SeqCst),
            "Offline queue initialized"
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    /// Force offline behavior regardless of the real signal
    pub fn go_offline(&self) {
        if !self.inner.manual_offline.swap(true, Ordering::SeqCst) {
            info!("Manual offline mode enabled");
        }
        self.inner.refresh_status();
    }

    /// Leave manual offline mode, syncing if the real signal is online
    ///
    /// The sync runs in the background on the current tokio runtime.
    pub fn go_online(&self) {
        if self.inner.manual_offline.swap(false, Ordering::SeqCst) {
            info!("Manual offline mode disabled");
        }
        self.inner.refresh_status();
        if self.inner.connectivity.is_online() {
            self.inner.schedule_sync();
        }
    }

    /// `true` iff the real signal is offline or manual offline mode is on
    pub fn is_offline(&self) -> bool {
        self.inner.is_offline()
    }

    pub fn connectivity(&self) -> ConnectivityState {
        ConnectivityState {
            is_online: self.inner.connectivity.is_online(),
            manual_offline_mode: self.inner.manual_offline.load(Ordering::SeqCst),
        }
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.status()
    }

    /// Validate, journal, and enqueue a write intent
    ///
    /// The origin defaults to the active [`OriginContextGuard`]. When online,
    /// a background sync is started and not awaited. A journal write failure
    /// keeps the operation in memory and disables persistence in the status.
    #[instrument(
        skip(self, op),
        fields(kind = %op.kind, collection = %op.collection, document_id = %op.document_id)
    )]
    pub async fn register_pending_operation(&self, mut op: NewOperation) -> CanteenResult<OperationId> {
        if op.origin_id.is_none() {
            op.origin_id = OriginContextGuard::current_origin_id();
        }
        let pending = PendingOperation::from_new(op, self.inner.clock.now())?;
        self.initialize().await?;

        let id = pending.id.clone();
        let persisted = self.inner.mutate(|queue| queue.push(pending)).await;
        debug!(id = %id, persisted, "Pending operation registered");
        self.inner.refresh_status();

        if self.inner.config.auto_sync_on_register && !self.inner.is_offline() {
            self.inner.schedule_sync();
        }
        Ok(id)
    }

    /// Replay the pending queue against the document store
    ///
    /// Waits for any pass in flight, then processes a snapshot of the queue.
    /// Individual failures are recorded in the summary, never returned.
    pub async fn sync_pending_operations(&self) -> SyncSummary {
        let _running = self.inner.sync_lock.lock().await;
        self.inner.run_sync_pass().await
    }

    pub fn pending_operations_count(&self) -> usize {
        self.inner.pending_count()
    }

    /// Copy of the queue, oldest first
    pub fn pending_operations(&self) -> Vec<PendingOperation> {
        self.inner.queue.read().clone()
    }

    /// Register a status callback; it is invoked immediately with the current status
    pub fn on_status_change<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        let registered = Arc::clone(&callback);
        let id = self
            .inner
            .status_subject
            .subscribe(move |status: &SyncStatus| registered(status));
        callback(&self.inner.status());
        id
    }

    /// Register a callback invoked once per completed sync pass
    pub fn on_sync_complete<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&SyncSummary) + Send + Sync + 'static,
    {
        self.inner.sync_subject.subscribe(callback)
    }

    pub fn remove_status_observer(&self, id: ObserverId) -> bool {
        self.inner.status_subject.unsubscribe(id)
    }

    pub fn remove_sync_observer(&self, id: ObserverId) -> bool {
        self.inner.sync_subject.unsubscribe(id)
    }

    /// Latest status, updated on every change
    pub fn status_updates(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Summaries of every subsequent sync pass
    pub fn sync_summaries(&self) -> broadcast::Receiver<SyncSummary> {
        self.inner.sync_subject.receiver()
    }
}

impl Inner {
    fn is_offline(&self) -> bool {
        !self.connectivity.is_online() || self.manual_offline.load(Ordering::SeqCst)
    }

    fn pending_count(&self) -> usize {
        self.queue.read().len()
    }

    fn status(&self) -> SyncStatus {
        SyncStatus {
            is_online: self.connectivity.is_online(),
            manual_offline_mode: self.manual_offline.load(Ordering::SeqCst),
            persistence_enabled: self.persistence_enabled.load(Ordering::SeqCst),
            pending_count: self.pending_count(),
        }
    }

    /// Publish the current status if it differs from the last one
    ///
    /// The status is read under the watch lock; observers receive the value
    /// the watch holds.
    fn refresh_status(&self) {
        let changed = self.status_tx.send_if_modified(|current| {
            let status = self.status();
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
        if changed {
            let status = self.status_tx.borrow().clone();
            trace!(?status, "Status changed");
            self.status_subject.notify(&status);
        }
    }

    async fn load_journal(&self) -> CanteenResult<Vec<PendingOperation>> {
        let raw = match self.journal.get(&self.config.journal_key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Journal unreadable; continuing without persistence");
                self.journal_loaded.store(false, Ordering::SeqCst);
                self.persistence_enabled.store(false, Ordering::SeqCst);
                return Ok(Vec::new());
            }
        };

        let ops = match raw {
            Some(raw) => serde_json::from_str::<Vec<PendingOperation>>(&raw)
                .map_err(|e| CanteenError::Journal(JournalError::from(e)))?,
            None => Vec::new(),
        };
        self.journal_loaded.store(true, Ordering::SeqCst);
        self.persistence_enabled.store(true, Ordering::SeqCst);
        debug!(count = ops.len(), "Loaded pending operations from journal");
        Ok(ops)
    }

    /// Retry a journal read that failed during initialization
    ///
    /// Stored operations not already in memory are placed ahead of the
    /// in-memory queue. The caller holds `write_gate`.
    async fn recover_journal(&self) {
        let raw = match self.journal.get(&self.config.journal_key).await {
            Ok(raw) => raw,
            Err(e) => {
                debug!(error = %e, "Journal still unreadable");
                return;
            }
        };
        let stored = match raw {
            Some(raw) => match serde_json::from_str::<Vec<PendingOperation>>(&raw) {
                Ok(ops) => ops,
                Err(e) => {
                    warn!(error = %e, "Journal unparseable; leaving it untouched");
                    return;
                }
            },
            None => Vec::new(),
        };

        let mut queue = self.queue.write();
        let known: HashSet<OperationId> = queue.iter().map(|op| op.id.clone()).collect();
        let mut merged: Vec<PendingOperation> = stored
            .into_iter()
            .filter(|op| !known.contains(&op.id))
            .collect();
        info!(recovered = merged.len(), "Journal readable again");
        merged.append(&mut *queue);
        *queue = merged;
        self.journal_loaded.store(true, Ordering::SeqCst);
    }

    /// Write `queue` to the journal; records persistence health
    async fn persist(&self, queue: &[PendingOperation]) -> bool {
        let result = match serde_json::to_string(queue) {
            Ok(json) => self.journal.set(&self.config.journal_key, &json).await,
            Err(e) => Err(JournalError::from(e)),
        };
        match result {
            Ok(()) => {
                self.persistence_enabled.store(true, Ordering::SeqCst);
                true
            }
            Err(e) => {
                warn!(error = %e, pending = queue.len(), "Failed to persist pending operations");
                self.persistence_enabled.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    /// Apply `change` to a copy of the queue, journal it, then swap it in
    async fn mutate<F>(&self, change: F) -> bool
    where
        F: FnOnce(&mut Vec<PendingOperation>),
    {
        let _gate = self.write_gate.lock().await;
        if !self.journal_loaded.load(Ordering::SeqCst) {
            self.recover_journal().await;
        }
        let mut next = self.queue.read().clone();
        change(&mut next);
        let persisted = if self.journal_loaded.load(Ordering::SeqCst) {
            self.persist(&next).await
        } else {
            warn!(pending = next.len(), "Journal not loaded; keeping changes in memory only");
            self.persistence_enabled.store(false, Ordering::SeqCst);
            false
        };
        *self.queue.write() = next;
        persisted
    }

    /// Start a background pass unless one is already waiting
    fn schedule_sync(self: &Arc<Self>) {
        if self.sync_scheduled.swap(true, Ordering::SeqCst) {
            trace!("Sync already scheduled");
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!("No tokio runtime; background sync skipped");
            self.sync_scheduled.store(false, Ordering::SeqCst);
            return;
        };
        let inner = Arc::clone(self);
        runtime.spawn(async move {
            let _running = inner.sync_lock.lock().await;
            inner.sync_scheduled.store(false, Ordering::SeqCst);
            inner.run_sync_pass().await;
        });
    }

    /// One replay pass; the caller holds `sync_lock`
    #[instrument(skip(self))]
    async fn run_sync_pass(&self) -> SyncSummary {
        let snapshot = self.queue.read().clone();
        if self.is_offline() || snapshot.is_empty() {
            trace!(offline = self.is_offline(), pending = snapshot.len(), "Nothing to sync");
            let summary = SyncSummary::idle(snapshot.len());
            self.sync_subject.notify(&summary);
            return summary;
        }

        info!(pending = snapshot.len(), "Replaying pending operations");
        let started = self.clock.now();
        let backoff = self.config.backoff;
        let mut summary = SyncSummary::default();
        let mut finished: HashSet<OperationId> = HashSet::new();
        let mut retried: HashMap<OperationId, PendingOperation> = HashMap::new();

        for mut op in snapshot {
            if !backoff.is_due(&op, started) {
                trace!(id = %op.id, "Held back by backoff");
                summary.skipped += 1;
                continue;
            }

            op.record_attempt(self.clock.now());
            summary.total += 1;

            match replay::replay(self.store.as_ref(), &op).await {
                Ok(()) => {
                    debug!(id = %op.id, target = %op.target(), kind = %op.kind, "Replayed");
                    summary.successful += 1;
                    finished.insert(op.id.clone());
                }
                Err(source) => {
                    let last_error = source.to_string();
                    let err = replay::classify(&op, source, self.config.max_attempts);
                    if err.is_permanent() {
                        warn!(id = %op.id, target = %op.target(), error = %err, "Dropping operation");
                        finished.insert(op.id.clone());
                        summary
                            .permanently_failed
                            .push(PermanentFailure { operation: op, last_error });
                    } else {
                        debug!(id = %op.id, target = %op.target(), error = %err, "Replay failed; will retry");
                        retried.insert(op.id.clone(), op);
                    }
                }
            }
        }

        summary.journal_persisted = self
            .mutate(|queue| {
                queue.retain(|op| !finished.contains(&op.id));
                for op in queue.iter_mut() {
                    if let Some(updated) = retried.remove(&op.id) {
                        *op = updated;
                    }
                }
            })
            .await;
        summary.pending = self.pending_count();

        info!(
            total = summary.total,
            successful = summary.successful,
            failed = summary.permanently_failed.len(),
            skipped = summary.skipped,
            pending = summary.pending,
            "Sync pass complete"
        );
        self.refresh_status();
        self.sync_subject.notify(&summary);
        summary
    }

    fn on_connectivity(self: &Arc<Self>, event: ConnectivityEvent) {
        debug!(?event, "Connectivity changed");
        self.refresh_status();
        if event == ConnectivityEvent::Online && !self.manual_offline.load(Ordering::SeqCst) {
            self.schedule_sync();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
        }
    }
}

/// Follow connectivity transitions until the queue is dropped
async fn listen_for_connectivity(
    inner: Weak<Inner>,
    mut events: broadcast::Receiver<ConnectivityEvent>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "Connectivity events lagged");
                let Some(queue) = inner.upgrade() else { break };
                if queue.connectivity.is_online() {
                    ConnectivityEvent::Online
                } else {
                    ConnectivityEvent::Offline
                }
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let Some(inner) = inner.upgrade() else { break };
        inner.on_connectivity(event);
    }
    trace!("Connectivity listener stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use canteen_core::{ManualConnectivity, Payload, StoreError};
    use canteen_storage::{InMemoryDocumentStore, InMemoryJournal};
    use serde_json::json;

    const DEFAULT_KEY: &str = crate::config::DEFAULT_JOURNAL_KEY;

    fn queue_with(online: bool) -> (OfflineSyncQueue, Arc<InMemoryJournal>) {
        let journal = Arc::new(InMemoryJournal::new());
        let queue = OfflineSyncQueue::builder(
            Arc::new(InMemoryDocumentStore::new()),
            journal.clone(),
            Arc::new(ManualConnectivity::new(online)),
        )
        .with_config(SyncQueueConfig::default().with_auto_sync_on_register(false))
        .build();
        (queue, journal)
    }

    fn payload() -> Payload {
        let mut p = Payload::new();
        p.insert("confirmed".into(), json!(12));
        p
    }

    #[tokio::test]
    async fn test_register_is_journal_first() {
        let (queue, journal) = queue_with(false);
        queue.initialize().await.unwrap();

        let id = queue
            .register_pending_operation(NewOperation::create("attendance", "w1", payload()))
            .await
            .unwrap();

        let raw = journal.raw(DEFAULT_KEY).unwrap();
        let stored: Vec<PendingOperation> = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, id);
        assert_eq!(queue.pending_operations(), stored);
    }

    #[tokio::test]
    async fn test_journal_failure_keeps_operation() {
        let (queue, journal) = queue_with(false);
        queue.initialize().await.unwrap();
        journal.set_failing(true);

        queue
            .register_pending_operation(NewOperation::delete("menus", "m1"))
            .await
            .unwrap();

        assert_eq!(queue.pending_operations_count(), 1);
        assert!(!queue.status().persistence_enabled);

        journal.set_failing(false);
        queue
            .register_pending_operation(NewOperation::delete("menus", "m2"))
            .await
            .unwrap();
        assert!(queue.status().persistence_enabled);
        let stored: Vec<PendingOperation> =
            serde_json::from_str(&journal.raw(DEFAULT_KEY).unwrap()).unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_journal_is_an_error() {
        let (queue, journal) = queue_with(true);
        journal.set(DEFAULT_KEY, "{not json").await.unwrap();

        let err = queue.initialize().await.unwrap_err();
        assert!(matches!(err, CanteenError::Journal(JournalError::Serialization(_))));
        assert!(!queue.is_initialized());
        // Left untouched for inspection
        assert_eq!(journal.raw(DEFAULT_KEY).as_deref(), Some("{not json"));
    }

    #[tokio::test]
    async fn test_classified_failure_is_retried() {
        let (queue, _journal) = queue_with(true);
        queue
            .register_pending_operation(NewOperation::update("menus", "missing", payload()))
            .await
            .unwrap();

        let summary = queue.sync_pending_operations().await;
        assert_eq!(summary.total, 1);
        assert_eq!(summary.successful, 0);
        assert_eq!(summary.failed_transient(), 1);
        assert_eq!(queue.pending_operations()[0].attempts, 1);
        assert!(queue.pending_operations()[0].last_attempt_at.is_some());

        // Sanity check on the failure kind the store reports
        let store = queue.store();
        assert!(matches!(
            store.update("menus", "missing", payload()).await,
            Err(StoreError::NotFound { .. })
        ));
    }
}
