//! Pre-defined scenarios for the offline sync queue
//!
//! Every scenario builds its own queue over in-process collaborators and
//! returns a [`ScenarioReport`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use canteen_core::{CanteenError, ManualConnectivity, NewOperation, Payload};
use canteen_storage::{FileJournal, InMemoryDocumentStore, InMemoryJournal, StorageError};
use canteen_sync::{
    DEFAULT_MAX_ATTEMPTS, OfflineAwareStore, OfflineSyncQueue, SyncQueueConfig, WriteOutcome,
};
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, instrument, warn};

use crate::flaky::FlakyStore;
use crate::report::ScenarioReport;

const ATTENDANCE: &str = "attendance";
const MENUS: &str = "menus";
const COORDINATOR: &str = "coord-17";
const ADMIN: &str = "admin-2";

/// Errors that abort a scenario
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Canteen(#[from] CanteenError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("failure rate must be within [0, 1], got {0}")]
    InvalidFailureRate(f64),

    #[error("no replay finished within {0:?} of reconnecting")]
    ReplayTimeout(Duration),
}

/// Scenario parameters
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Attendance confirmations queued per scenario
    pub operations: usize,
    /// Probability the flaky store rejects a write
    pub failure_rate: f64,
    /// Attempt budget per operation
    pub max_attempts: u32,
    /// Upper bound on explicit sync passes
    pub max_passes: usize,
    /// Seed for the flaky store; random when unset
    pub seed: Option<u64>,
    /// How long to wait for the background replay after reconnecting
    pub replay_timeout: Duration,
    /// Menu week the writes belong to
    pub week: String,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            operations: 12,
            failure_rate: 0.3,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_passes: 10,
            seed: None,
            replay_timeout: Duration::from_secs(5),
            week: "2024-W18".to_string(),
        }
    }
}

impl SimConfig {
    pub fn with_operations(mut self, operations: usize) -> Self {
        self.operations = operations;
        self
    }

    pub fn with_failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = failure_rate;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_replay_timeout(mut self, timeout: Duration) -> Self {
        self.replay_timeout = timeout;
        self
    }

    /// Queue settings shared by every scenario
    ///
    /// Registration never triggers a pass; scenarios decide when to sync.
    fn queue_config(&self) -> SyncQueueConfig {
        SyncQueueConfig::default()
            .with_max_attempts(self.max_attempts)
            .with_auto_sync_on_register(false)
    }

    fn attendance_id(&self, tag: &str, i: usize) -> String {
        format!("{}-{tag}-{i:03}", self.week)
    }
}

fn attendance_payload(i: usize) -> Payload {
    let mut data = Payload::new();
    data.insert("confirmed".into(), serde_json::json!(true));
    data.insert("meals".into(), serde_json::json!(1 + i % 3));
    data.insert("coordinator".into(), serde_json::json!(COORDINATOR));
    data
}

fn menu_payload(dishes: &[&str]) -> Payload {
    let mut data = Payload::new();
    data.insert("dishes".into(), serde_json::json!(dishes));
    data
}

/// The device loses its connection mid-week
///
/// One menu is written while online. Attendance confirmations and a menu
/// edit are then made offline and queued. Reconnecting triggers the
/// background replay, which the scenario waits for.
#[instrument(skip(config), fields(operations = config.operations))]
pub async fn run_outage(config: &SimConfig) -> Result<ScenarioReport, SimulationError> {
    info!("Running outage scenario");
    let mut report = ScenarioReport::new("outage");

    let store = Arc::new(InMemoryDocumentStore::new());
    let connectivity = Arc::new(ManualConnectivity::new(true));
    let queue = OfflineSyncQueue::builder(
        store.clone(),
        Arc::new(InMemoryJournal::new()),
        connectivity.clone(),
    )
    .with_config(config.queue_config())
    .build();
    queue.initialize().await?;
    let writer = OfflineAwareStore::new(queue.clone());

    let menu_id = config.week.as_str();
    let outcome = writer
        .write(NewOperation::create(MENUS, menu_id, menu_payload(&["soup", "pasta"])).with_origin(ADMIN))
        .await?;
    if outcome == WriteOutcome::Applied {
        report.applied_directly += 1;
    }

    info!("Connection lost");
    connectivity.set_offline();

    for i in 0..config.operations {
        let op = NewOperation::create(ATTENDANCE, config.attendance_id("out", i), attendance_payload(i))
            .with_origin(COORDINATOR);
        if writer.write(op).await?.is_queued() {
            report.queued += 1;
        }
    }
    let edit = NewOperation::update(MENUS, menu_id, menu_payload(&["soup", "risotto"])).with_origin(ADMIN);
    if writer.write(edit).await?.is_queued() {
        report.queued += 1;
    }
    debug!(pending = queue.pending_operations_count(), "Backlog built");

    let mut summaries = queue.sync_summaries();
    info!("Connection restored");
    connectivity.set_online();

    loop {
        match tokio::time::timeout(config.replay_timeout, summaries.recv()).await {
            Ok(Ok(summary)) => {
                let drained = summary.pending == 0;
                report.passes.push(summary);
                if drained {
                    break;
                }
            }
            Ok(Err(RecvError::Lagged(skipped))) => {
                warn!(skipped, "Missed sync summaries");
            }
            Ok(Err(RecvError::Closed)) => break,
            Err(_) => return Err(SimulationError::ReplayTimeout(config.replay_timeout)),
        }
    }

    report.remaining = queue.pending_operations_count();
    report.documents = store.count(ATTENDANCE) + store.count(MENUS);
    Ok(report)
}

/// The store rejects writes at random
///
/// Confirmations are queued up front, then explicit passes run until the
/// queue drains, `max_passes` is reached, or every remaining operation has
/// been dropped after exhausting its attempts.
#[instrument(skip(config), fields(operations = config.operations, failure_rate = config.failure_rate))]
pub async fn run_flaky(config: &SimConfig) -> Result<ScenarioReport, SimulationError> {
    if !(0.0..=1.0).contains(&config.failure_rate) {
        return Err(SimulationError::InvalidFailureRate(config.failure_rate));
    }
    info!("Running flaky store scenario");
    let mut report = ScenarioReport::new("flaky");

    let documents = Arc::new(InMemoryDocumentStore::new());
    let store = Arc::new(FlakyStore::new(
        documents.clone(),
        config.failure_rate,
        config.seed,
    ));
    let queue = OfflineSyncQueue::builder(
        store.clone(),
        Arc::new(InMemoryJournal::new()),
        Arc::new(ManualConnectivity::new(true)),
    )
    .with_config(config.queue_config())
    .build();
    queue.initialize().await?;

    for i in 0..config.operations {
        let op = NewOperation::create(ATTENDANCE, config.attendance_id("flaky", i), attendance_payload(i))
            .with_origin(COORDINATOR);
        queue.register_pending_operation(op).await?;
        report.queued += 1;
    }

    while queue.pending_operations_count() > 0 && report.passes.len() < config.max_passes {
        let summary = queue.sync_pending_operations().await;
        debug!(
            pass = report.passes.len() + 1,
            successful = summary.successful,
            pending = summary.pending,
            "Pass finished"
        );
        report.passes.push(summary);
    }

    report.remaining = queue.pending_operations_count();
    report.documents = documents.count(ATTENDANCE);
    info!(
        rejected = store.rejected(),
        remaining = report.remaining,
        "Flaky store scenario finished"
    );
    Ok(report)
}

/// The app is closed with a backlog and reopened
///
/// Writes are queued offline against a [`FileJournal`] in `journal_dir`.
/// The queue is then dropped and a fresh one is built over the same
/// directory, loads the backlog, and replays it.
#[instrument(skip(config, journal_dir), fields(journal_dir = %journal_dir.display()))]
pub async fn run_restart(config: &SimConfig, journal_dir: &Path) -> Result<ScenarioReport, SimulationError> {
    info!("Running restart scenario");
    let mut report = ScenarioReport::new("restart");
    let tag = format!("run{:08x}", rand::random::<u32>());

    {
        let journal = Arc::new(FileJournal::open(journal_dir).await?);
        let queue = OfflineSyncQueue::builder(
            Arc::new(InMemoryDocumentStore::new()),
            journal,
            Arc::new(ManualConnectivity::new(false)),
        )
        .with_config(config.queue_config())
        .build();
        queue.initialize().await?;

        for i in 0..config.operations {
            let op = NewOperation::create(ATTENDANCE, config.attendance_id(&tag, i), attendance_payload(i))
                .with_origin(COORDINATOR);
            queue.register_pending_operation(op).await?;
            report.queued += 1;
        }
        if config.operations > 0 {
            // Coordinator withdraws the first confirmation
            let withdraw = NewOperation::delete(ATTENDANCE, config.attendance_id(&tag, 0)).with_origin(COORDINATOR);
            queue.register_pending_operation(withdraw).await?;
            report.queued += 1;
        }

        let status = queue.status();
        if !status.persistence_enabled {
            warn!("Journal unavailable; backlog will not survive the restart");
        }
        info!(pending = status.pending_count, "Closing app with backlog");
    }

    let store = Arc::new(InMemoryDocumentStore::new());
    let journal = Arc::new(FileJournal::open(journal_dir).await?);
    let queue = OfflineSyncQueue::builder(store.clone(), journal, Arc::new(ManualConnectivity::new(true)))
        .with_config(config.queue_config())
        .build();
    queue.initialize().await?;
    report.recovered = queue.pending_operations_count();
    info!(recovered = report.recovered, "Reopened app");

    while queue.pending_operations_count() > 0 && report.passes.len() < config.max_passes {
        report.passes.push(queue.sync_pending_operations().await);
    }

    report.remaining = queue.pending_operations_count();
    report.documents = store.count(ATTENDANCE);
    Ok(report)
}
