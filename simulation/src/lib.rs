//! # Canteen Simulation
//!
//! Scenario runner for the offline sync queue.
//!
//! Each scenario wires an [`OfflineSyncQueue`](canteen_sync::OfflineSyncQueue)
//! to the in-process collaborators from `canteen-core` and `canteen-storage`,
//! drives connectivity and store failures, and reports what the queue did.
//!
//! - **Outage** (`scenarios::run_outage`): a coordinator keeps confirming
//!   attendance while the device is offline; the backlog replays on reconnect
//! - **Flaky** (`scenarios::run_flaky`): the store rejects writes at random;
//!   passes repeat until the queue drains or operations run out of attempts
//! - **Restart** (`scenarios::run_restart`): the queue is rebuilt from a
//!   file journal as if the app had been closed and reopened

pub mod flaky;
pub mod report;
pub mod scenarios;

pub use flaky::FlakyStore;
pub use report::ScenarioReport;
pub use scenarios::{SimConfig, SimulationError};
