//! # clinicq core
//!
//! Live-queue scheduling for walk-in and scheduled clinic check-ins.
//!
//! ## Overview
//!
//! A background worker keeps one queue assignment row per active check-in:
//!
//! - [`classification`]: maps arrival deviation to a priority class
//! - [`change_detector`]: hashes tracked check-in fields between polls
//! - [`queue`]: builds per-doctor or pooled queues for one clinic
//! - [`persister`]: upserts assignments and backfills missing rows
//! - [`orchestrator`]: runs one pass across every clinic
//! - [`scheduler`]: the polling loop deciding when a pass runs
//! - [`store`]: the data-store port with Postgres and in-memory adapters
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use clinicq_core::{
//!     config::SchedulerConfig, scheduler::QueueScheduler,
//!     store::InMemoryQueueStore,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! async fn serve() {
//!     let store = Arc::new(InMemoryQueueStore::new());
//!     let scheduler = QueueScheduler::new(store, SchedulerConfig::default());
//!     scheduler.run(CancellationToken::new()).await;
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Arrival-time priority classes
pub mod classification;

/// Snapshot-based change detection over tracked check-in fields
pub mod change_detector;

/// Wall-clock abstraction
pub mod clock;

/// Scheduler and builder settings
pub mod config;

/// Error types
pub mod error;

/// Per-clinic reconciliation pass
pub mod orchestrator;

/// Assignment writes and backfill
pub mod persister;

/// Queue construction
pub mod queue;

/// Polling loop
pub mod scheduler;

/// Data-store port and adapters
pub mod store;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub use classification::{ArrivalStatus, classify};
pub use config::{SchedulerConfig, UnassignedDoctorPolicy};
pub use error::{QueueError, Result};
pub use orchestrator::{ClinicFailure, FailureKind, Orchestrator, PassReport};
pub use scheduler::{QueueScheduler, ReconcileTrigger, TickOutcome};
