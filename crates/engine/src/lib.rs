// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! warden-engine: the reconciliation core
//!
//! Three pieces: the [`Store`] owning groups and records plus their durable
//! file, one [`Reconciler`] per record keeping its representation consistent
//! with the record, and the [`Scheduler`] driving periodic polling, sweeps,
//! snapshots, and backups over the shared store.

mod reconciler;
mod scheduler;
mod store;

pub use reconciler::{ReconcileError, Reconciler, ReconcilerState};
pub use scheduler::{Activity, RecordingStatus, Scheduler, SchedulerHandle, StatusSink, TracingStatus};
pub use store::{Store, StoreError};
