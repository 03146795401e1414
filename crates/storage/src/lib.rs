// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! warden-storage: durable JSON files backing the warden service
//!
//! Three files live under the data directory: the group/record state file,
//! the permission-level table, and the append-only restore audit log. Every
//! write goes to a temporary sibling first and is renamed into place.

mod audit;
mod perms;
mod state;

pub use audit::{AuditEntry, AuditFile};
pub use perms::PermissionsFile;
pub use state::{PersistedGroup, PersistedState, StateFile, StorageError, TIME_FORMAT};
