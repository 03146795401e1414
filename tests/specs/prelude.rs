// SPDX-License-Identifier: MIT

//! Shared helpers for the behavioral specs

use chrono::NaiveDate;
use std::sync::Arc;
use tempfile::TempDir;
use warden_core::{CardRenderer, ChannelId, FakeClock, MemoryMessaging, Record};
use warden_engine::Store;
use warden_storage::{AuditFile, StateFile};

pub const CHANNEL: ChannelId = ChannelId(42);

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn record(name: &str) -> Record {
    Record::new(
        name,
        format!("https://profiles.example/{name}"),
        format!("https://avatars.example/{name}.jpg"),
        "operator#1",
        day(2026, 3, 14),
    )
}

pub fn open_store(
    dir: &TempDir,
    messaging: &MemoryMessaging,
    clock: &FakeClock,
) -> Store<MemoryMessaging, FakeClock> {
    Store::load_or_init(
        StateFile::new(dir.path().join("state.json"), dir.path().join("backups")),
        AuditFile::new(dir.path().join("unblocked.json")),
        messaging.clone(),
        Arc::new(CardRenderer),
        clock.clone(),
    )
    .unwrap()
}
