// SPDX-License-Identifier: MIT

//! Append-only audit log of deleted records.
//!
//! Every delete appends the actor, the profile id, and a full snapshot of
//! the record as it stood, keyed by group. Restores read from here.

use crate::state::{write_atomic, StorageError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use warden_core::{GroupId, ProfileId, Record};

/// One deletion: who removed the record, which profile, and the snapshot.
/// Serializes as a three-element array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry(pub String, pub ProfileId, pub Record);

impl AuditEntry {
    pub fn actor(&self) -> &str {
        &self.0
    }

    pub fn profile(&self) -> &ProfileId {
        &self.1
    }

    pub fn record(&self) -> &Record {
        &self.2
    }
}

/// Handle on the audit log file
#[derive(Clone)]
pub struct AuditFile {
    path: PathBuf,
}

impl AuditFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load all entries, or start empty when the file does not exist yet
    pub fn load_or_init(&self) -> Result<BTreeMap<GroupId, Vec<AuditEntry>>, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Append one entry under the given group
    pub fn append(&self, group: &GroupId, entry: AuditEntry) -> Result<(), StorageError> {
        let mut entries = self.load_or_init()?;
        entries.entry(group.clone()).or_default().push(entry);
        write_atomic(&self.path, &serde_json::to_string_pretty(&entries)?)
    }

    /// Entries for one group, oldest first
    pub fn entries_for(&self, group: &GroupId) -> Result<Vec<AuditEntry>, StorageError> {
        Ok(self.load_or_init()?.remove(group).unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
