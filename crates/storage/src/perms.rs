// SPDX-License-Identifier: MIT

//! Durable permission-level table

use crate::state::{write_atomic, StorageError};
use std::fs;
use std::path::PathBuf;
use warden_core::LevelTable;

/// Handle on the permission-level file
#[derive(Clone)]
pub struct PermissionsFile {
    path: PathBuf,
}

impl PermissionsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the level table, or start empty when the file does not exist yet
    pub fn load_or_init(&self) -> Result<LevelTable, StorageError> {
        if !self.path.exists() {
            return Ok(LevelTable::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Persist the level table atomically
    pub fn save(&self, table: &LevelTable) -> Result<(), StorageError> {
        write_atomic(&self.path, &serde_json::to_string_pretty(table)?)
    }
}

#[cfg(test)]
#[path = "perms_tests.rs"]
mod tests;
