// SPDX-License-Identifier: MIT

//! The group/record state file and its timestamped backups

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use warden_core::{ChannelId, GroupId, ProfileId, Record};

/// Errors from durable-file operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Wire format of the state file's save timestamp
pub const TIME_FORMAT: &str = "%Y-%m-%d-%H:%M:%S";

/// Wire format of backup file names
const BACKUP_FORMAT: &str = "%Y-%m-%d-%H_%M_%S";

/// Everything persisted for one group
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedGroup {
    /// Configured representation channel; 0 until one is set
    pub channel: u64,
    pub private: bool,
    /// Next record serial; consumed on every representation creation
    pub counter: u64,
    /// Records in insertion order
    #[serde(with = "ordered_records")]
    pub data: Vec<(ProfileId, Record)>,
}

impl PersistedGroup {
    pub fn channel_id(&self) -> Option<ChannelId> {
        (self.channel != 0).then_some(ChannelId(self.channel))
    }
}

/// Root of the state file
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// When the state was last saved; `None` before the first save
    pub time: Option<String>,
    pub guilds: BTreeMap<GroupId, PersistedGroup>,
}

impl PersistedState {
    /// Stamp the state with a save time
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.time = Some(at.format(TIME_FORMAT).to_string());
    }
}

/// Handle on the state file and its backup directory
#[derive(Clone)]
pub struct StateFile {
    path: PathBuf,
    backup_dir: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup_dir: backup_dir.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state file, or start empty when it does not exist yet
    pub fn load_or_init(&self) -> Result<PersistedState, StorageError> {
        if !self.path.exists() {
            return Ok(PersistedState::default());
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Persist the state atomically
    pub fn save(&self, state: &PersistedState) -> Result<(), StorageError> {
        write_atomic(&self.path, &serde_json::to_string_pretty(state)?)
    }

    /// Write a timestamped copy of the state into the backup directory
    pub fn backup(
        &self,
        state: &PersistedState,
        at: DateTime<Utc>,
    ) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(&self.backup_dir)?;
        let name = format!("{}.json", at.format(BACKUP_FORMAT));
        let path = self.backup_dir.join(name);
        write_atomic(&path, &serde_json::to_string_pretty(state)?)?;
        Ok(path)
    }
}

/// Write contents to a temporary sibling, then rename into place
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Record maps serialize as JSON objects but must keep insertion order,
/// so in memory they are ordered pairs.
mod ordered_records {
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use warden_core::{ProfileId, Record};

    pub fn serialize<S: Serializer>(
        entries: &[(ProfileId, Record)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (id, record) in entries {
            map.serialize_entry(id, record)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(ProfileId, Record)>, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = Vec<(ProfileId, Record)>;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "a map of profile ids to records")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry()? {
                    out.push(entry);
                }
                Ok(out)
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
