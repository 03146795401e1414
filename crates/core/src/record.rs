// SPDX-License-Identifier: MIT

//! The persisted reputation record and its field-merge patch.
//!
//! Field names and formats mirror the durable state file exactly: the
//! representation id is stored as `message` with 0 meaning unset, dates are
//! `DD/MM/YYYY` strings, and an unset last-encounter date is the empty string.

use crate::id::RepresentationId;
use crate::reason::ReasonTag;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Whether group representations show the initiator field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn is_private(self) -> bool {
        matches!(self, Visibility::Private)
    }

    pub fn from_private(private: bool) -> Self {
        if private {
            Visibility::Private
        } else {
            Visibility::Public
        }
    }
}

/// A reputation entry for one tracked external profile
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Live representation id; `None` when no representation exists
    #[serde(rename = "message", with = "rep_id")]
    pub representation: Option<RepresentationId>,
    /// Current display name
    pub name: String,
    /// Append-only name history; the current name is the last entry
    pub old_names: Vec<String>,
    /// Who created the record; shown only in private groups
    pub initiator: String,
    /// How many times the profile has been encountered
    pub encounters: u32,
    /// First-encounter date
    #[serde(with = "day")]
    pub date: NaiveDate,
    /// Last-encounter date; unset until the first confirmed encounter
    #[serde(with = "day_opt")]
    pub last_date: Option<NaiveDate>,
    /// Reason tags from the fixed catalog
    pub reasons: Vec<ReasonTag>,
    /// Profile page URL
    pub url: String,
    /// Avatar image URL
    pub avatar: String,
}

impl Record {
    /// A fresh record for a newly tracked profile
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        avatar: impl Into<String>,
        initiator: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        let name = name.into();
        Self {
            representation: None,
            old_names: vec![name.clone()],
            name,
            initiator: initiator.into(),
            encounters: 0,
            date,
            last_date: None,
            reasons: Vec::new(),
            url: url.into(),
            avatar: avatar.into(),
        }
    }

    /// Merge patch fields into this record
    pub fn apply(&mut self, patch: RecordPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(old_names) = patch.old_names {
            self.old_names = old_names;
        }
        if let Some(initiator) = patch.initiator {
            self.initiator = initiator;
        }
        if let Some(encounters) = patch.encounters {
            self.encounters = encounters;
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(last_date) = patch.last_date {
            self.last_date = Some(last_date);
        }
        if let Some(reasons) = patch.reasons {
            self.reasons = reasons;
        }
        if let Some(url) = patch.url {
            self.url = url;
        }
        if let Some(avatar) = patch.avatar {
            self.avatar = avatar;
        }
    }

    /// Register a confirmed encounter on the given date
    pub fn touch_encounter(&mut self, today: NaiveDate) {
        self.encounters += 1;
        self.last_date = Some(today);
    }
}

/// Partial update merged into a [`Record`] by `apply`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordPatch {
    pub name: Option<String>,
    pub old_names: Option<Vec<String>>,
    pub initiator: Option<String>,
    pub encounters: Option<u32>,
    pub date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub reasons: Option<Vec<ReasonTag>>,
    pub url: Option<String>,
    pub avatar: Option<String>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        *self == RecordPatch::default()
    }
}

/// Date wire format used throughout the state file
pub const DAY_FORMAT: &str = "%d/%m/%Y";

pub(crate) mod day {
    use super::DAY_FORMAT;
    use chrono::NaiveDate;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(DAY_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&raw, DAY_FORMAT).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod day_opt {
    use super::DAY_FORMAT;
    use chrono::NaiveDate;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        date: &Option<NaiveDate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => serializer.serialize_str(&date.format(DAY_FORMAT).to_string()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.is_empty() {
            return Ok(None);
        }
        NaiveDate::parse_from_str(&raw, DAY_FORMAT)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}

pub(crate) mod rep_id {
    use crate::id::RepresentationId;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        id: &Option<RepresentationId>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(id.map(|id| id.0).unwrap_or(0))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<RepresentationId>, D::Error> {
        let raw = u64::deserialize(deserializer)?;
        Ok(if raw == 0 {
            None
        } else {
            Some(RepresentationId(raw))
        })
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
