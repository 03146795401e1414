// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! warden-core: Core library for the Warden reputation tracker
//!
//! This crate provides:
//! - The record/group data model shared with the durable state files
//! - Adapter traits for the messaging platform and the profile-data provider,
//!   plus in-memory implementations used by tests and standalone runs
//! - Card rendering for record representations
//! - Authorization levels, the command contract, and confirmation sessions

pub mod clock;
pub mod id;

pub mod adapters;
pub mod command;
pub mod config;
pub mod level;
pub mod reason;
pub mod record;
pub mod render;
pub mod session;

// Re-exports
pub use clock::{Clock, FakeClock, SystemClock};
pub use command::{Command, ValidationError};
pub use config::{Config, ConfigError};
pub use id::{ChannelId, GroupId, ProfileId, RepresentationId};
pub use level::{Actor, LevelTable, Leveler, RoleId};
pub use reason::ReasonTag;
pub use record::{Record, RecordPatch, Visibility};
pub use render::{CardContent, CardRenderer, Renderer};
pub use session::{PromptSession, Resolution, SessionError, SessionTable};

// Re-export adapters
pub use adapters::{
    Location, MemoryMessaging, MemoryProfiles, Messaging, ProfileError, ProfileProvider,
    ProfileSummary, Representation, RepresentationError, SUMMARY_BATCH_LIMIT,
};
