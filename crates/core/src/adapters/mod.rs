// SPDX-License-Identifier: MIT

//! Adapter traits for external integrations, plus in-memory implementations

mod memory;
mod traits;

pub use memory::{MemoryMessaging, MemoryProfiles, MessagingCall};
pub use traits::{
    Location, Messaging, ProfileError, ProfileProvider, ProfileSummary, Representation,
    RepresentationError, SUMMARY_BATCH_LIMIT,
};
