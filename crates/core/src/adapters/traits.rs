// SPDX-License-Identifier: MIT

//! Adapter trait definitions for the messaging platform and the
//! profile-data provider

use crate::id::{ChannelId, ProfileId, RepresentationId};
use crate::render::CardContent;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

// =============================================================================
// Messaging platform
// =============================================================================

/// Resolvable position of a live representation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Location {
    pub channel: ChannelId,
    pub id: RepresentationId,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.channel, self.id)
    }
}

/// A representation confirmed to exist on the platform
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Representation {
    pub id: RepresentationId,
    pub channel: ChannelId,
}

impl Representation {
    pub fn location(&self) -> Location {
        Location {
            channel: self.channel,
            id: self.id,
        }
    }
}

/// Errors from representation operations.
///
/// `NotFound` is self-healing and never surfaced to users; `PermissionDenied`
/// is logged and captured as reconciler state; `Other` propagates as a
/// per-record reconciliation error.
#[derive(Debug, Error)]
pub enum RepresentationError {
    #[error("representation not found")]
    NotFound,
    #[error("missing permission: {0}")]
    PermissionDenied(String),
    #[error("platform error: {0}")]
    Other(String),
}

/// Adapter for the messaging platform hosting representations
#[async_trait]
pub trait Messaging: Clone + Send + Sync + 'static {
    /// Best-effort channel resolution; false when the channel is unknown
    /// or inaccessible
    async fn resolve_channel(&self, channel: ChannelId) -> bool;

    /// Fetch an existing representation
    async fn fetch_representation(
        &self,
        channel: ChannelId,
        id: RepresentationId,
    ) -> Result<Representation, RepresentationError>;

    /// Create a new representation from rendered content
    async fn create_representation(
        &self,
        channel: ChannelId,
        content: &CardContent,
    ) -> Result<RepresentationId, RepresentationError>;

    /// Delete a representation; `NotFound` is ignorable by callers
    async fn delete_representation(
        &self,
        channel: ChannelId,
        id: RepresentationId,
    ) -> Result<(), RepresentationError>;
}

// =============================================================================
// Profile-data provider
// =============================================================================

/// Largest id list a single summary request may carry
pub const SUMMARY_BATCH_LIMIT: usize = 100;

/// Current external data for one profile
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileSummary {
    pub name: String,
    pub avatar: String,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("provider request failed: {0}")]
    Request(String),
}

/// Adapter for the external profile-data provider
#[async_trait]
pub trait ProfileProvider: Clone + Send + Sync + 'static {
    /// Resolve free-form user input (id, vanity name, or profile link) to a
    /// profile id
    async fn resolve_reference(&self, text: &str) -> Result<Option<ProfileId>, ProfileError>;

    /// Fetch summaries for the given ids, internally chunking requests at
    /// [`SUMMARY_BATCH_LIMIT`]. Ids the provider no longer knows map to `None`.
    async fn summaries(
        &self,
        ids: &[ProfileId],
    ) -> Result<HashMap<ProfileId, Option<ProfileSummary>>, ProfileError>;

    /// Active-profile count for the status indicator, when the provider
    /// exposes one
    async fn active_count(&self) -> Option<u64>;
}
