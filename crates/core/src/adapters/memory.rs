// SPDX-License-Identifier: MIT

//! In-memory adapter implementations.
//!
//! Used as test doubles (with call recording and injectable failure modes)
//! and by standalone daemon runs where no platform client is wired in.

use super::traits::*;
use crate::id::{ChannelId, ProfileId, RepresentationId};
use crate::render::CardContent;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Recorded call to the messaging adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagingCall {
    ResolveChannel {
        channel: ChannelId,
    },
    Fetch {
        channel: ChannelId,
        id: RepresentationId,
    },
    Create {
        channel: ChannelId,
    },
    Delete {
        channel: ChannelId,
        id: RepresentationId,
    },
}

#[derive(Default)]
struct MessagingState {
    calls: Vec<MessagingCall>,
    channels: HashSet<ChannelId>,
    live: HashMap<(ChannelId, RepresentationId), CardContent>,
    next_id: u64,
    // Configurable failure modes
    fetch_denied: bool,
    create_denied: bool,
    fail_fetch: Option<String>,
    fail_create: Option<String>,
}

/// In-memory messaging platform with call recording
#[derive(Clone)]
pub struct MemoryMessaging {
    state: Arc<Mutex<MessagingState>>,
}

impl Default for MemoryMessaging {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMessaging {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MessagingState {
                next_id: 1000,
                ..Default::default()
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MessagingState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make a channel resolvable
    pub fn add_channel(&self, channel: ChannelId) {
        self.lock().channels.insert(channel);
    }

    /// Simulate losing read permission (fetch fails with PermissionDenied)
    pub fn set_fetch_denied(&self, denied: bool) {
        self.lock().fetch_denied = denied;
    }

    /// Simulate losing send permission (create fails with PermissionDenied)
    pub fn set_create_denied(&self, denied: bool) {
        self.lock().create_denied = denied;
    }

    /// Fail the next fetch / create with a platform error
    pub fn fail_next_fetch(&self, message: impl Into<String>) {
        self.lock().fail_fetch = Some(message.into());
    }

    pub fn fail_next_create(&self, message: impl Into<String>) {
        self.lock().fail_create = Some(message.into());
    }

    /// Delete a representation behind the service's back
    pub fn delete_out_of_band(&self, channel: ChannelId, id: RepresentationId) {
        self.lock().live.remove(&(channel, id));
    }

    /// All recorded calls, in order
    pub fn calls(&self) -> Vec<MessagingCall> {
        self.lock().calls.clone()
    }

    pub fn create_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, MessagingCall::Create { .. }))
            .count()
    }

    pub fn delete_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, MessagingCall::Delete { .. }))
            .count()
    }

    /// Live representation ids in a channel, in creation order
    pub fn live_in(&self, channel: ChannelId) -> Vec<RepresentationId> {
        let state = self.lock();
        let mut ids: Vec<RepresentationId> = state
            .live
            .keys()
            .filter(|(c, _)| *c == channel)
            .map(|(_, id)| *id)
            .collect();
        ids.sort_by_key(|id| id.0);
        ids
    }

    /// Rendered content of a live representation
    pub fn content_of(&self, channel: ChannelId, id: RepresentationId) -> Option<CardContent> {
        self.lock().live.get(&(channel, id)).cloned()
    }
}

#[async_trait]
impl Messaging for MemoryMessaging {
    async fn resolve_channel(&self, channel: ChannelId) -> bool {
        let mut state = self.lock();
        state.calls.push(MessagingCall::ResolveChannel { channel });
        state.channels.contains(&channel)
    }

    async fn fetch_representation(
        &self,
        channel: ChannelId,
        id: RepresentationId,
    ) -> Result<Representation, RepresentationError> {
        let mut state = self.lock();
        state.calls.push(MessagingCall::Fetch { channel, id });
        if let Some(message) = state.fail_fetch.take() {
            return Err(RepresentationError::Other(message));
        }
        if state.fetch_denied {
            return Err(RepresentationError::PermissionDenied(
                "read access denied".to_string(),
            ));
        }
        if state.live.contains_key(&(channel, id)) {
            Ok(Representation { id, channel })
        } else {
            Err(RepresentationError::NotFound)
        }
    }

    async fn create_representation(
        &self,
        channel: ChannelId,
        content: &CardContent,
    ) -> Result<RepresentationId, RepresentationError> {
        let mut state = self.lock();
        state.calls.push(MessagingCall::Create { channel });
        if let Some(message) = state.fail_create.take() {
            return Err(RepresentationError::Other(message));
        }
        if state.create_denied {
            return Err(RepresentationError::PermissionDenied(
                "send access denied".to_string(),
            ));
        }
        state.next_id += 1;
        let id = RepresentationId(state.next_id);
        state.live.insert((channel, id), content.clone());
        Ok(id)
    }

    async fn delete_representation(
        &self,
        channel: ChannelId,
        id: RepresentationId,
    ) -> Result<(), RepresentationError> {
        let mut state = self.lock();
        state.calls.push(MessagingCall::Delete { channel, id });
        if state.live.remove(&(channel, id)).is_some() {
            Ok(())
        } else {
            Err(RepresentationError::NotFound)
        }
    }
}

#[derive(Default)]
struct ProfilesState {
    profiles: HashMap<ProfileId, ProfileSummary>,
    vanity: HashMap<String, ProfileId>,
    active: Option<u64>,
    batch_sizes: Vec<usize>,
    fail_requests: bool,
}

/// In-memory profile-data provider
#[derive(Clone, Default)]
pub struct MemoryProfiles {
    state: Arc<Mutex<ProfilesState>>,
}

impl MemoryProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProfilesState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert(&self, id: ProfileId, summary: ProfileSummary) {
        self.lock().profiles.insert(id, summary);
    }

    /// Register a vanity name resolving to a profile id
    pub fn add_vanity(&self, name: impl Into<String>, id: ProfileId) {
        self.lock().vanity.insert(name.into(), id);
    }

    pub fn remove(&self, id: &ProfileId) {
        self.lock().profiles.remove(id);
    }

    pub fn set_active_count(&self, count: Option<u64>) {
        self.lock().active = count;
    }

    pub fn set_fail_requests(&self, fail: bool) {
        self.lock().fail_requests = fail;
    }

    /// Sizes of the id batches received so far, for asserting chunking
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.lock().batch_sizes.clone()
    }
}

#[async_trait]
impl ProfileProvider for MemoryProfiles {
    async fn resolve_reference(&self, text: &str) -> Result<Option<ProfileId>, ProfileError> {
        let state = self.lock();
        if state.fail_requests {
            return Err(ProfileError::Request("provider unavailable".to_string()));
        }
        let tail = text.trim_end_matches('/').rsplit('/').next().unwrap_or("");
        if tail.is_empty() {
            return Ok(None);
        }
        let as_id = ProfileId::new(tail);
        if state.profiles.contains_key(&as_id) {
            return Ok(Some(as_id));
        }
        Ok(state.vanity.get(tail).cloned())
    }

    async fn summaries(
        &self,
        ids: &[ProfileId],
    ) -> Result<HashMap<ProfileId, Option<ProfileSummary>>, ProfileError> {
        let mut out = HashMap::new();
        for chunk in ids.chunks(SUMMARY_BATCH_LIMIT) {
            let mut state = self.lock();
            if state.fail_requests {
                return Err(ProfileError::Request("provider unavailable".to_string()));
            }
            state.batch_sizes.push(chunk.len());
            for id in chunk {
                out.insert(id.clone(), state.profiles.get(id).cloned());
            }
        }
        Ok(out)
    }

    async fn active_count(&self) -> Option<u64> {
        self.lock().active
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
