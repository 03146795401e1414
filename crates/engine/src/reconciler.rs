// SPDX-License-Identifier: MIT

//! Per-record reconciliation state machine.
//!
//! Each record owns one `Reconciler` keeping its external representation in
//! sync: verify the recorded id, recreate after out-of-band loss, rebind on
//! channel or visibility changes. Operations serialize on the record lock,
//! which is held across the external calls they make.

use chrono::NaiveDate;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use thiserror::Error;
use tokio::sync::Mutex;
use warden_core::{
    ChannelId, Clock, GroupId, Location, Messaging, ProfileId, Record, RecordPatch, Renderer,
    RepresentationError, Visibility,
};

/// A fetch or create failure that is neither self-healing nor a permission
/// gap; scoped to the one record it occurred on
#[derive(Debug, Error)]
#[error("reconciliation failed for {profile}: {message}")]
pub struct ReconcileError {
    pub profile: ProfileId,
    pub message: String,
}

/// Where the state machine currently stands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcilerState {
    /// No channel handle resolved yet
    Unresolved,
    /// Representation verified to exist
    Bound,
    /// Existence could not be verified due to a permission failure
    Pending,
    /// No representation recorded, or the last one vanished
    Orphaned,
    /// Record deleted; all further operations are no-ops
    Retired,
}

/// Channel handle, resolved at most once unless invalidated by a rebind
#[derive(Clone, Copy, Debug)]
enum ChannelBinding {
    Unresolved,
    Missing,
    Resolved(ChannelId),
}

struct Runtime {
    configured: Option<ChannelId>,
    binding: ChannelBinding,
    visibility: Visibility,
    state: ReconcilerState,
}

/// Keeps one record's representation consistent with the record
pub struct Reconciler<M: Messaging, C: Clock> {
    group: GroupId,
    profile: ProfileId,
    messaging: M,
    renderer: Arc<dyn Renderer>,
    clock: C,
    /// The owning group's representation counter
    counter: Arc<AtomicU64>,
    /// Record fields; guarded briefly, never across an external call
    record: StdMutex<Record>,
    /// The record lock: serializes lifecycle operations, held across the
    /// external calls they make
    runtime: Mutex<Runtime>,
}

impl<M: Messaging, C: Clock> Reconciler<M, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        group: GroupId,
        profile: ProfileId,
        record: Record,
        configured: Option<ChannelId>,
        visibility: Visibility,
        counter: Arc<AtomicU64>,
        messaging: M,
        renderer: Arc<dyn Renderer>,
        clock: C,
    ) -> Self {
        Self {
            group,
            profile,
            messaging,
            renderer,
            clock,
            counter,
            record: StdMutex::new(record),
            runtime: Mutex::new(Runtime {
                configured,
                binding: ChannelBinding::Unresolved,
                visibility,
                state: ReconcilerState::Unresolved,
            }),
        }
    }

    pub fn profile(&self) -> &ProfileId {
        &self.profile
    }

    fn record_guard(&self) -> MutexGuard<'_, Record> {
        self.record.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deep copy of the record as it currently stands
    pub fn snapshot(&self) -> Record {
        self.record_guard().clone()
    }

    /// Last-encounter date, used for deterministic sweep ordering
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.record_guard().last_date
    }

    /// True when the representation cannot currently be confirmed
    pub async fn is_missing(&self) -> bool {
        matches!(
            self.runtime.lock().await.state,
            ReconcilerState::Pending | ReconcilerState::Orphaned
        )
    }

    pub async fn state(&self) -> ReconcilerState {
        self.runtime.lock().await.state
    }

    /// Verify or repair the representation; returns its location when it is
    /// confirmed live
    pub async fn check(&self) -> Result<Option<Location>, ReconcileError> {
        let mut runtime = self.runtime.lock().await;
        self.check_locked(&mut runtime).await
    }

    /// Merge fields into the record, then replace the representation
    pub async fn set_record_data(
        &self,
        patch: RecordPatch,
    ) -> Result<Option<Location>, ReconcileError> {
        let mut runtime = self.runtime.lock().await;
        if runtime.state == ReconcilerState::Retired {
            return Ok(None);
        }
        if !patch.is_empty() {
            self.record_guard().apply(patch);
        }
        self.delete_current(&runtime).await;
        runtime.state = ReconcilerState::Orphaned;
        self.check_locked(&mut runtime).await
    }

    /// Rebind to a new channel and replace the representation
    pub async fn set_channel(
        &self,
        channel: ChannelId,
    ) -> Result<Option<Location>, ReconcileError> {
        let mut runtime = self.runtime.lock().await;
        if runtime.state == ReconcilerState::Retired {
            return Ok(None);
        }
        self.delete_current(&runtime).await;
        runtime.configured = Some(channel);
        runtime.binding = ChannelBinding::Unresolved;
        runtime.state = ReconcilerState::Orphaned;
        self.check_locked(&mut runtime).await
    }

    /// Re-render under a new visibility mode; no-op when unchanged
    pub async fn set_visibility(
        &self,
        visibility: Visibility,
    ) -> Result<Option<Location>, ReconcileError> {
        let mut runtime = self.runtime.lock().await;
        if runtime.state == ReconcilerState::Retired || runtime.visibility == visibility {
            return Ok(None);
        }
        runtime.visibility = visibility;
        self.delete_current(&runtime).await;
        runtime.state = ReconcilerState::Orphaned;
        self.check_locked(&mut runtime).await
    }

    /// Best-effort delete of the representation; the reconciler becomes
    /// inert afterwards
    pub async fn retire(&self) {
        let mut runtime = self.runtime.lock().await;
        if runtime.state == ReconcilerState::Retired {
            return;
        }
        self.delete_current(&runtime).await;
        runtime.state = ReconcilerState::Retired;
    }

    async fn check_locked(
        &self,
        runtime: &mut Runtime,
    ) -> Result<Option<Location>, ReconcileError> {
        if runtime.state == ReconcilerState::Retired {
            return Ok(None);
        }

        if matches!(runtime.binding, ChannelBinding::Unresolved) {
            runtime.binding = self.resolve_binding(runtime.configured).await;
        }
        let channel = match runtime.binding {
            ChannelBinding::Resolved(channel) => channel,
            // Degraded: no creation attempts until a rebind
            ChannelBinding::Missing | ChannelBinding::Unresolved => {
                runtime.state = ReconcilerState::Orphaned;
                return Ok(None);
            }
        };

        let recorded = self.record_guard().representation;
        if let Some(id) = recorded {
            match self.messaging.fetch_representation(channel, id).await {
                Ok(representation) => {
                    runtime.state = ReconcilerState::Bound;
                    return Ok(Some(representation.location()));
                }
                Err(RepresentationError::NotFound) => {
                    tracing::debug!(
                        group = %self.group,
                        profile = %self.profile,
                        representation = %id,
                        "representation vanished, recreating"
                    );
                    self.record_guard().representation = None;
                    runtime.state = ReconcilerState::Orphaned;
                }
                Err(RepresentationError::PermissionDenied(reason)) => {
                    tracing::warn!(
                        group = %self.group,
                        profile = %self.profile,
                        reason,
                        "cannot verify representation"
                    );
                    runtime.state = ReconcilerState::Pending;
                    return Ok(None);
                }
                Err(RepresentationError::Other(message)) => {
                    return Err(ReconcileError {
                        profile: self.profile.clone(),
                        message,
                    });
                }
            }
        }

        runtime.state = ReconcilerState::Orphaned;
        // The serial is consumed up front; a failed create burns it, which
        // keeps the persisted counter monotonic
        let serial = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let content = {
            let record = self.record_guard();
            self.renderer.render(
                &self.profile,
                &record,
                runtime.visibility,
                serial,
                self.clock.today(),
            )
        };
        match self.messaging.create_representation(channel, &content).await {
            Ok(id) => {
                self.record_guard().representation = Some(id);
                runtime.state = ReconcilerState::Bound;
                tracing::debug!(
                    group = %self.group,
                    profile = %self.profile,
                    representation = %id,
                    serial,
                    "representation created"
                );
                Ok(Some(Location { channel, id }))
            }
            Err(RepresentationError::PermissionDenied(reason)) => {
                tracing::warn!(
                    group = %self.group,
                    profile = %self.profile,
                    reason,
                    "cannot create representation"
                );
                runtime.state = ReconcilerState::Pending;
                Ok(None)
            }
            Err(RepresentationError::Other(message)) => Err(ReconcileError {
                profile: self.profile.clone(),
                message,
            }),
            Err(RepresentationError::NotFound) => Err(ReconcileError {
                profile: self.profile.clone(),
                message: "target channel no longer exists".to_string(),
            }),
        }
    }

    async fn resolve_binding(&self, configured: Option<ChannelId>) -> ChannelBinding {
        match configured {
            Some(channel) if self.messaging.resolve_channel(channel).await => {
                ChannelBinding::Resolved(channel)
            }
            Some(channel) => {
                tracing::warn!(group = %self.group, %channel, "channel unresolvable");
                ChannelBinding::Missing
            }
            None => ChannelBinding::Missing,
        }
    }

    /// Best-effort delete of the current representation; clears the recorded
    /// id. NotFound is self-healing, everything else is logged and dropped.
    async fn delete_current(&self, runtime: &Runtime) {
        let recorded = self.record_guard().representation.take();
        let channel = match runtime.binding {
            ChannelBinding::Resolved(channel) => channel,
            _ => return,
        };
        let Some(id) = recorded else { return };
        match self.messaging.delete_representation(channel, id).await {
            Ok(()) | Err(RepresentationError::NotFound) => {}
            Err(error) => {
                tracing::warn!(
                    group = %self.group,
                    profile = %self.profile,
                    representation = %id,
                    %error,
                    "best-effort delete failed"
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
