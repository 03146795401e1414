// SPDX-License-Identifier: MIT

//! Process-wide authoritative record store.
//!
//! Owns the group/record map and the durable files, and delegates all
//! representation work to each record's reconciler. The group lock guards
//! structural mutations and ordered snapshots only; it is never held across
//! an external call. Driving reconcilers happens after release, in ascending
//! last-encounter-date order for reproducible output.

use crate::reconciler::{ReconcileError, Reconciler};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use thiserror::Error;
use tokio::sync::Mutex;
use warden_core::{
    ChannelId, Clock, GroupId, Location, Messaging, ProfileId, ProfileSummary, Record,
    RecordPatch, Renderer, Visibility,
};
use warden_storage::{
    AuditEntry, AuditFile, PersistedGroup, PersistedState, StateFile, StorageError,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Group {0} is already registered.")]
    GroupExists(GroupId),
    #[error("Group {0} is not registered.")]
    GroupNotFound(GroupId),
    #[error("Profile {0} is already tracked.")]
    RecordExists(ProfileId),
    #[error("Profile {0} is not tracked.")]
    RecordNotFound(ProfileId),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

struct Slots<M: Messaging, C: Clock> {
    /// Insertion order of tracked profiles
    order: Vec<ProfileId>,
    map: HashMap<ProfileId, Arc<Reconciler<M, C>>>,
}

struct Group<M: Messaging, C: Clock> {
    /// Structural lock: record add/remove, config changes, ordered snapshots
    lock: Mutex<()>,
    channel: StdMutex<Option<ChannelId>>,
    private: AtomicBool,
    counter: Arc<AtomicU64>,
    slots: StdMutex<Slots<M, C>>,
}

impl<M: Messaging, C: Clock> Group<M, C> {
    fn new(channel: Option<ChannelId>, private: bool, counter: u64) -> Self {
        Self {
            lock: Mutex::new(()),
            channel: StdMutex::new(channel),
            private: AtomicBool::new(private),
            counter: Arc::new(AtomicU64::new(counter)),
            slots: StdMutex::new(Slots {
                order: Vec::new(),
                map: HashMap::new(),
            }),
        }
    }

    fn slots_guard(&self) -> MutexGuard<'_, Slots<M, C>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn channel(&self) -> Option<ChannelId> {
        *self.channel.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_channel_config(&self, channel: ChannelId) {
        *self.channel.lock().unwrap_or_else(|e| e.into_inner()) = Some(channel);
    }

    fn visibility(&self) -> Visibility {
        Visibility::from_private(self.private.load(Ordering::SeqCst))
    }

    /// Reconcilers in ascending last-encounter-date order, unset dates first,
    /// profile id as tiebreak
    fn ordered_reconcilers(&self) -> Vec<Arc<Reconciler<M, C>>> {
        let slots = self.slots_guard();
        let mut entries: Vec<(Option<NaiveDate>, ProfileId, Arc<Reconciler<M, C>>)> = slots
            .order
            .iter()
            .filter_map(|profile| {
                slots
                    .map
                    .get(profile)
                    .map(|r| (r.last_date(), profile.clone(), r.clone()))
            })
            .collect();
        entries.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        entries.into_iter().map(|(_, _, r)| r).collect()
    }
}

/// Durable, process-wide record set organized by group
pub struct Store<M: Messaging, C: Clock> {
    state_file: StateFile,
    audit: AuditFile,
    messaging: M,
    renderer: Arc<dyn Renderer>,
    clock: C,
    groups: StdMutex<HashMap<GroupId, Arc<Group<M, C>>>>,
    /// Serializes save/backup to avoid redundant write races
    save_lock: Mutex<()>,
}

impl<M: Messaging, C: Clock> Store<M, C> {
    /// Read the durable file and rebuild groups and reconcilers; starts empty
    /// when no file exists yet
    pub fn load_or_init(
        state_file: StateFile,
        audit: AuditFile,
        messaging: M,
        renderer: Arc<dyn Renderer>,
        clock: C,
    ) -> Result<Self, StoreError> {
        let persisted = state_file.load_or_init()?;
        let mut groups = HashMap::new();
        for (group_id, persisted_group) in persisted.guilds {
            let group = Group::new(
                persisted_group.channel_id(),
                persisted_group.private,
                persisted_group.counter,
            );
            let channel = group.channel();
            let visibility = group.visibility();
            {
                let mut slots = group.slots_guard();
                for (profile, record) in persisted_group.data {
                    let reconciler = Arc::new(Reconciler::new(
                        group_id.clone(),
                        profile.clone(),
                        record,
                        channel,
                        visibility,
                        group.counter.clone(),
                        messaging.clone(),
                        renderer.clone(),
                        clock.clone(),
                    ));
                    slots.order.push(profile.clone());
                    slots.map.insert(profile, reconciler);
                }
            }
            groups.insert(group_id, Arc::new(group));
        }
        tracing::info!(groups = groups.len(), "state loaded");
        Ok(Self {
            state_file,
            audit,
            messaging,
            renderer,
            clock,
            groups: StdMutex::new(groups),
            save_lock: Mutex::new(()),
        })
    }

    fn groups_guard(&self) -> MutexGuard<'_, HashMap<GroupId, Arc<Group<M, C>>>> {
        self.groups.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn group(&self, id: &GroupId) -> Result<Arc<Group<M, C>>, StoreError> {
        self.groups_guard()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::GroupNotFound(id.clone()))
    }

    fn reconciler(
        &self,
        group: &GroupId,
        profile: &ProfileId,
    ) -> Result<Arc<Reconciler<M, C>>, StoreError> {
        let entry = self.group(group)?;
        let found = entry.slots_guard().map.get(profile).cloned();
        found.ok_or_else(|| StoreError::RecordNotFound(profile.clone()))
    }

    pub fn group_exists(&self, group: &GroupId) -> bool {
        self.groups_guard().contains_key(group)
    }

    pub fn record_exists(&self, group: &GroupId, profile: &ProfileId) -> bool {
        self.group(group)
            .map(|g| g.slots_guard().map.contains_key(profile))
            .unwrap_or(false)
    }

    /// Registered group ids in sorted order, for deterministic cursors
    pub fn group_ids(&self) -> Vec<GroupId> {
        let mut ids: Vec<GroupId> = self.groups_guard().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Register a new group; default visibility is private, counter starts
    /// at zero
    pub fn add_group(&self, group: GroupId, channel: ChannelId) -> Result<(), StoreError> {
        let mut groups = self.groups_guard();
        if groups.contains_key(&group) {
            return Err(StoreError::GroupExists(group));
        }
        tracing::info!(%group, %channel, "group registered");
        groups.insert(group, Arc::new(Group::new(Some(channel), true, 0)));
        Ok(())
    }

    pub fn channel(&self, group: &GroupId) -> Result<Option<ChannelId>, StoreError> {
        Ok(self.group(group)?.channel())
    }

    pub fn visibility(&self, group: &GroupId) -> Result<Visibility, StoreError> {
        Ok(self.group(group)?.visibility())
    }

    pub fn counter(&self, group: &GroupId) -> Result<u64, StoreError> {
        Ok(self.group(group)?.counter.load(Ordering::SeqCst))
    }

    /// Point the group at a new channel and move every representation there
    pub async fn set_channel(
        &self,
        group_id: &GroupId,
        channel: ChannelId,
    ) -> Result<(), StoreError> {
        let group = self.group(group_id)?;
        let ordered = {
            let _structural = group.lock.lock().await;
            group.set_channel_config(channel);
            group.ordered_reconcilers()
        };
        tracing::info!(group = %group_id, %channel, records = ordered.len(), "channel changed");
        for reconciler in ordered {
            if let Err(error) = reconciler.set_channel(channel).await {
                tracing::warn!(group = %group_id, %error, "rebind failed");
            }
        }
        Ok(())
    }

    /// Switch the group's visibility and re-render every representation
    pub async fn set_visibility(
        &self,
        group_id: &GroupId,
        visibility: Visibility,
    ) -> Result<(), StoreError> {
        let group = self.group(group_id)?;
        let ordered = {
            let _structural = group.lock.lock().await;
            group.private.store(visibility.is_private(), Ordering::SeqCst);
            group.ordered_reconcilers()
        };
        tracing::info!(group = %group_id, ?visibility, records = ordered.len(), "visibility changed");
        for reconciler in ordered {
            if let Err(error) = reconciler.set_visibility(visibility).await {
                tracing::warn!(group = %group_id, %error, "re-render failed");
            }
        }
        Ok(())
    }

    /// Insert a record, create its reconciler, and trigger the initial check
    pub async fn add_record(
        &self,
        group_id: &GroupId,
        profile: ProfileId,
        record: Record,
    ) -> Result<Option<Location>, StoreError> {
        let group = self.group(group_id)?;
        let reconciler = {
            let _structural = group.lock.lock().await;
            let mut slots = group.slots_guard();
            if slots.map.contains_key(&profile) {
                return Err(StoreError::RecordExists(profile));
            }
            let reconciler = Arc::new(Reconciler::new(
                group_id.clone(),
                profile.clone(),
                record,
                group.channel(),
                group.visibility(),
                group.counter.clone(),
                self.messaging.clone(),
                self.renderer.clone(),
                self.clock.clone(),
            ));
            slots.order.push(profile.clone());
            slots.map.insert(profile.clone(), reconciler.clone());
            tracing::info!(group = %group_id, %profile, "record added");
            reconciler
        };
        Ok(reconciler.check().await?)
    }

    /// Merge fields into a record and replace its representation
    pub async fn update_record(
        &self,
        group_id: &GroupId,
        profile: &ProfileId,
        patch: RecordPatch,
    ) -> Result<Option<Location>, StoreError> {
        let reconciler = self.reconciler(group_id, profile)?;
        Ok(reconciler.set_record_data(patch).await?)
    }

    /// Deep copy of a record
    pub fn get_record(&self, group_id: &GroupId, profile: &ProfileId) -> Result<Record, StoreError> {
        Ok(self.reconciler(group_id, profile)?.snapshot())
    }

    /// Verify or repair the record's representation and report where it lives
    pub async fn representation_location(
        &self,
        group_id: &GroupId,
        profile: &ProfileId,
    ) -> Result<Option<Location>, StoreError> {
        let reconciler = self.reconciler(group_id, profile)?;
        Ok(reconciler.check().await?)
    }

    /// Remove a record: audit the snapshot, drop it from the active set, then
    /// best-effort delete its representation
    pub async fn delete_record(
        &self,
        group_id: &GroupId,
        profile: &ProfileId,
        actor: &str,
    ) -> Result<(), StoreError> {
        let group = self.group(group_id)?;
        let reconciler = {
            let _structural = group.lock.lock().await;
            let snapshot = {
                let slots = group.slots_guard();
                slots
                    .map
                    .get(profile)
                    .ok_or_else(|| StoreError::RecordNotFound(profile.clone()))?
                    .snapshot()
            };
            self.audit
                .append(group_id, AuditEntry(actor.to_string(), profile.clone(), snapshot))?;
            let mut slots = group.slots_guard();
            slots.order.retain(|p| p != profile);
            slots
                .map
                .remove(profile)
                .ok_or_else(|| StoreError::RecordNotFound(profile.clone()))?
        };
        reconciler.retire().await;
        tracing::info!(group = %group_id, %profile, actor, "record deleted");
        Ok(())
    }

    /// Tracked profile ids in insertion order
    pub fn list_ids(&self, group_id: &GroupId) -> Result<Vec<ProfileId>, StoreError> {
        Ok(self.group(group_id)?.slots_guard().order.clone())
    }

    /// Compare polled external data against stored records and resync where
    /// they differ or the representation is missing. Per-record failures are
    /// logged and skipped.
    pub async fn reconcile_drift(
        &self,
        group_id: &GroupId,
        updates: &HashMap<ProfileId, Option<ProfileSummary>>,
    ) -> Result<(), StoreError> {
        for profile in self.list_ids(group_id)? {
            let Some(Some(summary)) = updates.get(&profile) else {
                continue;
            };
            // Deleted out from under the poll; skip
            let Ok(reconciler) = self.reconciler(group_id, &profile) else {
                continue;
            };
            let current = reconciler.snapshot();
            let mut patch = RecordPatch::default();
            if summary.name != current.name {
                let mut names = current.old_names.clone();
                names.push(summary.name.clone());
                patch.name = Some(summary.name.clone());
                patch.old_names = Some(names);
            }
            if summary.url != current.url {
                patch.url = Some(summary.url.clone());
            }
            if summary.avatar != current.avatar {
                patch.avatar = Some(summary.avatar.clone());
            }
            if patch.is_empty() && !reconciler.is_missing().await {
                continue;
            }
            if let Err(error) = reconciler.set_record_data(patch).await {
                tracing::warn!(group = %group_id, %profile, %error, "drift resync failed");
            }
        }
        Ok(())
    }

    /// Verify every record's representation, repairing as needed
    pub async fn sweep_group(&self, group_id: &GroupId) -> Result<(), StoreError> {
        let group = self.group(group_id)?;
        let ordered = {
            let _structural = group.lock.lock().await;
            group.ordered_reconcilers()
        };
        tracing::debug!(group = %group_id, records = ordered.len(), "sweep started");
        for reconciler in ordered {
            if let Err(error) = reconciler.check().await {
                tracing::warn!(group = %group_id, %error, "sweep check failed");
            }
        }
        Ok(())
    }

    fn snapshot_state(&self) -> PersistedState {
        let groups: Vec<(GroupId, Arc<Group<M, C>>)> = self
            .groups_guard()
            .iter()
            .map(|(id, group)| (id.clone(), group.clone()))
            .collect();
        let mut state = PersistedState::default();
        for (id, group) in groups {
            let data = {
                let slots = group.slots_guard();
                slots
                    .order
                    .iter()
                    .filter_map(|p| slots.map.get(p).map(|r| (p.clone(), r.snapshot())))
                    .collect()
            };
            state.guilds.insert(
                id,
                PersistedGroup {
                    channel: group.channel().map(|c| c.0).unwrap_or(0),
                    private: group.private.load(Ordering::SeqCst),
                    counter: group.counter.load(Ordering::SeqCst),
                    data,
                },
            );
        }
        state
    }

    /// Atomically overwrite the primary state file, stamping the save time
    pub async fn save(&self) -> Result<(), StoreError> {
        let _serialize = self.save_lock.lock().await;
        let mut state = self.snapshot_state();
        state.touch(self.clock.timestamp());
        self.state_file.save(&state)?;
        tracing::debug!(groups = state.guilds.len(), "state saved");
        Ok(())
    }

    /// Write a timestamped immutable copy of the state
    pub async fn backup(&self) -> Result<PathBuf, StoreError> {
        let _serialize = self.save_lock.lock().await;
        let mut state = self.snapshot_state();
        state.touch(self.clock.timestamp());
        let path = self.state_file.backup(&state, self.clock.timestamp())?;
        tracing::info!(path = %path.display(), "backup written");
        Ok(path)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
