// SPDX-License-Identifier: MIT

//! The four periodic drivers sharing the store: poll external data, sweep
//! reconciliation, snapshot persistence, and backup.
//!
//! Each tick produces an explicit logged result; a failed tick never kills
//! its loop. All loops stop together on the shutdown signal, and a final
//! unconditional save captures state accrued since the last snapshot.

use crate::store::{Store, StoreError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use warden_core::{Clock, Config, GroupId, Messaging, ProfileError, ProfileProvider};

#[derive(Debug, Error)]
pub(crate) enum TickError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

/// Reentrant busy indicator: externally idle only when no task is inside
/// a unit of work
#[derive(Default)]
pub struct Activity {
    active: AtomicUsize,
}

impl Activity {
    /// Returns the depth after entering
    pub fn enter(&self) -> usize {
        self.active.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns the depth after leaving; zero means the busy-to-idle edge
    pub fn exit(&self) -> usize {
        self.active.fetch_sub(1, Ordering::SeqCst) - 1
    }

    pub fn is_busy(&self) -> bool {
        self.active.load(Ordering::SeqCst) > 0
    }
}

/// Receives the idle report emitted on every busy-to-idle edge
pub trait StatusSink: Send + Sync + 'static {
    fn report_idle(&self, active_profiles: Option<u64>);
}

/// Default sink: structured log line
pub struct TracingStatus;

impl StatusSink for TracingStatus {
    fn report_idle(&self, active_profiles: Option<u64>) {
        tracing::info!(?active_profiles, "idle");
    }
}

/// Test sink recording every report
#[derive(Default)]
pub struct RecordingStatus {
    reports: StdMutex<Vec<Option<u64>>>,
}

impl RecordingStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Option<u64>> {
        self.reports.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl StatusSink for RecordingStatus {
    fn report_idle(&self, active_profiles: Option<u64>) {
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(active_profiles);
    }
}

/// Owns the four periodic task loops
pub struct Scheduler<M: Messaging, P: ProfileProvider, C: Clock> {
    store: Arc<Store<M, C>>,
    provider: P,
    status: Arc<dyn StatusSink>,
    activity: Arc<Activity>,
    poll_interval: Duration,
    sweep_interval: Duration,
    snapshot_interval: Duration,
    backup_interval: Duration,
}

/// Join handle over the spawned task loops
pub struct SchedulerHandle {
    handles: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Wait for every loop to observe shutdown and finish
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(error) = handle.await {
                tracing::warn!(%error, "scheduler task aborted");
            }
        }
    }
}

impl<M: Messaging, P: ProfileProvider, C: Clock> Scheduler<M, P, C> {
    pub fn new(
        store: Arc<Store<M, C>>,
        provider: P,
        status: Arc<dyn StatusSink>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            provider,
            status,
            activity: Arc::new(Activity::default()),
            poll_interval: config.poll_interval,
            sweep_interval: config.sweep_interval,
            snapshot_interval: config.snapshot_interval,
            backup_interval: config.backup_interval,
        }
    }

    pub fn activity(&self) -> Arc<Activity> {
        self.activity.clone()
    }

    /// Spawn all four loops; they stop when the shutdown signal flips
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> SchedulerHandle {
        let handles = vec![
            tokio::spawn(Self::poll_loop(
                self.store.clone(),
                self.provider.clone(),
                self.status.clone(),
                self.activity.clone(),
                self.poll_interval,
                shutdown.clone(),
            )),
            tokio::spawn(Self::sweep_loop(
                self.store.clone(),
                self.provider.clone(),
                self.status.clone(),
                self.activity.clone(),
                self.sweep_interval,
                shutdown.clone(),
            )),
            tokio::spawn(Self::snapshot_loop(
                self.store.clone(),
                self.snapshot_interval,
                shutdown.clone(),
            )),
            tokio::spawn(Self::backup_loop(
                self.store.clone(),
                self.backup_interval,
                shutdown,
            )),
        ];
        tracing::info!("scheduler started");
        SchedulerHandle { handles }
    }

    async fn poll_loop(
        store: Arc<Store<M, C>>,
        provider: P,
        status: Arc<dyn StatusSink>,
        activity: Arc<Activity>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cursor = 0usize;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match poll_tick(&store, &provider, status.as_ref(), &activity, &mut cursor).await {
                        Ok(Some(group)) => tracing::debug!(%group, "poll tick complete"),
                        Ok(None) => tracing::debug!("poll tick skipped, no groups"),
                        Err(error) => tracing::warn!(%error, "poll tick failed"),
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    }

    async fn sweep_loop(
        store: Arc<Store<M, C>>,
        provider: P,
        status: Arc<dyn StatusSink>,
        activity: Arc<Activity>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cursor = 0usize;
        // The interval fires once immediately; the sweep sits that one out
        let mut first = true;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if first {
                        first = false;
                        tracing::debug!("sweep skipped first tick");
                        continue;
                    }
                    match sweep_tick(&store, &provider, status.as_ref(), &activity, &mut cursor).await {
                        Ok(Some(group)) => tracing::debug!(%group, "sweep tick complete"),
                        Ok(None) => tracing::debug!("sweep tick skipped, no groups"),
                        Err(error) => tracing::warn!(%error, "sweep tick failed"),
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    }

    async fn snapshot_loop(
        store: Arc<Store<M, C>>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(error) = store.save().await {
                        tracing::warn!(%error, "snapshot tick failed");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        match store.save().await {
            Ok(()) => tracing::info!("final state saved"),
            Err(error) => tracing::error!(%error, "final save failed"),
        }
    }

    async fn backup_loop(
        store: Arc<Store<M, C>>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(error) = store.backup().await {
                        tracing::warn!(%error, "backup tick failed");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    }
}

/// One poll pass: advance the cursor, fetch summaries for the selected
/// group's ids in provider-limit chunks, reconcile drift. The activity
/// bracket reports the busy-to-idle edge regardless of the outcome.
pub(crate) async fn poll_tick<M: Messaging, P: ProfileProvider, C: Clock>(
    store: &Store<M, C>,
    provider: &P,
    status: &dyn StatusSink,
    activity: &Activity,
    cursor: &mut usize,
) -> Result<Option<GroupId>, TickError> {
    let groups = store.group_ids();
    if groups.is_empty() {
        *cursor = 0;
        return Ok(None);
    }
    let index = *cursor % groups.len();
    *cursor = (index + 1) % groups.len();
    let group = groups[index].clone();

    activity.enter();
    let outcome = poll_group(store, provider, &group).await;
    if activity.exit() == 0 {
        status.report_idle(provider.active_count().await);
    }
    outcome?;
    Ok(Some(group))
}

async fn poll_group<M: Messaging, P: ProfileProvider, C: Clock>(
    store: &Store<M, C>,
    provider: &P,
    group: &GroupId,
) -> Result<(), TickError> {
    let ids = store.list_ids(group)?;
    if ids.is_empty() {
        return Ok(());
    }
    let updates = provider.summaries(&ids).await?;
    store.reconcile_drift(group, &updates).await?;
    Ok(())
}

/// One sweep pass over the group selected by the independent cursor. The
/// activity bracket keeps the indicator busy while the sweep runs, even when
/// it overlaps a poll.
pub(crate) async fn sweep_tick<M: Messaging, P: ProfileProvider, C: Clock>(
    store: &Store<M, C>,
    provider: &P,
    status: &dyn StatusSink,
    activity: &Activity,
    cursor: &mut usize,
) -> Result<Option<GroupId>, TickError> {
    let groups = store.group_ids();
    if groups.is_empty() {
        *cursor = 0;
        return Ok(None);
    }
    let index = *cursor % groups.len();
    *cursor = (index + 1) % groups.len();
    let group = groups[index].clone();

    activity.enter();
    let outcome = store.sweep_group(&group).await;
    if activity.exit() == 0 {
        status.report_idle(provider.active_count().await);
    }
    outcome?;
    Ok(Some(group))
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
