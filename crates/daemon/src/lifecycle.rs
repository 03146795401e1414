// SPDX-License-Identifier: MIT

//! Daemon lifecycle: startup, pid-file lock, shutdown with a final save.
//!
//! Standalone runs wire the in-memory adapters; a platform client plugs in
//! at the same seams.

use fs2::FileExt;
use std::fs::File;
use std::io::Write;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};
use warden_core::{
    CardRenderer, Clock, Config, ConfigError, Leveler, MemoryMessaging, MemoryProfiles,
    PromptSession, ReasonTag, SessionTable, SystemClock,
};
use warden_engine::{Scheduler, SchedulerHandle, Store, StoreError, TracingStatus};
use warden_storage::{AuditFile, PermissionsFile, StateFile, StorageError};

/// The store as wired for standalone runs
pub type StandaloneStore = Store<MemoryMessaging, SystemClock>;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to acquire pid lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A started daemon: the shared store, the permission leveler, and the
/// running scheduler loops
pub struct Daemon {
    config: Config,
    // Held for the exclusive pid lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    store: Arc<StandaloneStore>,
    leveler: Leveler,
    permissions: PermissionsFile,
    sessions: SessionTable,
    clock: SystemClock,
    shutdown: watch::Sender<bool>,
    scheduler: SchedulerHandle,
}

impl Daemon {
    /// Bring the service up: lock the pid file, load durable state, start
    /// the scheduler loops
    pub fn startup(config: Config) -> Result<Self, LifecycleError> {
        std::fs::create_dir_all(&config.data_dir)?;
        std::fs::create_dir_all(&config.backup_dir)?;

        // Exclusive lock before any state file is touched
        let mut lock_file = File::create(config.data_dir.join("wardend.pid"))?;
        lock_file
            .try_lock_exclusive()
            .map_err(LifecycleError::LockFailed)?;
        writeln!(lock_file, "{}", std::process::id())?;

        let state_file = StateFile::new(config.state_path(), config.backup_dir.clone());
        let audit = AuditFile::new(config.audit_path());
        let permissions = PermissionsFile::new(config.permissions_path());

        let clock = SystemClock;
        let store = Arc::new(StandaloneStore::load_or_init(
            state_file,
            audit,
            MemoryMessaging::new(),
            Arc::new(CardRenderer),
            clock.clone(),
        )?);
        let leveler = Leveler::new(permissions.load_or_init()?);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let scheduler = Scheduler::new(
            store.clone(),
            MemoryProfiles::new(),
            Arc::new(TracingStatus),
            &config,
        )
        .spawn(shutdown_rx);

        info!(data_dir = %config.data_dir.display(), "daemon started");
        Ok(Self {
            config,
            lock_file,
            store,
            leveler,
            permissions,
            sessions: SessionTable::new(),
            clock,
            shutdown,
            scheduler,
        })
    }

    pub fn store(&self) -> Arc<StandaloneStore> {
        self.store.clone()
    }

    pub fn leveler(&self) -> &Leveler {
        &self.leveler
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// Open a confirmation prompt expiring after the configured timeout
    pub fn open_prompt(
        &self,
        prompt_id: impl Into<String>,
        initiator: impl Into<String>,
        preselected: &[ReasonTag],
        may_delete: bool,
    ) {
        let deadline = self.clock.now() + self.config.prompt_timeout;
        self.sessions.open(
            prompt_id,
            PromptSession::new(initiator, preselected, may_delete, deadline),
        );
    }

    /// Stop the scheduler loops (their final save runs before they exit),
    /// persist the permission table, and release the pid file
    pub async fn shutdown(self) -> Result<(), LifecycleError> {
        info!("shutting down");
        // Receivers observe the flip between ticks; a send error just means
        // every loop already exited
        let _ = self.shutdown.send(true);
        self.scheduler.join().await;

        self.permissions.save(self.leveler.table())?;

        let pid_path = self.config.data_dir.join("wardend.pid");
        if let Err(error) = std::fs::remove_file(&pid_path) {
            warn!(%error, "failed to remove pid file");
        }
        info!("shutdown complete");
        Ok(())
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
