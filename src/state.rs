//! The local calendar store, persisted as a JSON snapshot between runs.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use calsync_core::clock::SystemClock;
use calsync_core::connectivity::StaticConnectivity;
use calsync_core::store::MemoryStore;
use calsync_core::transport::SubprocessTransport;
use calsync_core::{SyncContext, SyncEngine};

use crate::config::CalsyncConfig;

pub struct State {
    path: PathBuf,
    pub store: Arc<MemoryStore>,
}

impl State {
    pub fn open(config: &CalsyncConfig) -> Result<Self> {
        let path = config.state_path();
        let store = MemoryStore::load(&path)
            .with_context(|| format!("Could not load state from {}", path.display()))?;
        tracing::debug!(path = %path.display(), "state loaded");

        Ok(State {
            path,
            store: Arc::new(store),
        })
    }

    /// Wire an engine over this store.
    pub fn engine(&self, config: &CalsyncConfig) -> SyncEngine {
        let ctx = SyncContext::new(
            self.store.clone(),
            Arc::new(SubprocessTransport::from_name(&config.transport)),
            Arc::new(StaticConnectivity::new(!config.offline)),
            Arc::new(SystemClock),
        );
        SyncEngine::new(ctx)
    }

    pub fn save(&self) -> Result<()> {
        self.store
            .save(&self.path)
            .with_context(|| format!("Could not save state to {}", self.path.display()))
    }
}
