//! Published model state and the swap point between training and scoring.

use crate::detect::forest::IsolationForest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

/// An immutable trained-model snapshot. A retrain produces a new
/// `ModelState`; nothing ever mutates a published one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelState {
    pub forest: IsolationForest,
    pub trained_at: DateTime<Utc>,
    pub trained_on_count: usize,
}

impl ModelState {
    /// Persist the snapshot as JSON so a restarted process can serve
    /// without retraining from empty. Write-then-rename keeps the last
    /// good snapshot intact if the process dies mid-write.
    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let target = Path::new(path);
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = target.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec(self)?)?;
        std::fs::rename(&tmp, target)?;
        Ok(())
    }

    /// Load a previously persisted snapshot. Missing or unparseable files
    /// are tolerated -- the process starts untrained and the next training
    /// cycle repairs the situation.
    pub fn load(path: &str) -> Option<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => {
                info!(%path, "No persisted model found, starting untrained");
                return None;
            }
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(state) => {
                info!(%path, trained_at = %state.trained_at, "Restored persisted model");
                Some(state)
            }
            Err(e) => {
                warn!(%path, "Failed to parse persisted model, starting untrained: {}", e);
                None
            }
        }
    }
}

/// Process-wide holder of the currently-published model.
///
/// Readers take a cheap `Arc` clone and keep scoring against that snapshot
/// even while a newer model is published; publishing is a single pointer
/// swap under a write lock held only for the swap itself. A reader never
/// observes a half-updated model.
#[derive(Debug, Default)]
pub struct ModelHolder {
    current: RwLock<Option<Arc<ModelState>>>,
}

impl ModelHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current model, or `None` if no training has succeeded yet.
    pub fn snapshot(&self) -> Option<Arc<ModelState>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Atomically replace the published model. The fully-constructed state
    /// goes in as one unit; concurrent readers see either the old snapshot
    /// or the new one, never a mixture.
    pub fn publish(&self, state: ModelState) -> Arc<ModelState> {
        let state = Arc::new(state);
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Some(state.clone());
        state
    }

    pub fn is_trained(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn last_trained_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot().map(|s| s.trained_at)
    }
}
