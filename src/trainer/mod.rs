//! Background training -- periodically retrain the isolation forest over
//! the full event history and atomically publish the new model.
//!
//! The loop runs in exactly one spawned task and trains inline, so two
//! cycles can never overlap: a tick that fires while a cycle is still
//! running is absorbed by the interval's missed-tick handling. A failed
//! cycle never touches the published model; the next tick retries.

use crate::config::EngineConfig;
use crate::detect::features::FeatureEncoder;
use crate::detect::forest::{ForestParams, IsolationForest};
use crate::detect::model::{ModelHolder, ModelState};
use crate::detect::DetectError;
use crate::storage::{self, Pool};
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// What one training cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A new model was published, trained on this many events.
    Trained { count: usize },
    /// Too little data; the previously-published model (if any) stays.
    Skipped { have: usize, needed: usize },
}

pub struct Trainer {
    pool: Pool,
    holder: Arc<ModelHolder>,
    encoder: FeatureEncoder,
    params: ForestParams,
    model_file: String,
}

impl Trainer {
    pub fn new(pool: Pool, holder: Arc<ModelHolder>, config: &EngineConfig) -> Self {
        Self {
            pool,
            holder,
            encoder: FeatureEncoder::new(config.feature_buckets),
            params: config.forest_params(),
            model_file: config.model_file.clone(),
        }
    }

    /// Run one full training cycle: load all events, encode, fit, publish.
    ///
    /// The new `ModelState` is constructed completely off to the side and
    /// handed to the holder in a single swap; scoring calls in flight keep
    /// their old snapshot.
    pub async fn train_cycle(&self) -> Result<CycleOutcome> {
        let pool = self.pool.clone();
        let encoder = self.encoder.clone();
        let params = self.params.clone();

        // Corpus load and tree building both run off the async workers.
        let fitted = tokio::task::spawn_blocking(
            move || -> Result<(usize, Result<IsolationForest, DetectError>)> {
                let events = storage::load_all_events(&pool)?;
                let vectors: Vec<Vec<f64>> =
                    events.iter().map(|e| encoder.encode(e)).collect();
                let count = vectors.len();
                Ok((count, IsolationForest::fit(&vectors, &params)))
            },
        )
        .await??;

        match fitted {
            (count, Ok(forest)) => {
                let state = ModelState {
                    forest,
                    trained_at: Utc::now(),
                    trained_on_count: count,
                };

                // Persist before publishing; a write failure only costs
                // restart recovery, not the in-memory swap.
                if let Err(e) = state.save(&self.model_file) {
                    warn!(path = %self.model_file, "Failed to persist model: {:#}", e);
                }

                let trained_at = state.trained_at;
                self.holder.publish(state);

                let details = format!(
                    "trained on {} events; {} trees, subsample {}",
                    count, self.params.n_trees, self.params.sample_size
                );
                let pool = self.pool.clone();
                tokio::task::spawn_blocking(move || {
                    storage::insert_training_log(&pool, trained_at, count, &details)
                })
                .await??;

                info!(%count, "Model retrained and published");
                Ok(CycleOutcome::Trained { count })
            }
            (_, Err(DetectError::InsufficientData { needed, have })) => {
                debug!(%have, %needed, "Not enough events to train, keeping current model");
                Ok(CycleOutcome::Skipped { have, needed })
            }
            (_, Err(e)) => Err(e.into()),
        }
    }
}

/// Main training loop. Ticks at a fixed interval; the first tick fires
/// immediately so a freshly-started process trains as soon as it has data.
/// Errors are logged and the loop keeps ticking -- nothing here is fatal.
pub async fn run_trainer_loop(trainer: Trainer, interval: Duration) {
    info!(interval_secs = interval.as_secs(), "Training scheduler started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match trainer.train_cycle().await {
            Ok(CycleOutcome::Trained { .. }) | Ok(CycleOutcome::Skipped { .. }) => {}
            Err(e) => {
                error!("Training cycle failed: {:#}", e);
            }
        }
    }
}
