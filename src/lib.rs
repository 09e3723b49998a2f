//! threatsentry -- continuously-retrained anomaly detection for security
//! event streams.
//!
//! This crate ingests discrete security events, keeps an isolation-forest
//! model retrained over them in the background, and scores new events
//! against the currently-published model snapshot.

pub mod api;
pub mod config;
pub mod detect;
pub mod storage;
pub mod trainer;

use crate::api::state::AppState;
use crate::config::EngineConfig;
use crate::detect::engine::ScoringService;
use crate::detect::model::{ModelHolder, ModelState};
use anyhow::Result;
use std::sync::Arc;

/// Start the threatsentry daemon: API server plus background trainer.
pub async fn serve(bind: &str, db_path: &str, config: EngineConfig) -> Result<()> {
    // 1. Initialize Storage
    tracing::info!(%db_path, "Initializing database");
    let pool = storage::open_pool(db_path)?;

    // 2. Restore any persisted model so a restart serves without retraining
    let holder = Arc::new(ModelHolder::new());
    if let Some(state) = ModelState::load(&config.model_file) {
        holder.publish(state);
    }

    // 3. Start the training scheduler (background task)
    let trainer = trainer::Trainer::new(pool.clone(), holder.clone(), &config);
    let interval = config.training_interval();
    tokio::spawn(async move {
        trainer::run_trainer_loop(trainer, interval).await;
    });

    // 4. Start API Server
    let scoring = Arc::new(ScoringService::new(pool.clone(), holder.clone(), &config));
    let state = AppState {
        pool,
        holder,
        scoring,
        config: Arc::new(config),
    };
    let app = api::router(state);

    let addr: std::net::SocketAddr = bind.parse()?;
    tracing::info!(%addr, "threatsentry listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
