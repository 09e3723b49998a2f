use crate::config::EngineConfig;
use crate::detect::engine::ScoringService;
use crate::detect::model::ModelHolder;
use crate::storage::Pool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub holder: Arc<ModelHolder>,
    pub scoring: Arc<ScoringService>,
    pub config: Arc<EngineConfig>,
}
