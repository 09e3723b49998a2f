//! Scoring service -- encode one event, score it against the current
//! model snapshot, and record the detection for audit.

use crate::config::EngineConfig;
use crate::detect::features::FeatureEncoder;
use crate::detect::model::ModelHolder;
use crate::detect::{Analysis, DetectError, Event, Prediction};
use crate::storage::{self, DetectionLogEntry, Pool};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub struct ScoringService {
    pool: Pool,
    holder: Arc<ModelHolder>,
    encoder: FeatureEncoder,
    threshold: f64,
}

impl ScoringService {
    pub fn new(pool: Pool, holder: Arc<ModelHolder>, config: &EngineConfig) -> Self {
        Self {
            pool,
            holder,
            encoder: FeatureEncoder::new(config.feature_buckets),
            threshold: config.anomaly_threshold,
        }
    }

    /// Score one event against the currently-published model.
    ///
    /// The model snapshot is captured exactly once; a training run
    /// publishing mid-call cannot change the result. Fails with
    /// `ModelNotReady` until the first training succeeds. On success one
    /// detection-log row is written as a side effect.
    pub async fn analyze(&self, event: &Event) -> Result<Analysis, DetectError> {
        let Some(model) = self.holder.snapshot() else {
            return Err(DetectError::ModelNotReady);
        };

        let vector = self.encoder.encode(event);
        let score = model.forest.score(&vector);
        let prediction = if score < self.threshold {
            Prediction::Anomaly
        } else {
            Prediction::Normal
        };

        debug!(
            ip = %event.ip_address,
            %score,
            %prediction,
            "Event scored"
        );

        let entry = DetectionLogEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            ip_address: event.ip_address.clone(),
            username: event.username.clone(),
            event_type: event.event_type.clone(),
            event_value: event.event_value,
            anomaly_score: score,
            prediction,
            raw_event: serde_json::to_value(event).map_err(anyhow::Error::from)?,
        };

        // The audit write is blocking SQLite work; keep it off the async
        // workers.
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || storage::insert_detection_log(&pool, &entry))
            .await
            .map_err(anyhow::Error::from)??;

        Ok(Analysis {
            score,
            prediction,
            model_trained_at: Some(model.trained_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::forest::IsolationForest;
    use crate::detect::model::ModelState;
    use chrono::TimeZone;

    fn service_with_pool() -> (tempfile::TempDir, ScoringService, Arc<ModelHolder>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let pool = storage::open_pool(path.to_str().unwrap()).unwrap();
        let holder = Arc::new(ModelHolder::new());
        let service = ScoringService::new(pool, holder.clone(), &EngineConfig::default());
        (dir, service, holder)
    }

    fn sample_event(value: f64) -> Event {
        Event {
            ip_address: "192.168.1.100".to_string(),
            username: "jdoe".to_string(),
            event_type: "login_attempt".to_string(),
            event_value: value,
            timestamp: Utc.with_ymd_and_hms(2025, 2, 5, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_analyze_before_training_is_model_not_ready() {
        let (_dir, service, _holder) = service_with_pool();
        let err = service.analyze(&sample_event(1.0)).await.unwrap_err();
        assert!(matches!(err, DetectError::ModelNotReady));
    }

    #[tokio::test]
    async fn test_analyze_after_publish_succeeds_and_logs() {
        let (_dir, service, holder) = service_with_pool();

        let config = EngineConfig::default();
        let encoder = FeatureEncoder::new(config.feature_buckets);
        let vectors: Vec<Vec<f64>> = (0..50)
            .map(|i| encoder.encode(&sample_event(i as f64 / 50.0)))
            .collect();
        let trained_at = Utc::now();
        holder.publish(ModelState {
            forest: IsolationForest::fit(&vectors, &config.forest_params()).unwrap(),
            trained_at,
            trained_on_count: vectors.len(),
        });

        let analysis = service.analyze(&sample_event(0.5)).await.unwrap();
        assert_eq!(analysis.model_trained_at, Some(trained_at));

        // The audit side effect landed.
        let logs = storage::list_detection_logs(&service.pool, 20).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].event_value, 0.5);
        assert_eq!(logs[0].anomaly_score, analysis.score);
    }

    #[tokio::test]
    async fn test_analyze_is_idempotent_between_trainings() {
        let (_dir, service, holder) = service_with_pool();

        let config = EngineConfig::default();
        let encoder = FeatureEncoder::new(config.feature_buckets);
        let vectors: Vec<Vec<f64>> = (0..50)
            .map(|i| encoder.encode(&sample_event(i as f64 / 50.0)))
            .collect();
        holder.publish(ModelState {
            forest: IsolationForest::fit(&vectors, &config.forest_params()).unwrap(),
            trained_at: Utc::now(),
            trained_on_count: vectors.len(),
        });

        let first = service.analyze(&sample_event(0.5)).await.unwrap();
        let second = service.analyze(&sample_event(0.5)).await.unwrap();
        assert_eq!(first.score, second.score);
        assert_eq!(first.prediction, second.prediction);
    }
}
