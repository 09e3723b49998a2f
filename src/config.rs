//! Runtime configuration, read from the environment with sane defaults.

use crate::detect::forest::ForestParams;
use std::time::Duration;

/// Engine configuration surface. Every knob has a default so the service
/// runs with no environment at all.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Seconds between retraining cycles (`TRAIN_INTERVAL`).
    pub training_interval_secs: u64,
    /// Minimum corpus size accepted for training (`MIN_TRAINING_SAMPLES`).
    pub min_training_samples: usize,
    /// Scores below this are anomalies (`ANOMALY_THRESHOLD`).
    pub anomaly_threshold: f64,
    /// Bucket count for categorical feature hashing (`FEATURE_BUCKETS`).
    pub feature_buckets: u32,
    /// Expected anomalous fraction of the corpus (`CONTAMINATION`).
    pub contamination: f64,
    /// RNG seed for tree construction (`MODEL_SEED`).
    pub model_seed: u64,
    /// Path for the persisted model snapshot (`MODEL_FILE`).
    pub model_file: String,
    /// Shared secret for the X-API-KEY header check (`API_KEY`).
    pub api_key: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            training_interval_secs: 60,
            min_training_samples: 10,
            anomaly_threshold: 0.0,
            feature_buckets: 1000,
            contamination: 0.05,
            model_seed: 42,
            model_file: "data/model.json".to_string(),
            api_key: "supersecret".to_string(),
        }
    }
}

impl EngineConfig {
    /// Build a config from environment variables, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            training_interval_secs: env_parse("TRAIN_INTERVAL", defaults.training_interval_secs),
            min_training_samples: env_parse("MIN_TRAINING_SAMPLES", defaults.min_training_samples),
            anomaly_threshold: env_parse("ANOMALY_THRESHOLD", defaults.anomaly_threshold),
            feature_buckets: env_parse("FEATURE_BUCKETS", defaults.feature_buckets),
            contamination: env_parse("CONTAMINATION", defaults.contamination),
            model_seed: env_parse("MODEL_SEED", defaults.model_seed),
            model_file: std::env::var("MODEL_FILE").unwrap_or(defaults.model_file),
            api_key: std::env::var("API_KEY").unwrap_or(defaults.api_key),
        }
    }

    pub fn training_interval(&self) -> Duration {
        Duration::from_secs(self.training_interval_secs.max(1))
    }

    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            contamination: self.contamination,
            seed: self.model_seed,
            min_samples: self.min_training_samples,
            ..ForestParams::default()
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.training_interval_secs, 60);
        assert_eq!(config.min_training_samples, 10);
        assert_eq!(config.anomaly_threshold, 0.0);
        assert_eq!(config.feature_buckets, 1000);
        assert_eq!(config.contamination, 0.05);
    }

    #[test]
    fn test_forest_params_carry_config() {
        let config = EngineConfig {
            min_training_samples: 25,
            model_seed: 7,
            ..EngineConfig::default()
        };
        let params = config.forest_params();
        assert_eq!(params.min_samples, 25);
        assert_eq!(params.seed, 7);
        assert_eq!(params.n_trees, 100);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = EngineConfig {
            training_interval_secs: 0,
            ..EngineConfig::default()
        };
        assert_eq!(config.training_interval(), Duration::from_secs(1));
    }
}
