//! Anomaly detection core -- feature encoding, isolation forest, scoring.

pub mod engine;
pub mod features;
pub mod forest;
pub mod model;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("model not yet trained, try again later")]
    ModelNotReady,
    #[error("insufficient training data: need {needed} samples, have {have}")]
    InsufficientData { needed: usize, have: usize },
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// A validated security event. Immutable once constructed; the ingestion
/// boundary fills in `timestamp` with the submission time when the caller
/// omits it, so the encoder always sees a concrete instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub ip_address: String,
    pub username: String,
    pub event_type: String,
    pub event_value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Binary verdict derived from an anomaly score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prediction {
    Normal,
    Anomaly,
}

impl std::fmt::Display for Prediction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Prediction::Normal => write!(f, "normal"),
            Prediction::Anomaly => write!(f, "anomaly"),
        }
    }
}

impl std::str::FromStr for Prediction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Prediction::Normal),
            "anomaly" => Ok(Prediction::Anomaly),
            other => anyhow::bail!("unknown prediction label '{}'", other),
        }
    }
}

/// Outcome of scoring one event against the current model.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub score: f64,
    pub prediction: Prediction,
    pub model_trained_at: Option<DateTime<Utc>>,
}
