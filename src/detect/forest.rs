//! Isolation forest -- unsupervised anomaly scoring over feature vectors.
//!
//! An ensemble of randomized partitioning trees. Anomalous points isolate
//! in fewer splits than normal points, so a shorter average path length
//! means a more anomalous sample.

use crate::detect::DetectError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Euler-Mascheroni constant, used in the average-path normalization term.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Training parameters for the forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of randomized trees in the ensemble.
    pub n_trees: usize,
    /// Per-tree subsample size (clamped to the corpus size).
    pub sample_size: usize,
    /// Expected fraction of anomalous points in the training corpus; sets
    /// the score calibration offset.
    pub contamination: f64,
    /// RNG seed. Training over the same corpus with the same seed yields
    /// the same forest.
    pub seed: u64,
    /// Minimum corpus size accepted for training.
    pub min_samples: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            sample_size: 256,
            contamination: 0.05,
            seed: 42,
            min_samples: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Internal {
        feature: usize,
        split: f64,
        /// Observed range of the split feature over this partition's sample.
        min: f64,
        max: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    External {
        size: usize,
    },
}

/// A trained isolation forest. Immutable after `fit`; scoring is read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
    /// Score at the contamination quantile of the training corpus. The
    /// published score is raw minus offset, so roughly `contamination` of
    /// training points score below zero.
    offset: f64,
}

impl IsolationForest {
    /// Fit a forest over the corpus. Rejects corpora smaller than
    /// `params.min_samples`: a model trained on near-empty data is
    /// degenerate and must not be published.
    pub fn fit(data: &[Vec<f64>], params: &ForestParams) -> Result<Self, DetectError> {
        // Even with the minimum configured away, an empty corpus can never
        // produce a model.
        let needed = params.min_samples.max(1);
        if data.len() < needed {
            return Err(DetectError::InsufficientData {
                needed,
                have: data.len(),
            });
        }

        let rows: Vec<&[f64]> = data.iter().map(|v| v.as_slice()).collect();
        let sample_size = params.sample_size.min(rows.len()).max(2);
        let height_limit = (sample_size as f64).log2().ceil() as usize;

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut trees = Vec::with_capacity(params.n_trees);
        for _ in 0..params.n_trees {
            let sample: Vec<&[f64]> = rows
                .choose_multiple(&mut rng, sample_size)
                .copied()
                .collect();
            trees.push(build_tree(&sample, 0, height_limit, &mut rng));
        }

        let mut forest = Self {
            trees,
            sample_size,
            offset: 0.0,
        };

        // Calibrate: the offset is the contamination quantile of raw scores
        // over the full training corpus.
        let mut scores: Vec<f64> = rows.iter().map(|v| forest.raw_score(v)).collect();
        scores.sort_by(|a, b| a.total_cmp(b));
        let idx = ((scores.len() as f64) * params.contamination.clamp(0.0, 0.5)) as usize;
        forest.offset = scores[idx.min(scores.len() - 1)];

        Ok(forest)
    }

    /// Calibrated anomaly score. Lower is more anomalous; values near or
    /// below zero fall in the anomalous tail of the training distribution.
    pub fn score(&self, vector: &[f64]) -> f64 {
        self.raw_score(vector) - self.offset
    }

    /// Uncalibrated depth-based score in roughly `[-0.5, 0.5]`.
    fn raw_score(&self, vector: &[f64]) -> f64 {
        let total: f64 = self
            .trees
            .iter()
            .map(|t| path_length(t, vector, 0))
            .sum();
        let avg_path = total / self.trees.len() as f64;
        0.5 - 2f64.powf(-avg_path / c_factor(self.sample_size))
    }
}

fn build_tree(sample: &[&[f64]], depth: usize, limit: usize, rng: &mut StdRng) -> Node {
    if depth >= limit || sample.len() <= 1 {
        return Node::External {
            size: sample.len(),
        };
    }

    // Only features with spread in this partition can split it.
    let arity = sample[0].len();
    let ranges: Vec<(usize, f64, f64)> = (0..arity)
        .filter_map(|f| {
            let min = sample.iter().map(|v| v[f]).fold(f64::INFINITY, f64::min);
            let max = sample
                .iter()
                .map(|v| v[f])
                .fold(f64::NEG_INFINITY, f64::max);
            (max > min).then_some((f, min, max))
        })
        .collect();

    let Some(&(feature, min, max)) = ranges.choose(rng) else {
        // All points identical across every feature.
        return Node::External {
            size: sample.len(),
        };
    };

    let split = rng.gen_range(min..max);
    let (left, right): (Vec<&[f64]>, Vec<&[f64]>) = sample
        .iter()
        .copied()
        .partition(|v| v[feature] < split);

    Node::Internal {
        feature,
        split,
        min,
        max,
        left: Box::new(build_tree(&left, depth + 1, limit, rng)),
        right: Box::new(build_tree(&right, depth + 1, limit, rng)),
    }
}

fn path_length(node: &Node, vector: &[f64], depth: usize) -> f64 {
    match node {
        Node::External { size } => depth as f64 + c_factor(*size),
        Node::Internal {
            feature,
            split,
            min,
            max,
            left,
            right,
        } => {
            // A value outside everything this partition ever saw is
            // separable from all of it in one split; count it isolated at
            // this depth rather than walking it down with the edge members.
            let v = vector[*feature];
            if v < *min || v > *max {
                return depth as f64;
            }
            if v < *split {
                path_length(left, vector, depth + 1)
            } else {
                path_length(right, vector, depth + 1)
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points,
/// the standard normalization term for isolation depth.
fn c_factor(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
}
