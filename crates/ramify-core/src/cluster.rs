//! Density clustering
//!
//! Wraps HDBSCAN behind a `Clusterer` trait so the arranger can be driven
//! by scripted labels in tests. Labels follow the usual convention: -1 is
//! noise, everything else is a cluster id. Membership probabilities are
//! derived from each point's distance to its cluster centroid.

use crate::config::SelectionMethod;
use crate::embedding::{euclidean_distance, mean_vector};

// ============================================================================
// TYPES
// ============================================================================

/// Parameters for one clustering pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterParams {
    /// Minimum number of points in a cluster
    pub min_cluster_size: usize,
    /// Core-distance sample count
    pub min_samples: usize,
    /// Cluster selection method (advisory for backends without support)
    pub method: SelectionMethod,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            min_cluster_size: 5,
            min_samples: 5,
            method: SelectionMethod::Eom,
        }
    }
}

/// Result of one clustering pass
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Per-point cluster labels; -1 marks unassigned points
    pub labels: Vec<i32>,
    /// Per-point membership probability in [0, 1]; 0 for noise
    pub probabilities: Vec<f32>,
}

impl Clustering {
    /// An all-noise result for `len` points
    pub fn noise(len: usize) -> Self {
        Self {
            labels: vec![-1; len],
            probabilities: vec![0.0; len],
        }
    }

    /// Fraction of points labeled noise
    pub fn noise_ratio(&self) -> f32 {
        if self.labels.is_empty() {
            return 0.0;
        }
        let noise = self.labels.iter().filter(|&&l| l < 0).count();
        noise as f32 / self.labels.len() as f32
    }
}

/// Clustering backend seam
pub trait Clusterer: Send + Sync {
    /// Cluster a set of points
    fn cluster(&self, points: &[Vec<f32>], params: ClusterParams) -> Clustering;
}

// ============================================================================
// DENSITY CLUSTERER
// ============================================================================

/// HDBSCAN-backed clusterer.
///
/// The backend exposes neither membership probabilities nor a selection
/// method, so probabilities come from a Gaussian kernel over the distance
/// to the cluster centroid, with the cluster's mean distance as bandwidth.
#[derive(Debug, Clone, Default)]
pub struct DensityClusterer;

impl Clusterer for DensityClusterer {
    fn cluster(&self, points: &[Vec<f32>], params: ClusterParams) -> Clustering {
        if points.len() < params.min_cluster_size + 1 {
            return Clustering::noise(points.len());
        }

        let data: Vec<Vec<f32>> = points.to_vec();
        let hyper_params = hdbscan::HdbscanHyperParams::builder()
            .min_cluster_size(params.min_cluster_size)
            .min_samples(params.min_samples)
            .build();

        let clusterer = hdbscan::Hdbscan::new(&data, hyper_params);
        let labels = match clusterer.cluster() {
            Ok(labels) => labels,
            Err(e) => {
                tracing::warn!("Density clustering failed: {e:?}");
                return Clustering::noise(points.len());
            }
        };

        let probabilities = membership_probabilities(points, &labels);
        Clustering {
            labels,
            probabilities,
        }
    }
}

fn membership_probabilities(points: &[Vec<f32>], labels: &[i32]) -> Vec<f32> {
    let mut probabilities = vec![0.0_f32; points.len()];

    let mut cluster_ids: Vec<i32> = labels.iter().copied().filter(|&l| l >= 0).collect();
    cluster_ids.sort_unstable();
    cluster_ids.dedup();

    for cluster in cluster_ids {
        let members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|&(_, &l)| l == cluster)
            .map(|(i, _)| i)
            .collect();

        let member_points: Vec<Vec<f32>> =
            members.iter().map(|&i| points[i].clone()).collect();
        let centroid = mean_vector(&member_points);
        let distances: Vec<f32> = members
            .iter()
            .map(|&i| euclidean_distance(&points[i], &centroid))
            .collect();
        let bandwidth = distances.iter().sum::<f32>() / distances.len() as f32;

        for (&idx, &distance) in members.iter().zip(distances.iter()) {
            probabilities[idx] = if bandwidth <= f32::EPSILON {
                1.0
            } else {
                (-(distance / bandwidth).powi(2)).exp()
            };
        }
    }

    probabilities
}

// ============================================================================
// TESTS
// ============================================================================
