//! Sybil detection over the scored graph.
//!
//! Three independent heuristics inspect each node's degree profile and its
//! standing in the raw centrality distribution. Each heuristic that fires adds
//! its configured contribution; the total penalty is capped at 1.
//!
//! | Heuristic | Fires when |
//! |-----------|------------|
//! | [`SybilHeuristic::RankOutlier`] | `z < outlier_z_threshold` and `in_degree > outlier_min_in_degree` |
//! | [`SybilHeuristic::SpamOut`] | `out_degree > spam_min_out_degree` and `in_degree < spam_max_in_degree` |
//! | [`SybilHeuristic::ReciprocalFarm`] | `in_degree > farm_min_in_degree` and `out_degree < farm_max_out_degree` |
//!
//! Suspected nodes joined by edges heavier than `cluster_weight_floor` are
//! grouped into clusters. Clustering is informational and never alters a
//! penalty.

use std::collections::BTreeMap;

use dotrep_types::{AccountId, GraphSnapshot};
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};

use crate::config::SybilThresholds;
use crate::{ensure_finite, ReputationError, Result};

/// Standard deviations below this are treated as a flat distribution.
const FLAT_DISTRIBUTION_SIGMA: f64 = 1e-12;

/// A detection heuristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SybilHeuristic {
    /// Many inbound edges but a centrality far below the mean.
    RankOutlier,
    /// Fans out to many accounts while almost nobody links back.
    SpamOut,
    /// Collects many inbound edges while giving almost nothing back.
    ReciprocalFarm,
}

/// Coarse classification of a Sybil penalty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_penalty(penalty: f64) -> Self {
        if penalty >= 0.8 {
            Self::Critical
        } else if penalty >= 0.6 {
            Self::High
        } else if penalty >= 0.4 {
            Self::Medium
        } else if penalty >= 0.2 {
            Self::Low
        } else {
            Self::Minimal
        }
    }
}

/// Per-node detection result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SybilVerdict {
    /// Total penalty in [0, 1].
    pub penalty: f64,
    /// Heuristics that fired, in declaration order.
    pub heuristics: Vec<SybilHeuristic>,
    pub is_suspected_sybil: bool,
    /// Cluster of this node, if it is suspected.
    pub cluster_id: Option<u32>,
    pub risk_level: RiskLevel,
}

impl SybilVerdict {
    fn clean() -> Self {
        Self {
            penalty: 0.0,
            heuristics: Vec::new(),
            is_suspected_sybil: false,
            cluster_id: None,
            risk_level: RiskLevel::Minimal,
        }
    }
}

/// A connected group of suspected accounts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SybilCluster {
    pub id: u32,
    /// Members in ascending id order.
    pub members: Vec<AccountId>,
}

/// Detection output for a whole snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct SybilAnalysis {
    /// One verdict per node, in canonical node order.
    pub verdicts: Vec<SybilVerdict>,
    /// Clusters ordered by id.
    pub clusters: Vec<SybilCluster>,
}

impl SybilAnalysis {
    pub fn to_map(&self, graph: &GraphSnapshot) -> BTreeMap<AccountId, SybilVerdict> {
        graph
            .nodes()
            .iter()
            .zip(&self.verdicts)
            .map(|(node, verdict)| (node.id.clone(), verdict.clone()))
            .collect()
    }

    pub fn suspect_count(&self) -> usize {
        self.verdicts.iter().filter(|v| v.is_suspected_sybil).count()
    }
}

/// Population z-scores; all zero when the distribution is flat.
pub fn z_scores(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let sigma = variance.sqrt();
    if sigma < FLAT_DISTRIBUTION_SIGMA {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - mean) / sigma).collect()
}

/// Evaluate the heuristics for a single node.
fn evaluate(
    z: f64,
    in_degree: u32,
    out_degree: u32,
    thresholds: &SybilThresholds,
) -> (Vec<SybilHeuristic>, f64) {
    let mut fired = Vec::new();
    let mut penalty = 0.0;

    if z < thresholds.outlier_z_threshold && in_degree > thresholds.outlier_min_in_degree {
        fired.push(SybilHeuristic::RankOutlier);
        penalty += thresholds.outlier_penalty;
    }
    if out_degree > thresholds.spam_min_out_degree && in_degree < thresholds.spam_max_in_degree {
        fired.push(SybilHeuristic::SpamOut);
        penalty += thresholds.spam_penalty;
    }
    if in_degree > thresholds.farm_min_in_degree && out_degree < thresholds.farm_max_out_degree {
        fired.push(SybilHeuristic::ReciprocalFarm);
        penalty += thresholds.farm_penalty;
    }

    (fired, penalty.clamp(0.0, 1.0))
}

/// Run all heuristics and cluster the suspects.
///
/// # Arguments
///
/// * `graph` - The validated snapshot.
/// * `weights` - Effective weight per edge, in edge order.
/// * `raw_centrality` - PageRank score per node, in canonical node order.
/// * `thresholds` - Heuristic thresholds and penalty contributions.
///
/// # Errors
///
/// - [`ReputationError::InvalidParameter`] if an input vector has the wrong length
/// - [`ReputationError::Numerical`] if a centrality value is not finite
pub fn detect(
    graph: &GraphSnapshot,
    weights: &[f64],
    raw_centrality: &[f64],
    thresholds: &SybilThresholds,
) -> Result<SybilAnalysis> {
    let n = graph.node_count();
    if raw_centrality.len() != n {
        return Err(ReputationError::InvalidParameter {
            name: "raw_centrality",
            value: raw_centrality.len() as f64,
            reason: "must contain one score per node",
        });
    }
    if weights.len() != graph.edge_count() {
        return Err(ReputationError::InvalidParameter {
            name: "weights",
            value: weights.len() as f64,
            reason: "must contain one weight per edge",
        });
    }
    for (node, &raw) in graph.nodes().iter().zip(raw_centrality) {
        ensure_finite("sybil", Some(&node.id), raw)?;
    }

    let in_degrees = graph.in_degrees();
    let out_degrees = graph.out_degrees();
    let z = z_scores(raw_centrality);

    let mut verdicts: Vec<SybilVerdict> = (0..n)
        .map(|i| {
            let (heuristics, penalty) = evaluate(z[i], in_degrees[i], out_degrees[i], thresholds);
            if heuristics.is_empty() {
                return SybilVerdict::clean();
            }
            SybilVerdict {
                penalty,
                risk_level: RiskLevel::from_penalty(penalty),
                is_suspected_sybil: true,
                cluster_id: None,
                heuristics,
            }
        })
        .collect();

    let clusters = cluster_suspects(graph, weights, &mut verdicts, thresholds.cluster_weight_floor);

    for (node, verdict) in graph.nodes().iter().zip(&verdicts) {
        if verdict.is_suspected_sybil {
            tracing::debug!(
                account = %node.id,
                penalty = verdict.penalty,
                heuristics = ?verdict.heuristics,
                cluster = ?verdict.cluster_id,
                "suspected sybil"
            );
        }
    }

    Ok(SybilAnalysis { verdicts, clusters })
}

/// Union suspects joined by sufficiently heavy edges and number the clusters
/// by their smallest member.
fn cluster_suspects(
    graph: &GraphSnapshot,
    weights: &[f64],
    verdicts: &mut [SybilVerdict],
    weight_floor: f64,
) -> Vec<SybilCluster> {
    let suspects: Vec<usize> = verdicts
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_suspected_sybil)
        .map(|(i, _)| i)
        .collect();
    if suspects.is_empty() {
        return Vec::new();
    }

    let mut local = vec![None; verdicts.len()];
    for (slot, &node) in suspects.iter().enumerate() {
        local[node] = Some(slot);
    }

    let mut sets = UnionFind::<usize>::new(suspects.len());
    for (&(src, dst), &w) in graph.endpoints().iter().zip(weights) {
        if let (Some(a), Some(b)) = (local[src], local[dst]) {
            if w > weight_floor {
                sets.union(a, b);
            }
        }
    }
    let labels = sets.into_labeling();

    // Suspects are in ascending id order, so the first member seen for each
    // root is the cluster's smallest id.
    let nodes = graph.nodes();
    let mut cluster_of_root: BTreeMap<usize, u32> = BTreeMap::new();
    let mut clusters: Vec<SybilCluster> = Vec::new();
    for (slot, &node) in suspects.iter().enumerate() {
        let root = labels[slot];
        let id = *cluster_of_root.entry(root).or_insert_with(|| {
            let id = clusters.len() as u32;
            clusters.push(SybilCluster {
                id,
                members: Vec::new(),
            });
            id
        });
        clusters[id as usize].members.push(nodes[node].id.clone());
        verdicts[node].cluster_id = Some(id);
    }

    clusters
}
