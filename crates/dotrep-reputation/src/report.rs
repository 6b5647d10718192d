//! Score report types.
//!
//! A [`ScoreReport`] is plain serde data: everything a host needs to audit a
//! run, including the exact configuration that produced it.

use dotrep_types::{AccountId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::compose::ScoreBreakdown;
use crate::config::EngineConfig;
use crate::sybil::{RiskLevel, SybilCluster, SybilHeuristic};

/// Sybil flags attached to a node score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SybilFlags {
    pub is_suspected_sybil: bool,
    pub cluster_id: Option<u32>,
    pub heuristics: Vec<SybilHeuristic>,
    pub risk_level: RiskLevel,
}

/// Score of a single account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeScore {
    pub account: AccountId,
    /// PageRank centrality before normalization.
    pub raw_centrality: f64,
    pub sybil_penalty: f64,
    pub breakdown: ScoreBreakdown,
    /// Composite mapped onto `[min_score, max_score]`.
    pub final_score: f64,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub flags: SybilFlags,
}

/// Result of one scoring run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    /// Hex-encoded snapshot fingerprint.
    pub fingerprint: String,
    pub captured_at: Timestamp,
    pub node_count: usize,
    pub edge_count: usize,
    pub iterations_used: u32,
    pub converged: bool,
    pub final_delta: f64,
    pub clusters: Vec<SybilCluster>,
    pub parameters_used: EngineConfig,
    /// Node scores in ascending account order.
    pub nodes: Vec<NodeScore>,
}

impl ScoreReport {
    /// Look up the score of `account`.
    pub fn get(&self, account: &AccountId) -> Option<&NodeScore> {
        self.nodes
            .binary_search_by(|score| score.account.cmp(account))
            .ok()
            .map(|i| &self.nodes[i])
    }

    /// The `k` highest final scores; ties go to the smaller account id.
    pub fn top_ranked(&self, k: usize) -> Vec<&NodeScore> {
        let mut ranked: Vec<&NodeScore> = self.nodes.iter().collect();
        ranked.sort_by(|a, b| {
            b.final_score
                .total_cmp(&a.final_score)
                .then_with(|| a.account.cmp(&b.account))
        });
        ranked.truncate(k);
        ranked
    }

    pub fn suspected_sybils(&self) -> impl Iterator<Item = &NodeScore> {
        self.nodes.iter().filter(|n| n.flags.is_suspected_sybil)
    }

    /// Sum of raw centrality over all nodes; 1 for a non-empty graph.
    pub fn total_centrality(&self) -> f64 {
        self.nodes.iter().map(|n| n.raw_centrality).sum()
    }
}
