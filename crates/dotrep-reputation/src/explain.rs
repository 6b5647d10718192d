//! Edge influence explanations.
//!
//! An opt-in audit of one account's raw centrality. Every edge touching the
//! account is removed in turn, PageRank is re-solved on the remaining graph,
//! and the change in the account's centrality is recorded:
//!
//! ```text
//! influence(e) = PR(account) - PR_without_e(account)
//! ```
//!
//! A positive influence means the edge props the account up. Edges are ranked
//! by absolute influence, ties broken by edge index, so the same snapshot
//! always yields the same explanation. The cost is one full solve per
//! incident edge; scoring never calls into this module.

use std::collections::BTreeMap;

use dotrep_types::{AccountId, GraphError, GraphSnapshot};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::pagerank::{self, SolverParams};
use crate::{ensure_finite, ReputationError, Result};

/// Share of an edge's influence attributed to its source account.
pub const SOURCE_SENSITIVITY_SHARE: f64 = 0.5;

/// How much one edge contributes to the explained account's centrality.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeInfluence {
    /// Position of the edge in the snapshot.
    pub edge_index: usize,
    pub source: AccountId,
    pub target: AccountId,
    /// Effective weight the edge carried in the baseline run.
    pub weight: f64,
    /// Baseline centrality minus centrality with the edge removed.
    pub influence: f64,
}

/// Ranked edge influences for one account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub account: AccountId,
    /// Raw centrality with every edge present.
    pub raw_centrality: f64,
    /// Edges touching the account, before truncation to `top_k`.
    pub incident_edges: usize,
    /// Most influential edges, strongest first.
    pub influences: Vec<EdgeInfluence>,
}

impl Explanation {
    /// Summed influence of the ranked edges pointing at the account.
    pub fn incoming_influence(&self) -> f64 {
        self.influences
            .iter()
            .filter(|e| e.target == self.account)
            .map(|e| e.influence)
            .sum()
    }

    /// Summed influence of the ranked edges leaving the account.
    pub fn outgoing_influence(&self) -> f64 {
        self.influences
            .iter()
            .filter(|e| e.source == self.account)
            .map(|e| e.influence)
            .sum()
    }

    /// Accounts whose links move the explained account's rank by at least
    /// `threshold`, most sensitive first.
    ///
    /// Each qualifying edge credits its absolute influence to the target and
    /// half of it to the source.
    pub fn sensitive_accounts(&self, threshold: f64) -> Vec<(AccountId, f64)> {
        let mut sensitivity: BTreeMap<&AccountId, f64> = BTreeMap::new();
        for edge in &self.influences {
            let magnitude = edge.influence.abs();
            if magnitude < threshold {
                continue;
            }
            *sensitivity.entry(&edge.target).or_default() += magnitude;
            *sensitivity.entry(&edge.source).or_default() += magnitude * SOURCE_SENSITIVITY_SHARE;
        }

        let mut ranked: Vec<(AccountId, f64)> = sensitivity
            .into_iter()
            .map(|(account, score)| (account.clone(), score))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }

    /// One line per ranked edge, for logs and CLI output.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{} (raw centrality {:.6}, {} incident edges)",
            self.account, self.raw_centrality, self.incident_edges
        );
        for edge in &self.influences {
            out.push_str(&format!(
                "\n  #{} {} -> {}: {:+.6}",
                edge.edge_index, edge.source, edge.target, edge.influence
            ));
        }
        out
    }
}

/// Explain `account`'s raw centrality through the edges that touch it.
///
/// `weights` holds one effective weight per edge, as passed to
/// [`pagerank::solve`]. At most `top_k` edges are returned.
///
/// # Errors
///
/// - [`ReputationError::Graph`] if `account` is not in the snapshot
/// - any error [`pagerank::solve`] reports for the baseline or a re-solve
pub fn explain(
    graph: &GraphSnapshot,
    weights: &[f64],
    account: &AccountId,
    top_k: usize,
    params: &SolverParams,
) -> Result<Explanation> {
    let target = graph
        .index_of(account)
        .ok_or_else(|| GraphError::UnknownNode(account.clone()))?;

    let baseline = pagerank::solve(graph, weights, params)?;
    let raw_centrality = baseline.scores[target];

    let incident: Vec<usize> = graph
        .endpoints()
        .iter()
        .enumerate()
        .filter(|&(_, &(src, dst))| src == target || dst == target)
        .map(|(i, _)| i)
        .collect();

    let influences = incident
        .par_iter()
        .map(|&removed| -> Result<EdgeInfluence> {
            let without = without_edge(graph, removed)?;
            let kept: Vec<f64> = weights
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != removed)
                .map(|(_, &w)| w)
                .collect();
            let outcome = pagerank::solve(&without, &kept, params)?;
            let edge = &graph.edges()[removed];
            let influence = ensure_finite(
                "explain",
                Some(account),
                raw_centrality - outcome.scores[target],
            )?;
            Ok(EdgeInfluence {
                edge_index: removed,
                source: edge.source.clone(),
                target: edge.target.clone(),
                weight: weights[removed],
                influence,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        account = %account,
        incident = incident.len(),
        top_k,
        "edge influence computed"
    );

    Ok(Explanation {
        account: account.clone(),
        raw_centrality,
        incident_edges: incident.len(),
        influences: rank(influences, top_k),
    })
}

/// The snapshot minus one edge. Node order, and so node indices, are unchanged.
fn without_edge(graph: &GraphSnapshot, removed: usize) -> Result<GraphSnapshot> {
    let edges = graph
        .edges()
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != removed)
        .map(|(_, edge)| edge.clone())
        .collect();
    GraphSnapshot::new(graph.captured_at(), graph.nodes().to_vec(), edges)
        .map_err(ReputationError::from)
}

/// Strongest absolute influence first; equal magnitudes keep edge order.
fn rank(mut influences: Vec<EdgeInfluence>, top_k: usize) -> Vec<EdgeInfluence> {
    influences.sort_by(|a, b| {
        b.influence
            .abs()
            .total_cmp(&a.influence.abs())
            .then_with(|| a.edge_index.cmp(&b.edge_index))
    });
    influences.truncate(top_k);
    influences
}
