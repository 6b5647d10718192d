//! Damped, weighted PageRank by power iteration.
//!
//! ```text
//! PR⁰(v)   = 1/N
//! PRᵏ⁺¹(v) = (1-α)/N + α · ( Σ_{e: u→v} PRᵏ(u) · w(e) / outflow(u)  +  D / |L| · [v ∈ L] )
//! ```
//!
//! `outflow(u)` is the sum of effective weights of all edges leaving `u`;
//! parallel edges contribute separately. Each weight is divided by the
//! largest weight leaving the same source before summing, so the ratio
//! `w(e) / outflow(u)` stays finite for weights near `f64::MAX`. `D` is the rank held by dangling
//! nodes (no outgoing edges) and `L` is the set of nodes touching at least one
//! edge. Redistributing `D` over `L` keeps total mass at 1 while a node with no
//! edges at all receives exactly the teleport term `(1-α)/N`. When the graph
//! has no edges, `L` is empty and `D` is spread over every node instead.
//!
//! Each sweep reads only the previous vector and writes a fresh one, so the
//! per-node updates run in parallel without affecting the result: every node
//! sums its incoming contributions in fixed edge order.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use dotrep_types::{AccountId, GraphSnapshot};
use rayon::prelude::*;

use crate::config::EngineConfig;
use crate::{ReputationError, Result};

/// Solver parameters, taken from a validated [`EngineConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverParams {
    pub damping_factor: f64,
    pub max_iterations: u32,
    pub tolerance: f64,
    pub time_budget: Option<Duration>,
}

impl SolverParams {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            damping_factor: config.damping_factor,
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
            time_budget: config.time_budget_ms.map(Duration::from_millis),
        }
    }
}

impl Default for SolverParams {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Result of a PageRank run.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRankOutcome {
    /// Raw centrality per node, in canonical node order.
    pub scores: Vec<f64>,
    /// Number of sweeps performed.
    pub iterations: u32,
    /// Whether the max per-node delta fell below the tolerance.
    pub converged: bool,
    /// Max per-node delta of the last sweep.
    pub final_delta: f64,
    /// Whether the time budget, rather than the tolerance or the iteration
    /// cap, ended the run.
    pub budget_exhausted: bool,
}

impl PageRankOutcome {
    /// Scores keyed by account id.
    pub fn to_map(&self, graph: &GraphSnapshot) -> BTreeMap<AccountId, f64> {
        graph
            .nodes()
            .iter()
            .zip(&self.scores)
            .map(|(node, &score)| (node.id.clone(), score))
            .collect()
    }

    pub fn total_mass(&self) -> f64 {
        self.scores.iter().sum()
    }
}

/// Run the power iteration over `graph` with one effective weight per edge.
///
/// Hitting the iteration cap or the time budget is not an error: the latest
/// vector is returned with `converged = false`.
///
/// # Errors
///
/// - [`ReputationError::InvalidParameter`] if `weights` does not match the
///   edge count
/// - [`ReputationError::Numerical`] if a weight is not finite and positive or
///   a score becomes non-finite
pub fn solve(graph: &GraphSnapshot, weights: &[f64], params: &SolverParams) -> Result<PageRankOutcome> {
    let n = graph.node_count();
    if n == 0 {
        return Ok(PageRankOutcome {
            scores: Vec::new(),
            iterations: 0,
            converged: true,
            final_delta: 0.0,
            budget_exhausted: false,
        });
    }

    if weights.len() != graph.edge_count() {
        return Err(ReputationError::InvalidParameter {
            name: "weights",
            value: weights.len() as f64,
            reason: "must contain one weight per edge",
        });
    }

    let nodes = graph.nodes();
    let mut max_weight = vec![0.0f64; n];
    let mut linked = vec![false; n];
    for (&(src, dst), &w) in graph.endpoints().iter().zip(weights) {
        if !w.is_finite() || w <= 0.0 {
            return Err(ReputationError::Numerical {
                stage: "pagerank",
                account: Some(nodes[src].id.clone()),
                value: w,
            });
        }
        max_weight[src] = max_weight[src].max(w);
        linked[src] = true;
        linked[dst] = true;
    }

    // Scaled terms lie in (0, 1], so the sum is bounded by the out-degree.
    let mut outflow = vec![0.0f64; n];
    for (&(src, _), &w) in graph.endpoints().iter().zip(weights) {
        outflow[src] += w / max_weight[src];
    }

    // Who links to me, and with which transition probability?
    let mut incoming: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    for (&(src, dst), &w) in graph.endpoints().iter().zip(weights) {
        incoming[dst].push((src, (w / max_weight[src]) / outflow[src]));
    }

    let dangling: Vec<usize> = (0..n).filter(|&i| max_weight[i] == 0.0).collect();
    let linked_count = linked.iter().filter(|&&l| l).count();
    let spread_everywhere = linked_count == 0;
    let receivers = if spread_everywhere { n } else { linked_count } as f64;

    let alpha = params.damping_factor;
    let teleport = (1.0 - alpha) / n as f64;
    let mut scores = vec![1.0 / n as f64; n];

    let started = Instant::now();
    let mut iterations = 0u32;
    let mut converged = false;
    let mut budget_exhausted = false;
    let mut final_delta = f64::INFINITY;

    while iterations < params.max_iterations {
        let dangling_mass: f64 = dangling.iter().map(|&i| scores[i]).sum();
        let dangling_share = alpha * dangling_mass / receivers;

        let next: Vec<f64> = (0..n)
            .into_par_iter()
            .map(|v| {
                let mut link = 0.0;
                for &(u, p) in &incoming[v] {
                    link += scores[u] * p;
                }
                let mut score = teleport + alpha * link;
                if spread_everywhere || linked[v] {
                    score += dangling_share;
                }
                score
            })
            .collect();

        if let Some(bad) = next.iter().position(|s| !s.is_finite()) {
            return Err(ReputationError::Numerical {
                stage: "pagerank",
                account: Some(nodes[bad].id.clone()),
                value: next[bad],
            });
        }

        let delta = scores
            .par_iter()
            .zip(next.par_iter())
            .map(|(old, new)| (old - new).abs())
            .reduce(|| 0.0, f64::max);

        scores = next;
        iterations += 1;
        final_delta = delta;
        tracing::trace!(iteration = iterations, delta, "pagerank sweep");

        if delta < params.tolerance {
            converged = true;
            break;
        }
        if let Some(budget) = params.time_budget {
            if started.elapsed() >= budget {
                tracing::warn!(
                    iterations,
                    delta,
                    budget_ms = budget.as_millis() as u64,
                    "pagerank time budget exhausted"
                );
                budget_exhausted = true;
                break;
            }
        }
    }

    if !converged {
        tracing::warn!(
            iterations,
            final_delta,
            tolerance = params.tolerance,
            "pagerank did not converge; returning best estimate"
        );
    }

    Ok(PageRankOutcome {
        scores,
        iterations,
        converged,
        final_delta,
        budget_exhausted,
    })
}
