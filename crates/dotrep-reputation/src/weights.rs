//! Effective edge weights.
//!
//! ```text
//! effective = base_weight
//!           * (1 + k_payment * payment_score(payment_amount))
//!           * (1 + k_stake   * stake_score(source.stake))
//!           * (verified ? verification_boost : 1)
//!           * temporal_decay(timestamp, now)
//! ```
//!
//! Every factor is bounded, so an effective weight is always finite and
//! strictly positive for a validated snapshot.

use dotrep_types::{Edge, GraphSnapshot, Timestamp, SECONDS_PER_YEAR};

use crate::config::EngineConfig;
use crate::{ensure_finite, Result};

/// Age in years between `ts` and `now`; timestamps after `now` count as age 0.
pub fn age_years(ts: Timestamp, now: Timestamp) -> f64 {
    now.saturating_sub(ts) as f64 / SECONDS_PER_YEAR
}

/// `exp(-γ · age) · recency_weight + (1 - recency_weight)`.
///
/// Bounded in (0, 1] and never below `1 - recency_weight`.
pub fn temporal_decay(age_years: f64, decay_rate: f64, recency_weight: f64) -> f64 {
    (-decay_rate * age_years).exp() * recency_weight + (1.0 - recency_weight)
}

/// Saturating logarithmic transform of a payment amount into [0, 1].
pub fn normalized_payment_score(amount: f64, saturation: f64) -> f64 {
    if amount <= 0.0 {
        return 0.0;
    }
    (amount.ln_1p() / saturation.ln_1p()).min(1.0)
}

/// `min(stake / constant, 1)`.
pub fn normalized_stake(stake: f64, normalization_constant: f64) -> f64 {
    (stake / normalization_constant).clamp(0.0, 1.0)
}

/// Computes effective edge weights under one configuration.
#[derive(Debug, Clone, Copy)]
pub struct EdgeWeightResolver<'a> {
    config: &'a EngineConfig,
}

impl<'a> EdgeWeightResolver<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Temporal decay of an edge created at `ts`, observed at `now`.
    pub fn decay(&self, ts: Timestamp, now: Timestamp) -> f64 {
        temporal_decay(
            age_years(ts, now),
            self.config.decay_rate,
            self.config.recency_weight,
        )
    }

    /// Effective weight of a single edge.
    pub fn resolve(&self, edge: &Edge, source_stake: f64, now: Timestamp) -> f64 {
        let c = self.config;
        let payment = 1.0
            + c.payment_coefficient
                * normalized_payment_score(edge.payment(), c.payment_saturation);
        let stake = 1.0
            + c.stake_coefficient * normalized_stake(source_stake, c.stake_normalization_constant);
        let verification = if edge.verified {
            c.verification_boost
        } else {
            1.0
        };

        edge.base_weight * payment * stake * verification * self.decay(edge.timestamp, now)
    }

    /// Effective weights for every edge of `graph`, in edge order.
    ///
    /// # Errors
    ///
    /// [`ReputationError::Numerical`](crate::ReputationError::Numerical) if any
    /// weight is not finite.
    pub fn resolve_all(&self, graph: &GraphSnapshot) -> Result<Vec<f64>> {
        let now = graph.captured_at();
        let nodes = graph.nodes();
        graph
            .edges()
            .iter()
            .zip(graph.endpoints())
            .map(|(edge, &(src, _))| {
                let weight = self.resolve(edge, nodes[src].stake, now);
                ensure_finite("edge_weight", Some(&edge.source), weight)
            })
            .collect()
    }
}
