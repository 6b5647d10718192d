//! Score composition.
//!
//! Four signals, each normalized to [0, 1], are blended with the configured
//! component weights and then discounted by the Sybil penalty and by
//! inactivity:
//!
//! ```text
//! weighted_sum = social * w_s + economic * w_e + identity * w_i + payment * w_p
//! composite    = weighted_sum * (1 - sybil_penalty) * inactivity_decay
//! final        = clamp(min_score * (1 - composite) + max_score * composite)
//! ```

use std::collections::BTreeSet;

use dotrep_types::{AccountId, GraphSnapshot, IdentityFlag};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::weights::{age_years, temporal_decay, EdgeWeightResolver};
use crate::{ensure_finite, Result};

/// Ranges narrower than this make every node's social score 1.
pub const DEGENERATE_RANGE: f64 = 1e-15;

/// Share of confidence lost at full Sybil penalty.
pub const CONFIDENCE_PENALTY_FACTOR: f64 = 0.2;

/// Number of signal components feeding the composite.
const SIGNAL_COMPONENTS: f64 = 4.0;

/// Per-node inputs to the composer.
#[derive(Clone, Debug)]
pub struct ComposeInputs<'a> {
    pub account: &'a AccountId,
    pub raw_centrality: f64,
    /// Minimum raw centrality over the whole graph.
    pub graph_min: f64,
    /// Maximum raw centrality over the whole graph.
    pub graph_max: f64,
    pub stake: f64,
    pub identity_flags: &'a BTreeSet<IdentityFlag>,
    /// Sum of incoming payments, each weighted by its temporal decay,
    /// capped at `payment_saturation`.
    pub payment_received: f64,
    /// Years since the node's last activity.
    pub inactive_years: f64,
}

/// Auditable breakdown of one node's composite score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub social: f64,
    pub economic: f64,
    pub identity: f64,
    pub payment: f64,
    pub weighted_sum: f64,
    pub inactivity_decay: f64,
    /// Composite in [0, 1] after penalty and inactivity.
    pub composite: f64,
}

impl ScoreBreakdown {
    fn signals(&self) -> [f64; 4] {
        [self.social, self.economic, self.identity, self.payment]
    }
}

/// Build composer inputs for every node of `graph`, in canonical order.
///
/// `now` for payment decay and inactivity is the snapshot's `captured_at`.
pub fn collect_inputs<'a>(
    graph: &'a GraphSnapshot,
    raw_centrality: &[f64],
    config: &EngineConfig,
) -> Vec<ComposeInputs<'a>> {
    let now = graph.captured_at();
    let resolver = EdgeWeightResolver::new(config);

    let (graph_min, graph_max) = raw_centrality
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    // The payment signal is flat past the saturation point, so capping the
    // running sum loses nothing and keeps it finite.
    let cap = config.payment_saturation;
    let mut payments = vec![0.0f64; graph.node_count()];
    for (edge, &(_, dst)) in graph.edges().iter().zip(graph.endpoints()) {
        let amount = edge.payment();
        if amount > 0.0 {
            let received = amount * resolver.decay(edge.timestamp, now);
            payments[dst] = (payments[dst] + received.min(cap)).min(cap);
        }
    }

    let last_activity = graph.last_activity();

    graph
        .nodes()
        .iter()
        .zip(raw_centrality)
        .enumerate()
        .map(|(i, (node, &raw))| ComposeInputs {
            account: &node.id,
            raw_centrality: raw,
            graph_min,
            graph_max,
            stake: node.stake,
            identity_flags: &node.identity_flags,
            payment_received: payments[i],
            inactive_years: age_years(last_activity[i], now),
        })
        .collect()
}

/// Compose one node's score.
///
/// # Errors
///
/// [`ReputationError::Numerical`](crate::ReputationError::Numerical) if any
/// intermediate value is not finite.
pub fn compose(
    inputs: &ComposeInputs<'_>,
    sybil_penalty: f64,
    config: &EngineConfig,
) -> Result<ScoreBreakdown> {
    let account = Some(inputs.account);
    let check = |value: f64| ensure_finite("compose", account, value);

    let range = inputs.graph_max - inputs.graph_min;
    let social = if range <= DEGENERATE_RANGE {
        1.0
    } else {
        ((inputs.raw_centrality - inputs.graph_min) / range).clamp(0.0, 1.0)
    };
    let social = check(social)?;

    let economic = check((inputs.stake / config.economic_base).ln_1p() / std::f64::consts::LN_10)?
        .clamp(0.0, 1.0);

    let identity = inputs
        .identity_flags
        .iter()
        .map(|&flag| config.identity_weights.weight(flag))
        .sum::<f64>()
        .clamp(0.0, 1.0);

    let payment = if inputs.payment_received > 0.0 {
        check(inputs.payment_received.ln_1p() / config.payment_saturation.ln_1p())?.min(1.0)
    } else {
        0.0
    };

    let w = &config.component_weights;
    let weighted_sum = check(
        social * w.social + economic * w.economic + identity * w.identity + payment * w.payment,
    )?;

    let inactivity_decay = check(temporal_decay(
        inputs.inactive_years,
        config.inactivity_decay_rate,
        1.0 - config.inactivity_floor,
    ))?;

    let penalty = sybil_penalty.clamp(0.0, 1.0);
    let composite = check(weighted_sum * (1.0 - penalty) * inactivity_decay)?.clamp(0.0, 1.0);

    Ok(ScoreBreakdown {
        social,
        economic,
        identity,
        payment,
        weighted_sum,
        inactivity_decay,
        composite,
    })
}

/// Map a composite in [0, 1] onto the configured output range.
///
/// Interpolates without forming `max_score - min_score`, which overflows for
/// bounds near `±f64::MAX`.
pub fn final_score(composite: f64, config: &EngineConfig) -> f64 {
    (config.min_score * (1.0 - composite) + config.max_score * composite)
        .clamp(config.min_score, config.max_score)
}

/// Share of non-zero signals, reduced by the Sybil penalty.
pub fn confidence(breakdown: &ScoreBreakdown, sybil_penalty: f64) -> f64 {
    let present = breakdown.signals().iter().filter(|&&s| s > 0.0).count() as f64;
    let penalty = sybil_penalty.clamp(0.0, 1.0);
    (present / SIGNAL_COMPONENTS * (1.0 - CONFIDENCE_PENALTY_FACTOR * penalty)).clamp(0.0, 1.0)
}
