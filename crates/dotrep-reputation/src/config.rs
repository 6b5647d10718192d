//! Engine configuration.
//!
//! Every tunable constant of the scoring pipeline lives here: solver
//! parameters, decay rates, normalization constants, component weights, and
//! the Sybil heuristic thresholds. Unset fields take their defaults, so a TOML
//! file only needs to name what it overrides:
//!
//! ```toml
//! damping_factor = 0.9
//! max_score = 1000.0
//!
//! [component_weights]
//! social = 0.5
//! economic = 0.2
//! identity = 0.2
//! payment = 0.1
//! ```
//!
//! A configuration is checked once by [`EngineConfig::validate`]; invalid
//! values are rejected, never corrected or renormalized.

use std::path::Path;

use dotrep_types::IdentityFlag;
use serde::{Deserialize, Serialize};

use crate::{ReputationError, Result};

/// Allowed deviation of the component weight sum from 1.0.
pub const WEIGHT_SUM_EPSILON: f64 = 1e-9;

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// PageRank damping factor α, in (0, 1).
    #[serde(default = "default_damping_factor")]
    pub damping_factor: f64,
    /// Iteration cap for the power iteration.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Convergence threshold on the max per-node delta.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Optional wall-clock budget for the solver, in milliseconds.
    #[serde(default)]
    pub time_budget_ms: Option<u64>,
    /// Edge decay rate γ per year, in [0, 1].
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,
    /// Share of an edge's weight subject to decay, in [0, 1].
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,
    /// Stake at which the per-edge stake boost saturates.
    #[serde(default = "default_stake_normalization")]
    pub stake_normalization_constant: f64,
    /// Multiplier for verified edges, > 1.
    #[serde(default = "default_verification_boost")]
    pub verification_boost: f64,
    /// k_payment: strength of the per-edge payment boost.
    #[serde(default = "default_coefficient")]
    pub payment_coefficient: f64,
    /// k_stake: strength of the per-edge stake boost.
    #[serde(default = "default_coefficient")]
    pub stake_coefficient: f64,
    /// Payment amount at which normalized payment scores reach 1.
    #[serde(default = "default_saturation")]
    pub payment_saturation: f64,
    /// Stake base for the economic component.
    #[serde(default = "default_saturation")]
    pub economic_base: f64,
    /// Account inactivity decay rate per year, in [0, 1].
    #[serde(default = "default_decay_rate")]
    pub inactivity_decay_rate: f64,
    /// Lower bound of the inactivity decay factor, in [0, 1].
    #[serde(default = "default_inactivity_floor")]
    pub inactivity_floor: f64,
    /// Lower bound of the final score.
    #[serde(default)]
    pub min_score: f64,
    /// Upper bound of the final score.
    #[serde(default = "default_max_score")]
    pub max_score: f64,
    /// Weights of the four score components; must sum to 1.0.
    #[serde(default)]
    pub component_weights: ComponentWeights,
    /// Contribution of each identity flag; must sum to at most 1.0.
    #[serde(default)]
    pub identity_weights: IdentityWeights,
    /// Sybil heuristic thresholds and penalties.
    #[serde(default)]
    pub sybil: SybilThresholds,
}

/// Weights of the score components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentWeights {
    pub social: f64,
    pub economic: f64,
    pub identity: f64,
    pub payment: f64,
}

/// Per-flag identity weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IdentityWeights {
    #[serde(default)]
    pub nft_verified: f64,
    #[serde(default)]
    pub cross_chain_verified: f64,
    #[serde(default)]
    pub content_verified: f64,
}

/// Thresholds and contributions of the Sybil heuristics.
///
/// The defaults are hand-tuned starting points, not derived constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SybilThresholds {
    /// Rank outlier: z-score strictly below this value.
    #[serde(default = "default_outlier_z")]
    pub outlier_z_threshold: f64,
    /// Rank outlier: in-degree strictly above this value.
    #[serde(default = "default_outlier_in_degree")]
    pub outlier_min_in_degree: u32,
    #[serde(default = "default_outlier_penalty")]
    pub outlier_penalty: f64,
    /// Spam-out: out-degree strictly above this value.
    #[serde(default = "default_spam_out_degree")]
    pub spam_min_out_degree: u32,
    /// Spam-out: in-degree strictly below this value.
    #[serde(default = "default_low_degree")]
    pub spam_max_in_degree: u32,
    #[serde(default = "default_pattern_penalty")]
    pub spam_penalty: f64,
    /// Reciprocal farm: in-degree strictly above this value.
    #[serde(default = "default_farm_in_degree")]
    pub farm_min_in_degree: u32,
    /// Reciprocal farm: out-degree strictly below this value.
    #[serde(default = "default_low_degree")]
    pub farm_max_out_degree: u32,
    #[serde(default = "default_pattern_penalty")]
    pub farm_penalty: f64,
    /// Only edges with effective weight above this floor link suspects into
    /// a cluster.
    #[serde(default)]
    pub cluster_weight_floor: f64,
}

// Default value functions

fn default_damping_factor() -> f64 {
    0.85
}

fn default_max_iterations() -> u32 {
    100
}

fn default_tolerance() -> f64 {
    1e-6
}

fn default_decay_rate() -> f64 {
    0.1
}

fn default_recency_weight() -> f64 {
    0.3
}

fn default_stake_normalization() -> f64 {
    1000.0
}

fn default_verification_boost() -> f64 {
    1.2
}

fn default_coefficient() -> f64 {
    0.5
}

fn default_saturation() -> f64 {
    1000.0
}

fn default_inactivity_floor() -> f64 {
    0.5
}

fn default_max_score() -> f64 {
    1.0
}

fn default_outlier_z() -> f64 {
    -1.0
}

fn default_outlier_in_degree() -> u32 {
    5
}

fn default_outlier_penalty() -> f64 {
    0.4
}

fn default_spam_out_degree() -> u32 {
    20
}

fn default_low_degree() -> u32 {
    2
}

fn default_pattern_penalty() -> f64 {
    0.3
}

fn default_farm_in_degree() -> u32 {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            damping_factor: default_damping_factor(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            time_budget_ms: None,
            decay_rate: default_decay_rate(),
            recency_weight: default_recency_weight(),
            stake_normalization_constant: default_stake_normalization(),
            verification_boost: default_verification_boost(),
            payment_coefficient: default_coefficient(),
            stake_coefficient: default_coefficient(),
            payment_saturation: default_saturation(),
            economic_base: default_saturation(),
            inactivity_decay_rate: default_decay_rate(),
            inactivity_floor: default_inactivity_floor(),
            min_score: 0.0,
            max_score: default_max_score(),
            component_weights: ComponentWeights::default(),
            identity_weights: IdentityWeights::default(),
            sybil: SybilThresholds::default(),
        }
    }
}

impl Default for ComponentWeights {
    fn default() -> Self {
        Self {
            social: 0.4,
            economic: 0.3,
            identity: 0.2,
            payment: 0.1,
        }
    }
}

impl Default for IdentityWeights {
    fn default() -> Self {
        Self {
            nft_verified: 0.4,
            cross_chain_verified: 0.3,
            content_verified: 0.3,
        }
    }
}

impl Default for SybilThresholds {
    fn default() -> Self {
        Self {
            outlier_z_threshold: default_outlier_z(),
            outlier_min_in_degree: default_outlier_in_degree(),
            outlier_penalty: default_outlier_penalty(),
            spam_min_out_degree: default_spam_out_degree(),
            spam_max_in_degree: default_low_degree(),
            spam_penalty: default_pattern_penalty(),
            farm_min_in_degree: default_farm_in_degree(),
            farm_max_out_degree: default_low_degree(),
            farm_penalty: default_pattern_penalty(),
            cluster_weight_floor: 0.0,
        }
    }
}

impl ComponentWeights {
    pub fn sum(&self) -> f64 {
        self.social + self.economic + self.identity + self.payment
    }
}

impl IdentityWeights {
    /// Weight contributed by a single flag.
    pub fn weight(&self, flag: IdentityFlag) -> f64 {
        match flag {
            IdentityFlag::NftVerified => self.nft_verified,
            IdentityFlag::CrossChainVerified => self.cross_chain_verified,
            IdentityFlag::ContentVerified => self.content_verified,
        }
    }

    pub fn sum(&self) -> f64 {
        IdentityFlag::ALL.iter().map(|&f| self.weight(f)).sum()
    }
}

impl EngineConfig {
    /// Parse a configuration from TOML text. The result is not yet validated.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ReputationError::ConfigParse(e.to_string()))
    }

    /// Load a configuration file. The result is not yet validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Render the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| ReputationError::ConfigParse(e.to_string()))
    }

    /// Check every parameter constraint.
    ///
    /// # Errors
    ///
    /// - [`ReputationError::InvalidParameter`] for an out-of-range value
    /// - [`ReputationError::WeightSum`] if component weights do not sum to 1.0
    ///   or identity weights exceed 1.0
    pub fn validate(&self) -> Result<()> {
        open_unit("damping_factor", self.damping_factor)?;
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations", 0.0, "must be at least 1"));
        }
        positive("tolerance", self.tolerance)?;
        if self.time_budget_ms == Some(0) {
            return Err(invalid("time_budget_ms", 0.0, "must be positive when set"));
        }

        closed_unit("decay_rate", self.decay_rate)?;
        closed_unit("recency_weight", self.recency_weight)?;
        positive("stake_normalization_constant", self.stake_normalization_constant)?;
        if !self.verification_boost.is_finite() || self.verification_boost <= 1.0 {
            return Err(invalid(
                "verification_boost",
                self.verification_boost,
                "must be finite and greater than 1",
            ));
        }
        non_negative("payment_coefficient", self.payment_coefficient)?;
        non_negative("stake_coefficient", self.stake_coefficient)?;
        positive("payment_saturation", self.payment_saturation)?;
        positive("economic_base", self.economic_base)?;
        closed_unit("inactivity_decay_rate", self.inactivity_decay_rate)?;
        closed_unit("inactivity_floor", self.inactivity_floor)?;

        if !self.min_score.is_finite() || !self.max_score.is_finite() {
            return Err(invalid("max_score", self.max_score, "score bounds must be finite"));
        }
        if self.min_score >= self.max_score {
            return Err(invalid("min_score", self.min_score, "must be below max_score"));
        }

        let w = &self.component_weights;
        closed_unit("component_weights.social", w.social)?;
        closed_unit("component_weights.economic", w.economic)?;
        closed_unit("component_weights.identity", w.identity)?;
        closed_unit("component_weights.payment", w.payment)?;
        let sum = w.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(ReputationError::WeightSum {
                name: "component_weights",
                sum,
            });
        }

        let iw = &self.identity_weights;
        non_negative("identity_weights.nft_verified", iw.nft_verified)?;
        non_negative("identity_weights.cross_chain_verified", iw.cross_chain_verified)?;
        non_negative("identity_weights.content_verified", iw.content_verified)?;
        let sum = iw.sum();
        if sum > 1.0 + WEIGHT_SUM_EPSILON {
            return Err(ReputationError::WeightSum {
                name: "identity_weights",
                sum,
            });
        }

        let s = &self.sybil;
        if !s.outlier_z_threshold.is_finite() {
            return Err(invalid(
                "sybil.outlier_z_threshold",
                s.outlier_z_threshold,
                "must be finite",
            ));
        }
        closed_unit("sybil.outlier_penalty", s.outlier_penalty)?;
        closed_unit("sybil.spam_penalty", s.spam_penalty)?;
        closed_unit("sybil.farm_penalty", s.farm_penalty)?;
        non_negative("sybil.cluster_weight_floor", s.cluster_weight_floor)?;

        Ok(())
    }
}

fn invalid(name: &'static str, value: f64, reason: &'static str) -> ReputationError {
    ReputationError::InvalidParameter {
        name,
        value,
        reason,
    }
}

fn open_unit(name: &'static str, value: f64) -> Result<()> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(invalid(name, value, "must lie in (0, 1)"))
    }
}

fn closed_unit(name: &'static str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(name, value, "must lie in [0, 1]"))
    }
}

fn positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(name, value, "must be finite and positive"))
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(name, value, "must be finite and non-negative"))
    }
}
