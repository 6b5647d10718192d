//! # dotrep-reputation
//!
//! Sybil-resistant reputation scoring over a contribution graph.
//!
//! The engine turns a validated [`GraphSnapshot`](dotrep_types::GraphSnapshot)
//! into a [`ScoreReport`](report::ScoreReport) in four strictly sequential
//! stages:
//!
//! ```text
//! edge weights -> temporal PageRank -> Sybil detection -> score composition
//! ```
//!
//! ## Modules
//!
//! - [`config`] — validated engine configuration, loadable from TOML.
//! - [`weights`] — effective edge weight (payment, stake, verification, decay).
//! - [`pagerank`] — damped weighted power iteration with dangling-mass redistribution.
//! - [`sybil`] — degree/rank heuristics, penalties, and suspect clustering.
//! - [`compose`] — component scores and the bounded composite.
//! - [`report`] — the plain-data score report.
//! - [`fingerprint`] — canonical snapshot fingerprints.
//! - [`cache`] — idempotent snapshot → report cache.
//! - [`engine`] — the facade that runs a full scoring pass.
//! - [`explain`] — opt-in edge influence audit for a single account.

pub mod cache;
pub mod compose;
pub mod config;
pub mod engine;
pub mod explain;
pub mod fingerprint;
pub mod pagerank;
pub mod report;
pub mod sybil;
pub mod weights;

pub use cache::ReportCache;
pub use config::EngineConfig;
pub use engine::ReputationEngine;
pub use report::{NodeScore, ScoreReport};

use dotrep_types::{AccountId, GraphError};

/// Error types for reputation scoring.
#[derive(Debug, thiserror::Error)]
pub enum ReputationError {
    /// The graph snapshot violates a structural invariant.
    #[error("invalid graph: {0}")]
    Graph(#[from] GraphError),

    /// A configuration parameter violates its constraint.
    #[error("invalid parameter '{name}' = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// A weight table does not meet its sum constraint.
    #[error("weights '{name}' sum to {sum}")]
    WeightSum { name: &'static str, sum: f64 },

    /// A NaN or infinity appeared during computation; the run is aborted.
    #[error("numerical error in {stage} (account {account:?}): {value}")]
    Numerical {
        stage: &'static str,
        account: Option<AccountId>,
        value: f64,
    },

    /// The configuration file could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// The configuration file could not be read.
    #[error("config io error: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// Canonical encoding of a snapshot failed.
    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Convenience result type for reputation operations.
pub type Result<T> = std::result::Result<T, ReputationError>;

/// Fail with [`ReputationError::Numerical`] unless `value` is finite.
pub(crate) fn ensure_finite(
    stage: &'static str,
    account: Option<&AccountId>,
    value: f64,
) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ReputationError::Numerical {
            stage,
            account: account.cloned(),
            value,
        })
    }
}
