//! Engine facade.
//!
//! [`ReputationEngine`] owns one validated configuration and runs the full
//! pipeline for a snapshot:
//!
//! 1. Fingerprint the snapshot and configuration; return a cached report on
//!    a hit.
//! 2. Resolve effective edge weights.
//! 3. Solve PageRank.
//! 4. Detect Sybils.
//! 5. Compose per-node scores and assemble the report; cache it unless the
//!    time budget cut the solve short.
//!
//! [`ReputationEngine::explain`] is separate from scoring and never cached.
//!
//! The engine holds no mutable state of its own and is `Send + Sync`; hosts
//! may score independent snapshots from several threads at once.

use std::sync::Arc;

use dotrep_types::{AccountId, GraphSnapshot};

use crate::cache::ReportCache;
use crate::compose::{self, ScoreBreakdown};
use crate::config::EngineConfig;
use crate::explain::{self, Explanation};
use crate::fingerprint::{self, Fingerprint};
use crate::pagerank::{self, SolverParams};
use crate::report::{NodeScore, ScoreReport, SybilFlags};
use crate::sybil;
use crate::weights::EdgeWeightResolver;
use crate::Result;

/// Runs scoring passes under a fixed configuration.
#[derive(Debug, Clone)]
pub struct ReputationEngine {
    config: EngineConfig,
    cache: Option<Arc<ReportCache>>,
}

impl ReputationEngine {
    /// Create an engine without a cache.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure of `config`.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cache: None,
        })
    }

    /// Create an engine that shares `cache` with other engines.
    pub fn with_cache(config: EngineConfig, cache: Arc<ReportCache>) -> Result<Self> {
        let mut engine = Self::new(config)?;
        engine.cache = Some(cache);
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&Arc<ReportCache>> {
        self.cache.as_ref()
    }

    /// Score every account in `snapshot`.
    ///
    /// Failed runs are never cached, and neither are runs cut short by the
    /// time budget: those depend on wall-clock timing, not only on the
    /// fingerprinted inputs.
    ///
    /// # Errors
    ///
    /// - [`ReputationError::Numerical`](crate::ReputationError::Numerical) if
    ///   any stage produces a non-finite value
    /// - [`ReputationError::Encoding`](crate::ReputationError::Encoding) if
    ///   the snapshot cannot be fingerprinted
    pub fn score(&self, snapshot: &GraphSnapshot) -> Result<Arc<ScoreReport>> {
        let fingerprint = fingerprint::fingerprint(snapshot, &self.config)?;

        if let Some(cache) = &self.cache {
            if let Some(report) = cache.get(&fingerprint) {
                tracing::debug!(fingerprint = %fingerprint::to_hex(&fingerprint), "report cache hit");
                return Ok(report);
            }
            tracing::debug!(fingerprint = %fingerprint::to_hex(&fingerprint), "report cache miss");
        }

        let (report, budget_exhausted) = self.compute(snapshot, &fingerprint)?;
        let report = Arc::new(report);

        if let Some(cache) = &self.cache {
            if budget_exhausted {
                tracing::debug!(
                    fingerprint = %fingerprint::to_hex(&fingerprint),
                    "time budget cut the run short; not caching"
                );
            } else {
                cache.insert(fingerprint, Arc::clone(&report));
            }
        }
        Ok(report)
    }

    /// Rank the edges touching `account` by how much each one moves its raw
    /// centrality, keeping the `top_k` strongest.
    ///
    /// Re-solves PageRank once per incident edge.
    ///
    /// # Errors
    ///
    /// - [`ReputationError::Graph`](crate::ReputationError::Graph) if
    ///   `account` is not in the snapshot
    /// - [`ReputationError::Numerical`](crate::ReputationError::Numerical) if
    ///   any solve produces a non-finite value
    pub fn explain(
        &self,
        snapshot: &GraphSnapshot,
        account: &AccountId,
        top_k: usize,
    ) -> Result<Explanation> {
        let weights = EdgeWeightResolver::new(&self.config).resolve_all(snapshot)?;
        explain::explain(
            snapshot,
            &weights,
            account,
            top_k,
            &SolverParams::from_config(&self.config),
        )
    }

    /// Run the pipeline. The flag reports whether the time budget stopped
    /// the solver.
    fn compute(
        &self,
        snapshot: &GraphSnapshot,
        fingerprint: &Fingerprint,
    ) -> Result<(ScoreReport, bool)> {
        let config = &self.config;

        let weights = EdgeWeightResolver::new(config).resolve_all(snapshot)?;
        let ranks = pagerank::solve(snapshot, &weights, &SolverParams::from_config(config))?;
        let analysis = sybil::detect(snapshot, &weights, &ranks.scores, &config.sybil)?;
        let inputs = compose::collect_inputs(snapshot, &ranks.scores, config);

        let nodes = inputs
            .iter()
            .zip(&analysis.verdicts)
            .map(|(input, verdict)| -> Result<NodeScore> {
                let breakdown: ScoreBreakdown = compose::compose(input, verdict.penalty, config)?;
                Ok(NodeScore {
                    account: input.account.clone(),
                    raw_centrality: input.raw_centrality,
                    sybil_penalty: verdict.penalty,
                    final_score: compose::final_score(breakdown.composite, config),
                    confidence: compose::confidence(&breakdown, verdict.penalty),
                    breakdown,
                    flags: SybilFlags {
                        is_suspected_sybil: verdict.is_suspected_sybil,
                        cluster_id: verdict.cluster_id,
                        heuristics: verdict.heuristics.clone(),
                        risk_level: verdict.risk_level,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            nodes = snapshot.node_count(),
            edges = snapshot.edge_count(),
            iterations = ranks.iterations,
            converged = ranks.converged,
            suspects = analysis.suspect_count(),
            clusters = analysis.clusters.len(),
            "reputation run complete"
        );

        let report = ScoreReport {
            fingerprint: fingerprint::to_hex(fingerprint),
            captured_at: snapshot.captured_at(),
            node_count: snapshot.node_count(),
            edge_count: snapshot.edge_count(),
            iterations_used: ranks.iterations,
            converged: ranks.converged,
            final_delta: ranks.final_delta,
            clusters: analysis.clusters,
            parameters_used: config.clone(),
            nodes,
        };
        Ok((report, ranks.budget_exhausted))
    }
}
