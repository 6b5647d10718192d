//! Integration test: engine facade, shared cache, and configuration files.
//!
//! Exercises the host-facing surface:
//! 1. Shared report cache across engines and threads
//! 2. Configuration loaded from a TOML file on disk
//! 3. Snapshots and reports crossing a JSON boundary
//! 4. Validation failures surfacing before any computation

use std::sync::Arc;

use dotrep_integration_tests::{adversarial_graph, init_tracing, ring, star_farm, AdversarialShape};
use dotrep_reputation::cache::ReportCache;
use dotrep_reputation::{EngineConfig, ReputationEngine, ReputationError, ScoreReport};
use dotrep_types::{GraphError, GraphSnapshot};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn test_cache_hit_returns_identical_report() {
    init_tracing();
    let cache = Arc::new(ReportCache::new(16));
    let engine = ReputationEngine::with_cache(EngineConfig::default(), Arc::clone(&cache))
        .expect("engine");
    let graph = star_farm(30).expect("star");

    let first = engine.score(&graph).expect("score");
    let second = engine.score(&graph).expect("score");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_cache_shared_between_engines_respects_config() {
    let cache = Arc::new(ReportCache::new(16));
    let default = ReputationEngine::with_cache(EngineConfig::default(), Arc::clone(&cache))
        .expect("engine");
    let tuned = ReputationEngine::with_cache(
        EngineConfig {
            damping_factor: 0.7,
            ..EngineConfig::default()
        },
        Arc::clone(&cache),
    )
    .expect("engine");

    let graph = ring(5).expect("ring");
    let a = default.score(&graph).expect("score");
    let b = tuned.score(&graph).expect("score");
    assert!(!Arc::ptr_eq(&a, &b));
    assert_ne!(a.fingerprint, b.fingerprint);
    assert_eq!(cache.len(), 2);

    // A second engine with the default config reuses the first report.
    let again = ReputationEngine::with_cache(EngineConfig::default(), Arc::clone(&cache))
        .expect("engine")
        .score(&graph)
        .expect("score");
    assert!(Arc::ptr_eq(&a, &again));
}

#[test]
fn test_concurrent_scoring_shares_cache() {
    init_tracing();
    let cache = Arc::new(ReportCache::new(64));
    let engine = ReputationEngine::with_cache(EngineConfig::default(), Arc::clone(&cache))
        .expect("engine");
    let graphs: Vec<GraphSnapshot> = (0..4u64)
        .map(|seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            adversarial_graph(&mut rng, &AdversarialShape::default()).expect("graph")
        })
        .collect();

    let reports: Vec<Vec<Arc<ScoreReport>>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = &engine;
                let graphs = &graphs;
                scope.spawn(move || {
                    graphs
                        .iter()
                        .map(|g| engine.score(g).expect("score"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("scoring thread"))
            .collect()
    });

    assert_eq!(cache.len(), graphs.len());
    let uncached = ReputationEngine::new(EngineConfig::default()).expect("engine");
    for (i, graph) in graphs.iter().enumerate() {
        let reference = uncached.score(graph).expect("score");
        for per_thread in &reports {
            assert_eq!(*per_thread[i], *reference);
        }
    }
}

#[test]
fn test_full_cache_still_scores() {
    let cache = Arc::new(ReportCache::new(1));
    let engine = ReputationEngine::with_cache(EngineConfig::default(), Arc::clone(&cache))
        .expect("engine");
    engine.score(&ring(3).expect("ring")).expect("score");
    let report = engine.score(&ring(4).expect("ring")).expect("score");
    assert_eq!(report.node_count, 4);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_budget_truncated_run_not_cached() {
    init_tracing();
    let mut rng = StdRng::seed_from_u64(3);
    let shape = AdversarialShape {
        honest: 5_000,
        honest_edges: 50_000,
        ..AdversarialShape::default()
    };
    let graph = adversarial_graph(&mut rng, &shape).expect("graph");
    let config = EngineConfig {
        damping_factor: 0.99,
        tolerance: 1e-300,
        max_iterations: u32::MAX,
        time_budget_ms: Some(1),
        ..EngineConfig::default()
    };
    let cache = Arc::new(ReportCache::new(16));
    let engine = ReputationEngine::with_cache(config, Arc::clone(&cache)).expect("engine");

    let first = engine.score(&graph).expect("partial result");
    assert!(!first.converged);
    assert!(cache.is_empty());

    let second = engine.score(&graph).expect("partial result");
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(cache.is_empty());
}

#[test]
fn test_iteration_capped_run_is_cached() {
    let cache = Arc::new(ReportCache::new(16));
    let config = EngineConfig {
        max_iterations: 1,
        ..EngineConfig::default()
    };
    let engine = ReputationEngine::with_cache(config, Arc::clone(&cache)).expect("engine");
    let mut rng = StdRng::seed_from_u64(8);
    let graph = adversarial_graph(&mut rng, &AdversarialShape::default()).expect("graph");

    let report = engine.score(&graph).expect("score");
    assert!(!report.converged);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_config_loaded_from_file() {
    let path = std::env::temp_dir().join(format!("dotrep-engine-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        r#"
damping_factor = 0.9
max_score = 1000.0

[component_weights]
social = 0.5
economic = 0.2
identity = 0.2
payment = 0.1

[sybil]
farm_min_in_degree = 3
"#,
    )
    .expect("write config");

    let config = EngineConfig::load(&path).expect("load");
    std::fs::remove_file(&path).expect("cleanup");

    assert!((config.damping_factor - 0.9).abs() < f64::EPSILON);
    assert_eq!(config.sybil.farm_min_in_degree, 3);
    assert_eq!(config.sybil.spam_min_out_degree, 20);

    let engine = ReputationEngine::new(config).expect("engine");
    let report = engine.score(&star_farm(5).expect("star")).expect("score");
    let hub = report
        .nodes
        .iter()
        .find(|n| n.account.as_str() == "hub")
        .expect("hub");
    assert!(hub.flags.is_suspected_sybil);
    assert!(hub.final_score <= 1000.0);
}

#[test]
fn test_missing_config_file() {
    let path = std::env::temp_dir().join("dotrep-engine-does-not-exist.toml");
    assert!(matches!(
        EngineConfig::load(&path),
        Err(ReputationError::ConfigIo(_))
    ));
}

#[test]
fn test_unnormalized_weights_rejected() {
    let config = EngineConfig::from_toml_str(
        r#"
[component_weights]
social = 0.5
economic = 0.5
identity = 0.5
payment = 0.5
"#,
    )
    .expect("parse");
    assert!(matches!(
        ReputationEngine::new(config),
        Err(ReputationError::WeightSum { name: "component_weights", .. })
    ));
}

#[test]
fn test_json_snapshot_roundtrip_scores_identically() {
    let mut rng = StdRng::seed_from_u64(21);
    let graph = adversarial_graph(&mut rng, &AdversarialShape::default()).expect("graph");
    let json = serde_json::to_string(&graph).expect("serialize");
    let restored: GraphSnapshot = serde_json::from_str(&json).expect("deserialize");

    let engine = ReputationEngine::new(EngineConfig::default()).expect("engine");
    let a = engine.score(&graph).expect("score");
    let b = engine.score(&restored).expect("score");
    assert_eq!(*a, *b);

    let report_json = serde_json::to_string(&*a).expect("serialize report");
    let report: ScoreReport = serde_json::from_str(&report_json).expect("deserialize report");
    assert_eq!(report.nodes.len(), graph.node_count());
}

#[test]
fn test_invalid_snapshot_rejected_on_deserialize() {
    let json = r#"{
        "captured_at": 0,
        "nodes": [{"id": "a", "created_at": 0}],
        "edges": [{"source": "a", "target": "a", "base_weight": 1.0, "timestamp": 0}]
    }"#;
    let err = serde_json::from_str::<GraphSnapshot>(json).expect_err("self-loop");
    assert!(err.to_string().contains("self-loop"), "{err}");

    let direct = GraphSnapshot::new(
        0,
        vec![dotrep_types::Node::new("a", 0)],
        vec![dotrep_types::Edge::new("a", "a", 1.0, 0)],
    );
    assert!(matches!(direct, Err(GraphError::SelfLoop(_))));
}
