//! Integration test: invariants over seeded random adversarial graphs.
//!
//! Every graph mixes honest accounts with a star farm, a spammer, isolated
//! accounts, parallel edges, and extreme stake and payment values. Seeds are
//! fixed so failures reproduce.

use dotrep_integration_tests::{adversarial_graph, init_tracing, ring, AdversarialShape, NOW};
use dotrep_reputation::config::SybilThresholds;
use dotrep_reputation::pagerank::{self, SolverParams};
use dotrep_reputation::weights::EdgeWeightResolver;
use dotrep_reputation::{EngineConfig, ReputationEngine};
use dotrep_types::{Edge, GraphSnapshot, Node};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SEEDS: [u64; 6] = [1, 7, 42, 1337, 2024, 0xD07_5EED];

fn graphs() -> Vec<GraphSnapshot> {
    SEEDS
        .iter()
        .map(|&seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            adversarial_graph(&mut rng, &AdversarialShape::default()).expect("graph")
        })
        .collect()
}

/// Thresholds loose enough that most accounts trip several heuristics.
fn aggressive_thresholds() -> SybilThresholds {
    SybilThresholds {
        outlier_z_threshold: -0.1,
        outlier_min_in_degree: 0,
        outlier_penalty: 1.0,
        spam_min_out_degree: 0,
        spam_max_in_degree: 10,
        spam_penalty: 0.7,
        farm_min_in_degree: 0,
        farm_max_out_degree: 10,
        farm_penalty: 0.9,
        cluster_weight_floor: 1.0,
    }
}

fn configs() -> Vec<EngineConfig> {
    vec![
        EngineConfig::default(),
        EngineConfig {
            sybil: aggressive_thresholds(),
            ..EngineConfig::default()
        },
        EngineConfig {
            damping_factor: 0.5,
            min_score: -10.0,
            max_score: 250.0,
            decay_rate: 1.0,
            recency_weight: 1.0,
            inactivity_floor: 0.0,
            inactivity_decay_rate: 1.0,
            ..EngineConfig::default()
        },
    ]
}

#[test]
fn test_mass_conservation() {
    init_tracing();
    let engine = ReputationEngine::new(EngineConfig::default()).expect("engine");
    for graph in graphs() {
        let report = engine.score(&graph).expect("score");
        assert!(
            (report.total_centrality() - 1.0).abs() < 1e-9,
            "mass {}",
            report.total_centrality()
        );
    }
}

#[test]
fn test_penalty_and_score_bounds() {
    init_tracing();
    for config in configs() {
        let engine = ReputationEngine::new(config.clone()).expect("engine");
        for graph in graphs() {
            let report = engine.score(&graph).expect("score");
            assert_eq!(report.nodes.len(), graph.node_count());
            for node in &report.nodes {
                assert!((0.0..=1.0).contains(&node.sybil_penalty));
                assert!((0.0..=1.0).contains(&node.breakdown.composite));
                assert!((0.0..=1.0).contains(&node.confidence));
                assert!(
                    node.final_score >= config.min_score && node.final_score <= config.max_score,
                    "{} scored {}",
                    node.account,
                    node.final_score
                );
                for component in [
                    node.breakdown.social,
                    node.breakdown.economic,
                    node.breakdown.identity,
                    node.breakdown.payment,
                ] {
                    assert!((0.0..=1.0).contains(&component));
                }
            }
        }
    }
}

#[test]
fn test_all_heuristics_firing_stays_bounded() {
    let config = EngineConfig {
        sybil: aggressive_thresholds(),
        ..EngineConfig::default()
    };
    let engine = ReputationEngine::new(config).expect("engine");
    let report = engine.score(&graphs()[0]).expect("score");
    let saturated = report
        .nodes
        .iter()
        .filter(|n| n.flags.heuristics.len() >= 2)
        .count();
    assert!(saturated > 0);
    for node in report.suspected_sybils() {
        assert!(node.sybil_penalty <= 1.0);
        assert!(node.flags.cluster_id.is_some());
    }
}

#[test]
fn test_farm_hub_flagged_in_random_graphs() {
    let engine = ReputationEngine::new(EngineConfig::default()).expect("engine");
    for graph in graphs() {
        let report = engine.score(&graph).expect("score");
        let farm = report
            .nodes
            .iter()
            .find(|n| n.account.as_str() == "farm")
            .expect("farm account");
        assert!(farm.flags.is_suspected_sybil);
        assert!(farm.sybil_penalty >= 0.3 - 1e-12);
    }
}

#[test]
fn test_bitwise_determinism() {
    let engine = ReputationEngine::new(EngineConfig::default()).expect("engine");
    for seed in SEEDS {
        let build = || {
            let mut rng = StdRng::seed_from_u64(seed);
            adversarial_graph(&mut rng, &AdversarialShape::default()).expect("graph")
        };
        let first = engine.score(&build()).expect("score");
        let second = engine.score(&build()).expect("score");
        assert_eq!(first.fingerprint, second.fingerprint);
        for (a, b) in first.nodes.iter().zip(&second.nodes) {
            assert_eq!(a.raw_centrality.to_bits(), b.raw_centrality.to_bits());
            assert_eq!(a.final_score.to_bits(), b.final_score.to_bits());
            assert_eq!(a.flags.cluster_id, b.flags.cluster_id);
        }
        assert_eq!(first.clusters, second.clusters);
    }
}

#[test]
fn test_node_order_does_not_change_report() {
    let graph = graphs().remove(1);
    let mut shuffled_nodes = graph.nodes().to_vec();
    let mut rng = StdRng::seed_from_u64(99);
    for i in (1..shuffled_nodes.len()).rev() {
        let j = rng.gen_range(0..=i);
        shuffled_nodes.swap(i, j);
    }
    let shuffled = GraphSnapshot::new(graph.captured_at(), shuffled_nodes, graph.edges().to_vec())
        .expect("graph");

    let engine = ReputationEngine::new(EngineConfig::default()).expect("engine");
    assert_eq!(*engine.score(&graph).expect("score"), *engine.score(&shuffled).expect("score"));
}

#[test]
fn test_connected_graph_converges() {
    // A long ring with random chords: strongly connected.
    let n = 2_000;
    let mut rng = StdRng::seed_from_u64(5);
    let ring = ring(n).expect("ring");
    let mut edges = ring.edges().to_vec();
    for _ in 0..n {
        let a = rng.gen_range(0..n);
        let b = (a + rng.gen_range(1..n)) % n;
        edges.push(Edge::new(
            format!("r{a:04}"),
            format!("r{b:04}"),
            rng.gen_range(0.1..5.0),
            NOW,
        ));
    }
    let graph = GraphSnapshot::new(NOW, ring.nodes().to_vec(), edges).expect("graph");
    let report = ReputationEngine::new(EngineConfig::default())
        .expect("engine")
        .score(&graph)
        .expect("score");
    assert!(report.converged);
    assert!(report.iterations_used <= 100);
    assert!(report.final_delta < 1e-6);
}

#[test]
fn test_successive_sweeps_contract() {
    let mut rng = StdRng::seed_from_u64(11);
    let graph = adversarial_graph(&mut rng, &AdversarialShape::default()).expect("graph");
    let config = EngineConfig::default();
    let weights = EdgeWeightResolver::new(&config)
        .resolve_all(&graph)
        .expect("weights");

    let iterate = |k: u32| {
        let params = SolverParams {
            max_iterations: k,
            tolerance: 1e-300,
            ..SolverParams::from_config(&config)
        };
        pagerank::solve(&graph, &weights, &params).expect("solve").scores
    };
    let vectors: Vec<Vec<f64>> = (1..=15).map(iterate).collect();
    let l1 = |a: &[f64], b: &[f64]| a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum::<f64>();

    let deltas: Vec<f64> = vectors.windows(2).map(|w| l1(&w[0], &w[1])).collect();
    for pair in deltas.windows(2) {
        assert!(pair[1] <= pair[0] + 1e-15, "delta grew: {:?}", pair);
    }
}

#[test]
fn test_time_budget_returns_partial_result() {
    let mut rng = StdRng::seed_from_u64(3);
    let shape = AdversarialShape {
        honest: 5_000,
        honest_edges: 50_000,
        ..AdversarialShape::default()
    };
    let graph = adversarial_graph(&mut rng, &shape).expect("graph");
    // Slow mixing and an unreachable tolerance: only the budget can stop it.
    let config = EngineConfig {
        damping_factor: 0.99,
        tolerance: 1e-300,
        max_iterations: u32::MAX,
        time_budget_ms: Some(1),
        ..EngineConfig::default()
    };
    let report = ReputationEngine::new(config)
        .expect("engine")
        .score(&graph)
        .expect("partial result, not an error");
    assert!(!report.converged);
    assert!(report.iterations_used >= 1);
    assert!((report.total_centrality() - 1.0).abs() < 1e-9);
}

#[test]
fn test_iteration_cap_reports_non_convergence() {
    let config = EngineConfig {
        max_iterations: 1,
        ..EngineConfig::default()
    };
    let graph = graphs().remove(0);
    let report = ReputationEngine::new(config)
        .expect("engine")
        .score(&graph)
        .expect("score");
    assert_eq!(report.iterations_used, 1);
    assert!(!report.converged);
}

#[test]
fn test_top_ranked_is_sorted() {
    let engine = ReputationEngine::new(EngineConfig::default()).expect("engine");
    let report = engine.score(&graphs()[2]).expect("score");
    let top = report.top_ranked(10);
    assert_eq!(top.len(), 10);
    for pair in top.windows(2) {
        assert!(
            pair[0].final_score > pair[1].final_score
                || (pair[0].final_score == pair[1].final_score
                    && pair[0].account < pair[1].account)
        );
    }
}

#[test]
fn test_extreme_values_stay_finite() {
    let nodes = vec![
        Node::new("whale", 0).with_stake(1e300),
        Node::new("minnow", NOW),
        Node::new("orca", NOW).with_stake(1e300),
    ];
    let edges = vec![
        Edge::new("whale", "minnow", 1e300, 0).verified().with_payment(1e300),
        Edge::new("minnow", "whale", 1e-300, NOW),
        // Two payments whose plain sum overflows, into the same target.
        Edge::new("whale", "orca", 1.0, NOW).with_payment(1e308),
        Edge::new("minnow", "orca", 1.0, NOW).with_payment(1e308),
        Edge::new("orca", "whale", 1.0, NOW),
    ];
    let graph = GraphSnapshot::new(NOW, nodes, edges).expect("graph");
    let report = ReputationEngine::new(EngineConfig::default())
        .expect("engine")
        .score(&graph)
        .expect("score");
    for node in &report.nodes {
        assert!(node.final_score.is_finite());
        assert!((0.0..=1.0).contains(&node.final_score));
    }
    let orca = report
        .nodes
        .iter()
        .find(|n| n.account.as_str() == "orca")
        .expect("orca");
    assert_eq!(orca.breakdown.payment, 1.0);
}

#[test]
fn test_huge_edge_weights_conserve_mass() {
    let nodes = vec![Node::new("a", NOW), Node::new("b", NOW), Node::new("c", NOW)];
    let edges = vec![
        Edge::new("a", "b", 1e308, NOW),
        Edge::new("a", "c", 1e308, NOW),
        Edge::new("b", "a", 1.0, NOW),
        Edge::new("c", "a", 1.0, NOW),
    ];
    let graph = GraphSnapshot::new(NOW, nodes, edges).expect("graph");
    let report = ReputationEngine::new(EngineConfig::default())
        .expect("engine")
        .score(&graph)
        .expect("score");
    assert!(report.converged);
    assert!(
        (report.total_centrality() - 1.0).abs() < 1e-9,
        "mass {}",
        report.total_centrality()
    );
    let b = report.nodes.iter().find(|n| n.account.as_str() == "b").expect("b");
    let c = report.nodes.iter().find(|n| n.account.as_str() == "c").expect("c");
    assert_eq!(b.raw_centrality, c.raw_centrality);
}

#[test]
fn test_extreme_score_range_stays_finite() {
    let config = EngineConfig {
        min_score: -1e308,
        max_score: 1e308,
        ..EngineConfig::default()
    };
    let engine = ReputationEngine::new(config).expect("engine");
    let report = engine.score(&graphs()[0]).expect("score");
    for node in &report.nodes {
        assert!(node.final_score.is_finite(), "{} scored {}", node.account, node.final_score);
        let expected = -1e308 * (1.0 - node.breakdown.composite) + 1e308 * node.breakdown.composite;
        assert!((node.final_score - expected).abs() <= 1e293);
    }
}
