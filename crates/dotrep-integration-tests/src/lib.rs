//! Integration test crate for the reputation engine.
//!
//! The library only holds shared graph fixtures; the scenarios themselves
//! live under `tests/` and exercise `dotrep-types` and `dotrep-reputation`
//! together through the public engine API.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p dotrep-integration-tests
//! ```

use dotrep_types::{Edge, GraphError, GraphSnapshot, IdentityFlag, Node, SECONDS_PER_YEAR};
use rand::Rng;

/// Capture time shared by every fixture.
pub const NOW: u64 = 1_700_000_000;

/// One Julian year in whole seconds.
pub const YEAR: u64 = SECONDS_PER_YEAR as u64;

/// Install a test-writer subscriber once per test binary.
///
/// Honours `RUST_LOG`; defaults to `warn`.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Zero-padded account name, so lexical and numeric order agree.
pub fn account(prefix: &str, i: usize) -> String {
    format!("{prefix}{i:04}")
}

/// `n` accounts linked in a directed cycle with unit weights.
pub fn ring(n: usize) -> Result<GraphSnapshot, GraphError> {
    let nodes = (0..n).map(|i| Node::new(account("r", i), NOW)).collect();
    let edges = (0..n)
        .map(|i| Edge::new(account("r", i), account("r", (i + 1) % n), 1.0, NOW))
        .collect();
    GraphSnapshot::new(NOW, nodes, edges)
}

/// A `hub` account receiving one edge from each of `spokes` accounts that
/// have no other links.
pub fn star_farm(spokes: usize) -> Result<GraphSnapshot, GraphError> {
    let mut nodes: Vec<Node> = (0..spokes).map(|i| Node::new(account("spoke", i), NOW)).collect();
    nodes.push(Node::new("hub", NOW));
    let edges = (0..spokes)
        .map(|i| Edge::new(account("spoke", i), "hub", 1.0, NOW))
        .collect();
    GraphSnapshot::new(NOW, nodes, edges)
}

/// Shape of a randomly generated adversarial graph.
#[derive(Clone, Copy, Debug)]
pub struct AdversarialShape {
    /// Ordinary accounts with random links among themselves.
    pub honest: usize,
    /// Random links among honest accounts.
    pub honest_edges: usize,
    /// Fake accounts that all point at a single farm target.
    pub farm_spokes: usize,
    /// Honest accounts targeted by one spamming account.
    pub spam_fanout: usize,
    /// Accounts with no edges at all.
    pub isolated: usize,
}

impl Default for AdversarialShape {
    fn default() -> Self {
        Self {
            honest: 60,
            honest_edges: 240,
            farm_spokes: 25,
            spam_fanout: 30,
            isolated: 3,
        }
    }
}

/// Random stake spanning zero to absurdly large values.
fn extreme_amount<R: Rng>(rng: &mut R) -> f64 {
    match rng.gen_range(0..4) {
        0 => 0.0,
        1 => rng.gen_range(0.0..10.0),
        2 => rng.gen_range(10.0..1e6),
        _ => rng.gen_range(1e6..1e15),
    }
}

fn random_node<R: Rng>(rng: &mut R, id: String) -> Node {
    let created_at = NOW.saturating_sub(rng.gen_range(0..20 * YEAR));
    let mut node = Node::new(id, created_at).with_stake(extreme_amount(rng));
    for flag in IdentityFlag::ALL {
        if rng.gen_bool(0.3) {
            node = node.with_flag(flag);
        }
    }
    node
}

fn random_edge<R: Rng>(rng: &mut R, source: String, target: String) -> Edge {
    let timestamp = NOW.saturating_sub(rng.gen_range(0..15 * YEAR));
    let mut edge = Edge::new(source, target, rng.gen_range(0.01..50.0), timestamp);
    if rng.gen_bool(0.4) {
        edge = edge.verified();
    }
    if rng.gen_bool(0.5) {
        edge = edge.with_payment(extreme_amount(rng));
    }
    edge
}

/// Honest accounts with random links, a star farm, a spammer, and a few
/// isolated accounts. Deterministic for a given RNG state.
pub fn adversarial_graph<R: Rng>(
    rng: &mut R,
    shape: &AdversarialShape,
) -> Result<GraphSnapshot, GraphError> {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    for i in 0..shape.honest {
        nodes.push(random_node(rng, account("honest", i)));
    }
    if shape.honest >= 2 {
        for _ in 0..shape.honest_edges {
            let a = rng.gen_range(0..shape.honest);
            let mut b = rng.gen_range(0..shape.honest - 1);
            if b >= a {
                b += 1;
            }
            edges.push(random_edge(rng, account("honest", a), account("honest", b)));
        }
    }

    if shape.farm_spokes > 0 {
        nodes.push(random_node(rng, "farm".to_string()));
        for i in 0..shape.farm_spokes {
            nodes.push(random_node(rng, account("sybil", i)));
            edges.push(random_edge(rng, account("sybil", i), "farm".to_string()));
            // Parallel edges are part of the attack surface.
            if rng.gen_bool(0.2) {
                edges.push(random_edge(rng, account("sybil", i), "farm".to_string()));
            }
        }
    }

    if shape.spam_fanout > 0 && shape.honest > 0 {
        nodes.push(random_node(rng, "spammer".to_string()));
        for _ in 0..shape.spam_fanout {
            let target = rng.gen_range(0..shape.honest);
            edges.push(random_edge(rng, "spammer".to_string(), account("honest", target)));
        }
    }

    for i in 0..shape.isolated {
        nodes.push(random_node(rng, account("loner", i)));
    }

    GraphSnapshot::new(NOW, nodes, edges)
}
