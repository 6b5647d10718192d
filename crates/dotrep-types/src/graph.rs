//! Relationships and the validated graph snapshot.
//!
//! ## Invariants
//!
//! A [`GraphSnapshot`] that exists has already passed validation:
//!
//! 1. Node ids are unique; nodes are stored in ascending id order.
//! 2. No edge is a self-loop; both endpoints exist in the node set.
//! 3. Every base weight is finite and strictly positive.
//! 4. Stakes and payment amounts are finite and non-negative.
//!
//! Parallel edges between the same ordered pair are kept as separate edges.
//! Deserialization goes through the same validation as [`GraphSnapshot::new`].

use serde::{Deserialize, Serialize};

use crate::account::{AccountId, Node};
use crate::{GraphError, Result, Timestamp};

/// A directed contribution/endorsement relationship `source -> target`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: AccountId,
    pub target: AccountId,
    /// Positive weight assigned by the ingesting process.
    pub base_weight: f64,
    /// Whether the relationship has independent corroboration.
    #[serde(default)]
    pub verified: bool,
    /// Economic transfer tied to this relationship, if any.
    #[serde(default)]
    pub payment_amount: Option<f64>,
    /// Creation time of the relationship.
    pub timestamp: Timestamp,
}

impl Edge {
    /// Create an unverified edge without payment.
    pub fn new(
        source: impl Into<AccountId>,
        target: impl Into<AccountId>,
        base_weight: f64,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            base_weight,
            verified: false,
            payment_amount: None,
            timestamp,
        }
    }

    /// Builder: mark the edge as verified.
    pub fn verified(mut self) -> Self {
        self.verified = true;
        self
    }

    /// Builder: attach a payment amount.
    pub fn with_payment(mut self, amount: f64) -> Self {
        self.payment_amount = Some(amount);
        self
    }

    /// Payment amount, treating a missing payment as zero.
    pub fn payment(&self) -> f64 {
        self.payment_amount.unwrap_or(0.0)
    }
}

/// Unvalidated snapshot parts, as they arrive from the wire.
#[derive(Deserialize)]
struct SnapshotParts {
    captured_at: Timestamp,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl TryFrom<SnapshotParts> for GraphSnapshot {
    type Error = GraphError;

    fn try_from(parts: SnapshotParts) -> Result<Self> {
        GraphSnapshot::new(parts.captured_at, parts.nodes, parts.edges)
    }
}

/// Immutable node set plus edge list, captured at a single point in time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotParts")]
pub struct GraphSnapshot {
    /// The snapshot's notion of "now"; all ages are measured against it.
    captured_at: Timestamp,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    /// `(source_index, target_index)` per edge, parallel to `edges`.
    #[serde(skip)]
    endpoints: Vec<(usize, usize)>,
}

impl GraphSnapshot {
    /// Build and validate a snapshot.
    ///
    /// Nodes are reordered by ascending id; edges keep their input order.
    ///
    /// # Errors
    ///
    /// Returns the first [`GraphError`] found. No partial snapshot is ever
    /// produced.
    pub fn new(captured_at: Timestamp, mut nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self> {
        for node in &nodes {
            if !node.stake.is_finite() || node.stake < 0.0 {
                return Err(GraphError::InvalidStake {
                    account: node.id.clone(),
                    stake: node.stake,
                });
            }
        }

        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(pair) = nodes.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(GraphError::DuplicateNode(pair[0].id.clone()));
        }

        let lookup = |id: &AccountId| {
            nodes
                .binary_search_by(|n| n.id.cmp(id))
                .map_err(|_| GraphError::UnknownNode(id.clone()))
        };

        let mut endpoints = Vec::with_capacity(edges.len());
        for edge in &edges {
            if edge.source == edge.target {
                return Err(GraphError::SelfLoop(edge.source.clone()));
            }
            let src = lookup(&edge.source)?;
            let dst = lookup(&edge.target)?;

            if !edge.base_weight.is_finite() || edge.base_weight <= 0.0 {
                return Err(GraphError::InvalidWeight {
                    from: edge.source.clone(),
                    to: edge.target.clone(),
                    weight: edge.base_weight,
                });
            }
            if let Some(amount) = edge.payment_amount {
                if !amount.is_finite() || amount < 0.0 {
                    return Err(GraphError::InvalidPayment {
                        from: edge.source.clone(),
                        to: edge.target.clone(),
                        amount,
                    });
                }
            }
            endpoints.push((src, dst));
        }

        Ok(Self {
            captured_at,
            nodes,
            edges,
            endpoints,
        })
    }

    pub fn captured_at(&self) -> Timestamp {
        self.captured_at
    }

    /// Nodes in ascending id order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// `(source_index, target_index)` for each edge, in edge order.
    pub fn endpoints(&self) -> &[(usize, usize)] {
        &self.endpoints
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Canonical index of an account, if present.
    pub fn index_of(&self, id: &AccountId) -> Option<usize> {
        self.nodes.binary_search_by(|n| n.id.cmp(id)).ok()
    }

    pub fn node(&self, id: &AccountId) -> Option<&Node> {
        self.index_of(id).map(|i| &self.nodes[i])
    }

    /// Number of incoming edges per node (parallel edges counted separately).
    pub fn in_degrees(&self) -> Vec<u32> {
        let mut degrees = vec![0u32; self.nodes.len()];
        for &(_, dst) in &self.endpoints {
            degrees[dst] = degrees[dst].saturating_add(1);
        }
        degrees
    }

    /// Number of outgoing edges per node (parallel edges counted separately).
    pub fn out_degrees(&self) -> Vec<u32> {
        let mut degrees = vec![0u32; self.nodes.len()];
        for &(src, _) in &self.endpoints {
            degrees[src] = degrees[src].saturating_add(1);
        }
        degrees
    }

    /// Most recent activity per node: the later of `created_at` and the
    /// timestamp of any incident edge.
    pub fn last_activity(&self) -> Vec<Timestamp> {
        let mut last: Vec<Timestamp> = self.nodes.iter().map(|n| n.created_at).collect();
        for (edge, &(src, dst)) in self.edges.iter().zip(&self.endpoints) {
            last[src] = last[src].max(edge.timestamp);
            last[dst] = last[dst].max(edge.timestamp);
        }
        last
    }
}
