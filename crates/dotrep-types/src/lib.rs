//! # dotrep-types
//!
//! Graph model shared across the DotRep workspace.
//!
//! A [`GraphSnapshot`](graph::GraphSnapshot) is an immutable set of accounts
//! and the weighted, timestamped relationships between them, captured at a
//! single point in time. Every structural invariant is checked once, when the
//! snapshot is built; downstream crates rely on them without re-checking.
//!
//! ## Modules
//!
//! - [`account`] — account identifiers, nodes, identity verification flags.
//! - [`graph`] — edges and the validated graph snapshot.

pub mod account;
pub mod graph;

pub use account::{AccountId, IdentityFlag, Node};
pub use graph::{Edge, GraphSnapshot};

/// Seconds in a Julian year (365.25 days). Used for all age computations.
pub const SECONDS_PER_YEAR: f64 = 31_557_600.0;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Error types for graph construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// Two nodes share the same account id.
    #[error("duplicate node id: {0}")]
    DuplicateNode(AccountId),

    /// An edge points from an account to itself.
    #[error("self-loop on node {0}")]
    SelfLoop(AccountId),

    /// An edge references an account that is not in the node set.
    #[error("edge references unknown node: {0}")]
    UnknownNode(AccountId),

    /// An edge base weight is zero, negative, or not finite.
    #[error("edge {from} -> {to} has invalid base weight {weight}")]
    InvalidWeight {
        /// Edge source.
        from: AccountId,
        /// Edge target.
        to: AccountId,
        /// The rejected weight.
        weight: f64,
    },

    /// A node stake is negative or not finite.
    #[error("node {account} has invalid stake {stake}")]
    InvalidStake {
        /// The offending account.
        account: AccountId,
        /// The rejected stake.
        stake: f64,
    },

    /// An edge payment amount is negative or not finite.
    #[error("edge {from} -> {to} has invalid payment amount {amount}")]
    InvalidPayment {
        /// Edge source.
        from: AccountId,
        /// Edge target.
        to: AccountId,
        /// The rejected amount.
        amount: f64,
    },
}

/// Convenience result type for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;
