//! Accounts and identity verification facts.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Opaque account identifier (typically a DID or chain address).
///
/// Ordering is lexicographic on the underlying string; the graph snapshot
/// uses it as the canonical node order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identity verification facts attested by upstream collaborators.
///
/// The engine consumes these flags as given; it never verifies them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityFlag {
    /// Account holds a verified identity NFT.
    NftVerified,
    /// Account identity was corroborated on another chain.
    CrossChainVerified,
    /// Account content passed independent content verification.
    ContentVerified,
}

impl IdentityFlag {
    /// All flags, in canonical order.
    pub const ALL: [IdentityFlag; 3] = [
        IdentityFlag::NftVerified,
        IdentityFlag::CrossChainVerified,
        IdentityFlag::ContentVerified,
    ];
}

/// An account participating in the contribution graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique account id within a snapshot.
    pub id: AccountId,
    /// Economic stake attributed to the account (0 if none).
    #[serde(default)]
    pub stake: f64,
    /// Verification facts for the account.
    #[serde(default)]
    pub identity_flags: BTreeSet<IdentityFlag>,
    /// First appearance in the graph.
    pub created_at: Timestamp,
}

impl Node {
    /// Create a node with no stake and no identity flags.
    pub fn new(id: impl Into<AccountId>, created_at: Timestamp) -> Self {
        Self {
            id: id.into(),
            stake: 0.0,
            identity_flags: BTreeSet::new(),
            created_at,
        }
    }

    /// Builder: set the stake.
    pub fn with_stake(mut self, stake: f64) -> Self {
        self.stake = stake;
        self
    }

    /// Builder: add an identity flag.
    pub fn with_flag(mut self, flag: IdentityFlag) -> Self {
        self.identity_flags.insert(flag);
        self
    }

    pub fn has_flag(&self, flag: IdentityFlag) -> bool {
        self.identity_flags.contains(&flag)
    }
}
