//! Merge rule management for BPE.
//!
//! Merge rules are stored using token IDs rather than strings for fast comparison.
//! The learned order is kept alongside the lookup map because it is the rank:
//! reordering the rules changes every future encode.

use crate::error::{Result, TokenizerError};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// A pair of token IDs that can be merged.
pub type Pair = (u32, u32);

/// Merge rule mapping: pair -> (rank, new_token_id).
///
/// The rank indicates the priority of this merge rule (lower rank = higher priority).
pub type MergeMap = AHashMap<Pair, (u32, u32)>;

/// One learned merge: `pair.0 + pair.1 -> new_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRule {
    pub pair: Pair,
    pub new_id: u32,
}

/// Collection of BPE merge rules with efficient lookup.
///
/// Serialized as the ordered rule list; the lookup map is rebuilt on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<MergeRule>", into = "Vec<MergeRule>")]
pub struct MergeRules {
    /// Merge rules: pair -> (rank, new_token_id)
    merges: MergeMap,
    /// Rules in learned order; index == rank
    ordered: Vec<MergeRule>,
}

impl MergeRules {
    /// Create a new empty collection of merge rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new collection with capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            merges: MergeMap::with_capacity(capacity),
            ordered: Vec::with_capacity(capacity),
        }
    }

    /// Append a merge rule with the next rank.
    ///
    /// Returns the rank. A pair can only be learned once.
    pub fn push(&mut self, pair: Pair, new_token_id: u32) -> Result<u32> {
        if self.merges.contains_key(&pair) {
            return Err(TokenizerError::InvalidConfig(format!(
                "merge for pair ({}, {}) already exists",
                pair.0, pair.1
            )));
        }

        let rank = self.ordered.len() as u32;
        self.merges.insert(pair, (rank, new_token_id));
        self.ordered.push(MergeRule {
            pair,
            new_id: new_token_id,
        });

        Ok(rank)
    }

    /// Get the merge rule for a pair.
    ///
    /// Returns Some((rank, new_token_id)) if this pair should be merged,
    /// None otherwise.
    #[inline]
    pub fn get(&self, pair: Pair) -> Option<(u32, u32)> {
        self.merges.get(&pair).copied()
    }

    /// Rank of a pair, if it was learned.
    #[inline]
    pub fn rank(&self, pair: Pair) -> Option<u32> {
        self.merges.get(&pair).map(|&(rank, _)| rank)
    }

    /// Get the number of merge rules.
    #[inline]
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Check if there are no merge rules.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Rules in rank order.
    pub fn iter(&self) -> impl Iterator<Item = &MergeRule> + '_ {
        self.ordered.iter()
    }

    /// Rules in rank order as a slice.
    pub fn as_slice(&self) -> &[MergeRule] {
        &self.ordered
    }
}

impl TryFrom<Vec<MergeRule>> for MergeRules {
    type Error = TokenizerError;

    fn try_from(rules: Vec<MergeRule>) -> Result<Self> {
        let mut merges = Self::with_capacity(rules.len());
        for rule in rules {
            merges.push(rule.pair, rule.new_id)?;
        }
        Ok(merges)
    }
}

impl From<MergeRules> for Vec<MergeRule> {
    fn from(rules: MergeRules) -> Self {
        rules.ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_assigns_ranks_in_order() {
        let mut rules = MergeRules::new();
        assert_eq!(rules.push((0, 1), 100).unwrap(), 0);
        assert_eq!(rules.push((1, 2), 101).unwrap(), 1);

        assert_eq!(rules.get((0, 1)), Some((0, 100)));
        assert_eq!(rules.get((1, 2)), Some((1, 101)));
        assert_eq!(rules.get((2, 3)), None);
        assert_eq!(rules.rank((1, 2)), Some(1));
    }

    #[test]
    fn test_duplicate_pair_rejected() {
        let mut rules = MergeRules::new();
        rules.push((0, 1), 100).unwrap();
        assert!(rules.push((0, 1), 101).is_err());
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_iter_preserves_learned_order() {
        let mut rules = MergeRules::with_capacity(3);
        rules.push((5, 5), 10).unwrap();
        rules.push((1, 2), 11).unwrap();
        rules.push((10, 1), 12).unwrap();

        let pairs: Vec<Pair> = rules.iter().map(|r| r.pair).collect();
        assert_eq!(pairs, vec![(5, 5), (1, 2), (10, 1)]);
        assert_eq!(rules.as_slice()[2].new_id, 12);
    }

    #[test]
    fn test_serde_keeps_order() {
        let mut rules = MergeRules::new();
        rules.push((3, 4), 7).unwrap();
        rules.push((0, 7), 8).unwrap();

        let json = serde_json::to_string(&rules).unwrap();
        let back: MergeRules = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_slice(), rules.as_slice());
        assert_eq!(back.get((0, 7)), Some((1, 8)));
    }
}
