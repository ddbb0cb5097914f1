//! Search configuration.

use crate::error::MatchResult;
use serde::{Deserialize, Serialize};

/// Span bounds of a glob: how many consecutive atoms it may absorb.
///
/// `upper == None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GlobInterval {
    pub lower: usize,
    pub upper: Option<usize>,
}

impl GlobInterval {
    /// `lower..=upper`.
    pub const fn new(lower: usize, upper: usize) -> Self {
        Self {
            lower,
            upper: Some(upper),
        }
    }

    /// `lower..` with no upper bound.
    pub const fn at_least(lower: usize) -> Self {
        Self { lower, upper: None }
    }

    /// True if a span of `n` atoms satisfies the lower bound.
    #[inline]
    pub fn admits_lower(&self, n: usize) -> bool {
        self.lower <= n
    }

    /// True if a span of `n` atoms satisfies the upper bound.
    #[inline]
    pub fn admits_upper(&self, n: usize) -> bool {
        self.upper.map_or(true, |upper| n <= upper)
    }

    /// True if a span of `n` atoms is within both bounds.
    #[inline]
    pub fn admits(&self, n: usize) -> bool {
        self.admits_lower(n) && self.admits_upper(n)
    }
}

impl Default for GlobInterval {
    fn default() -> Self {
        Self::at_least(1)
    }
}

/// Knobs shared by pattern compilation, the callbacks and the initiator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Interval given to globs declared without one.
    pub default_glob_interval: GlobInterval,
    /// Stop the search after this many groundings.
    pub max_groundings: Option<usize>,
    /// Minimum short-term importance for the attentional focus.
    pub attention_boundary: i16,
    /// Ignore links that hold free variables when walking incoming sets.
    pub skip_query_structure: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            default_glob_interval: GlobInterval::default(),
            max_groundings: None,
            attention_boundary: 0,
            skip_query_structure: true,
        }
    }
}

impl MatchConfig {
    /// Serialize to CBOR.
    pub fn to_cbor(&self) -> MatchResult<Vec<u8>> {
        Ok(serde_cbor::to_vec(self)?)
    }

    /// Deserialize from CBOR.
    pub fn from_cbor(bytes: &[u8]) -> MatchResult<Self> {
        Ok(serde_cbor::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Interval bounds, bounded and unbounded.
    #[test]
    fn interval_bounds() {
        let one_plus = GlobInterval::default();
        assert!(!one_plus.admits(0));
        assert!(one_plus.admits(1));
        assert!(one_plus.admits(1000));

        let zero_two = GlobInterval::new(0, 2);
        assert!(zero_two.admits(0));
        assert!(zero_two.admits(2));
        assert!(!zero_two.admits(3));
    }

    /// CBOR round trip keeps every field.
    #[test]
    fn cbor_round_trip() {
        let config = MatchConfig {
            default_glob_interval: GlobInterval::new(0, 4),
            max_groundings: Some(3),
            attention_boundary: 12,
            skip_query_structure: false,
        };
        let bytes = config.to_cbor().unwrap();
        assert_eq!(MatchConfig::from_cbor(&bytes).unwrap(), config);
    }
}
