//! View graph construction.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered pair of processed-view indices submitted to the predictor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewPair {
    pub first: usize,
    pub second: usize,
}

impl ViewPair {
    pub fn new(first: usize, second: usize) -> Self {
        Self { first, second }
    }

    /// The same pair in the opposite order.
    pub fn reversed(self) -> Self {
        Self {
            first: self.second,
            second: self.first,
        }
    }
}

impl fmt::Display for ViewPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.first, self.second)
    }
}

/// Complete graph over `n` views with both orderings of every edge.
///
/// Edges `(i, j)` with `j < i` come first in row order, followed by the
/// reversed copy of each edge in the same order. The result has
/// `n * (n - 1)` pairs and no self-pairs.
pub fn complete_symmetric_pairs(n: usize) -> Vec<ViewPair> {
    let mut pairs: Vec<ViewPair> = (0..n)
        .flat_map(|i| (0..i).map(move |j| ViewPair::new(i, j)))
        .collect();
    let reversed: Vec<ViewPair> = pairs.iter().map(|p| p.reversed()).collect();
    pairs.extend(reversed);
    pairs
}
