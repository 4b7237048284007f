//! Detector Sets
//!
//! Ordered detector collections and the coincident-subset enumeration used
//! by multi-detector summary products. Enumeration order is part of the
//! contract: generated tag strings feed downstream file-pattern matching, so
//! the same detector list must yield the same subsets in the same order on
//! every run.

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};

/// Ordered, de-duplicated collection of detector identifiers.
///
/// Order is the caller's insertion order and is preserved exactly.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DetectorSet {
    detectors: Vec<String>,
}

impl DetectorSet {
    /// Creates a detector set from identifiers, keeping first occurrences.
    ///
    /// Identifiers are trimmed; an empty result is an error.
    pub fn new(detectors: Vec<String>) -> Result<Self> {
        let mut seen = Vec::new();
        for detector in detectors {
            let trimmed = detector.trim().to_string();
            if !trimmed.is_empty() && !seen.contains(&trimmed) {
                seen.push(trimmed);
            }
        }
        if seen.is_empty() {
            return Err(PlanError::InvalidDetectors(
                "no detector identifiers given".to_string(),
            ));
        }
        Ok(Self { detectors: seen })
    }

    /// Parses a comma-separated detector list, e.g. `"H1,L1,V1"`.
    pub fn from_csv(spec: &str) -> Result<Self> {
        Self::new(spec.split(',').map(str::to_string).collect())
    }

    /// Number of detectors in the set.
    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    /// True when the set holds no detectors. Unreachable through the
    /// constructors, but kept for the usual pairing with [`len`](Self::len).
    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Checks membership.
    pub fn contains(&self, detector: &str) -> bool {
        self.detectors.iter().any(|d| d == detector)
    }

    /// Iterates detectors in set order.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.detectors.iter()
    }

    /// Concatenation of the identifiers in set order, e.g. `"H1L1V1"`.
    pub fn ifo_string(&self) -> String {
        self.detectors.concat()
    }

    /// Enumerates every coincident subset: all combinations of size `2..=k`.
    ///
    /// Subsets are ordered by ascending size and, within a size, by position
    /// of their members in this set. Fewer than two detectors yield no
    /// subsets.
    pub fn coincident_subsets(&self) -> Vec<DetectorSet> {
        let n = self.detectors.len();
        let mut subsets = Vec::new();
        for size in 2..=n {
            for indices in index_combinations(n, size) {
                let detectors = indices
                    .iter()
                    .map(|&i| self.detectors[i].clone())
                    .collect();
                subsets.push(DetectorSet { detectors });
            }
        }
        subsets
    }
}

/// Generates all `k`-element index combinations of `0..n` in ascending order.
fn index_combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    if k == 0 || k > n {
        return Vec::new();
    }

    let mut combinations = Vec::new();
    let mut indices: Vec<usize> = (0..k).collect();
    loop {
        combinations.push(indices.clone());

        // Rightmost index that can still advance.
        let mut pos = k;
        loop {
            if pos == 0 {
                return combinations;
            }
            pos -= 1;
            if indices[pos] < pos + n - k {
                break;
            }
        }

        indices[pos] += 1;
        for i in pos + 1..k {
            indices[i] = indices[i - 1] + 1;
        }
    }
}
