//! Plan Data Model
//!
//! Small shared value types: the GPS interval an analysis run covers and the
//! scheduling universe a job descriptor targets.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};

/// GPS time interval covered by one analysis run.
///
/// Immutable once constructed and shared, unchanged, by every node assembled
/// in that run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisWindow {
    /// GPS start second (inclusive).
    pub start: u64,
    /// GPS end second (exclusive).
    pub end: u64,
}

impl AnalysisWindow {
    /// Creates a window, requiring `start < end`.
    pub fn new(start: u64, end: u64) -> Result<Self> {
        if start >= end {
            return Err(PlanError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Length of the window in seconds.
    pub fn duration(&self) -> u64 {
        self.end - self.start
    }
}

impl fmt::Display for AnalysisWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Scheduling universe a job descriptor targets in the exported plan.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Universe {
    /// Batch scheduling on the pool (the default for analysis jobs).
    Vanilla,
    /// Standard universe with checkpointing support.
    Standard,
    /// Runs on the submit host itself.
    Local,
}

impl fmt::Display for Universe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Vanilla => "vanilla",
            Self::Standard => "standard",
            Self::Local => "local",
        };
        write!(f, "{}", name)
    }
}
