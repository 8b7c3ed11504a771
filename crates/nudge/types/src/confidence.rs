//! Confidence levels attached to derived diagnostic snapshots.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How much of the required input was available when a value was derived.
///
/// Ordered from least to most confident, so `min` yields the weaker level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    /// Confidence from a count of unknown input signals.
    ///
    /// 0–1 unknown → high, 2–3 → medium, 4 or more → low.
    pub fn from_unknown_count(unknown: usize) -> Self {
        match unknown {
            0..=1 => Self::High,
            2..=3 => Self::Medium,
            _ => Self::Low,
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}
