//! Priority tier folding.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What to do when a port carries more distinct tiers than the domain has
/// queues
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoldStrategy {
    /// Deny with `queue_overflow`
    #[default]
    Reject,
    /// Merge the lowest tiers into the lowest surviving one
    ///
    /// Only applies when the domain schedules with WFQ; merged flows without
    /// an explicit weight get the profile's minimum weight so they stay
    /// distinguishable. Strict-only domains still deny.
    MergeLowest,
}

impl FoldStrategy {
    /// Parse the snake_case name
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reject" => Some(Self::Reject),
            "merge_lowest" => Some(Self::MergeLowest),
            _ => None,
        }
    }

    /// Snake_case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::MergeLowest => "merge_lowest",
        }
    }
}

impl fmt::Display for FoldStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
