//! Policy configuration.

use l2i_core::{CoreError, CoreResult};
use l2i_spec::PriorityTier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a breached rule is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Enforcement {
    /// Deny the spec with a `violation` diagnostic
    Hard,
    /// Rewrite the spec to comply and record an `adjustment`
    Soft,
}

impl fmt::Display for Enforcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hard => write!(f, "hard"),
            Self::Soft => write!(f, "soft"),
        }
    }
}

/// A limit together with its enforcement mode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rule<T> {
    /// The limit
    pub limit: T,
    /// Enforcement mode
    pub mode: Enforcement,
}

impl<T> Rule<T> {
    /// A rule that denies on breach
    #[must_use]
    pub const fn hard(limit: T) -> Self {
        Self {
            limit,
            mode: Enforcement::Hard,
        }
    }

    /// A rule that adjusts on breach
    #[must_use]
    pub const fn soft(limit: T) -> Self {
        Self {
            limit,
            mode: Enforcement::Soft,
        }
    }
}

/// Organization-wide admission rules; `None` disables a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Highest priority tier a flow may request
    pub max_priority: Option<Rule<PriorityTier>>,
    /// Ceiling on the sum of flow bandwidth, in Mbps
    pub bandwidth_ceiling_mbps: Option<Rule<f64>>,
    /// Most negotiation rounds an adaptive controller may use
    pub max_negotiation_rounds: Option<Rule<u32>>,
}

impl PolicyConfig {
    /// Default rules: `high` (hard), 20 Mbps (soft), 5 rounds (soft)
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_priority: Some(Rule::hard(PriorityTier::High)),
            bandwidth_ceiling_mbps: Some(Rule::soft(20.0)),
            max_negotiation_rounds: Some(Rule::soft(5)),
        }
    }

    /// A configuration with every rule disabled
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            max_priority: None,
            bandwidth_ceiling_mbps: None,
            max_negotiation_rounds: None,
        }
    }

    /// Set the priority ceiling
    #[must_use]
    pub fn with_max_priority(mut self, rule: Option<Rule<PriorityTier>>) -> Self {
        self.max_priority = rule;
        self
    }

    /// Set the aggregate bandwidth ceiling
    #[must_use]
    pub fn with_bandwidth_ceiling(mut self, rule: Option<Rule<f64>>) -> Self {
        self.bandwidth_ceiling_mbps = rule;
        self
    }

    /// Set the negotiation round limit
    #[must_use]
    pub fn with_max_rounds(mut self, rule: Option<Rule<u32>>) -> Self {
        self.max_negotiation_rounds = rule;
        self
    }

    /// Check the configuration is usable
    ///
    /// # Errors
    ///
    /// Returns error if the bandwidth ceiling is negative or not finite, or
    /// the round limit is zero
    pub fn validate(&self) -> CoreResult<()> {
        if let Some(rule) = &self.bandwidth_ceiling_mbps {
            if !rule.limit.is_finite() || rule.limit < 0.0 {
                return Err(CoreError::Validation {
                    field: "policy.bandwidth_ceiling_mbps".to_string(),
                    reason: format!("{} is not a valid ceiling", rule.limit),
                });
            }
        }
        if let Some(rule) = &self.max_negotiation_rounds {
            if rule.limit == 0 {
                return Err(CoreError::Validation {
                    field: "policy.max_negotiation_rounds".to_string(),
                    reason: "limit must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self::new()
    }
}
