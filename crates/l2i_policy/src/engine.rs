//! Policy evaluation.
//!
//! Every rule runs, in a fixed order (priority, bandwidth, rounds), and the
//! outcome is `deny` if any rule produced a violation.

use crate::config::{Enforcement, PolicyConfig, Rule};
use l2i_core::{location, Diagnostic, DiagnosticCode, Rate, Severity};
use l2i_spec::{CanonicalSpec, PriorityTier};
use serde::{Deserialize, Serialize};

/// Policy decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    /// The spec may proceed, possibly adjusted
    Continue,
    /// A hard ceiling was breached
    Deny,
}

/// Result of applying policies to one spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyOutcome {
    /// Decision
    pub status: PolicyStatus,
    /// The spec with soft adjustments applied
    pub spec: CanonicalSpec,
    /// Violations and adjustments, in rule order
    pub diagnostics: Vec<Diagnostic>,
}

impl PolicyOutcome {
    /// Whether the spec was denied
    #[must_use]
    pub fn is_denied(&self) -> bool {
        self.status == PolicyStatus::Deny
    }
}

/// Applies a [`PolicyConfig`] to canonical specs
#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    config: PolicyConfig,
}

impl PolicyEngine {
    /// Create an engine for the given rules
    #[must_use]
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    /// The active rules
    #[must_use]
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Apply every rule to `spec`
    #[must_use]
    pub fn apply(&self, spec: &CanonicalSpec) -> PolicyOutcome {
        let mut spec = spec.clone();
        let mut diagnostics = Vec::new();

        if let Some(rule) = self.config.max_priority {
            apply_priority(&mut spec, rule, &mut diagnostics);
        }
        if let Some(rule) = self.config.bandwidth_ceiling_mbps {
            match Rate::from_mbps_f64(rule.limit) {
                Some(ceiling) => apply_bandwidth(&mut spec, ceiling, rule.mode, &mut diagnostics),
                None => tracing::warn!(limit = rule.limit, "ignoring invalid bandwidth ceiling"),
            }
        }
        if let Some(rule) = self.config.max_negotiation_rounds {
            apply_rounds(&mut spec, rule, &mut diagnostics);
        }

        let status = if diagnostics.iter().any(Diagnostic::is_blocking) {
            PolicyStatus::Deny
        } else {
            PolicyStatus::Continue
        };

        if status == PolicyStatus::Deny {
            tracing::warn!(spec = %spec.id, diagnostics = diagnostics.len(), "policy denied");
        } else {
            tracing::debug!(spec = %spec.id, adjustments = diagnostics.len(), "policy passed");
        }

        PolicyOutcome {
            status,
            spec,
            diagnostics,
        }
    }
}

fn breach(mode: Enforcement) -> Severity {
    match mode {
        Enforcement::Hard => Severity::Violation,
        Enforcement::Soft => Severity::Adjustment,
    }
}

fn apply_priority(spec: &mut CanonicalSpec, rule: Rule<PriorityTier>, out: &mut Vec<Diagnostic>) {
    for flow in &mut spec.flows {
        if flow.priority <= rule.limit {
            continue;
        }
        let at = format!("{}.priority", location::keyed("flows", &flow.id));
        match rule.mode {
            Enforcement::Hard => out.push(Diagnostic::new(
                DiagnosticCode::PriorityCeiling,
                breach(rule.mode),
                at,
                format!(
                    "priority {} exceeds the organizational ceiling {}",
                    flow.priority, rule.limit
                ),
            )),
            Enforcement::Soft => {
                out.push(Diagnostic::new(
                    DiagnosticCode::PriorityCeiling,
                    breach(rule.mode),
                    at,
                    format!("priority demoted from {} to {}", flow.priority, rule.limit),
                ));
                flow.priority = rule.limit;
            }
        }
    }
}

fn apply_bandwidth(
    spec: &mut CanonicalSpec,
    ceiling: Rate,
    mode: Enforcement,
    out: &mut Vec<Diagnostic>,
) {
    let total_min = spec.aggregate_min();
    let total_max = spec.aggregate_max();
    if total_max <= ceiling {
        return;
    }

    // guaranteed bandwidth cannot be shaved, so this denies in either mode
    if total_min > ceiling {
        out.push(Diagnostic::violation(
            DiagnosticCode::BandwidthCeiling,
            "flows",
            format!(
                "guaranteed bandwidth {} exceeds the organizational ceiling {}",
                total_min, ceiling
            ),
        ));
        return;
    }

    if mode == Enforcement::Hard {
        out.push(Diagnostic::violation(
            DiagnosticCode::BandwidthCeiling,
            "flows",
            format!(
                "aggregate bandwidth {} exceeds the organizational ceiling {}",
                total_max, ceiling
            ),
        ));
        return;
    }

    // split what is left above the guarantees in proportion to each headroom
    let available = ceiling.saturating_sub(total_min).kbps();
    let total_excess = total_max.saturating_sub(total_min).kbps();
    for flow in &mut spec.flows {
        let excess = flow.bandwidth.max.saturating_sub(flow.bandwidth.min);
        let new_max = flow
            .bandwidth
            .min
            .saturating_add(excess.scale(available, total_excess));
        if new_max == flow.bandwidth.max {
            continue;
        }
        out.push(Diagnostic::adjustment(
            DiagnosticCode::BandwidthCeiling,
            format!("{}.bandwidth.max_mbps", location::keyed("flows", &flow.id)),
            format!(
                "ceiling lowered from {} to {} to fit the organizational limit {}",
                flow.bandwidth.max, new_max, ceiling
            ),
        ));
        flow.bandwidth.max = new_max;
    }
}

fn apply_rounds(spec: &mut CanonicalSpec, rule: Rule<u32>, out: &mut Vec<Diagnostic>) {
    let Some(requested) = spec.requirements.max_negotiation_rounds else {
        return;
    };
    if requested <= rule.limit {
        return;
    }
    let location = "requirements.max_negotiation_rounds";
    match rule.mode {
        Enforcement::Hard => out.push(Diagnostic::violation(
            DiagnosticCode::NegotiationRounds,
            location,
            format!("{} rounds exceed the limit of {}", requested, rule.limit),
        )),
        Enforcement::Soft => {
            out.push(Diagnostic::adjustment(
                DiagnosticCode::NegotiationRounds,
                location,
                format!("rounds clamped from {} to {}", requested, rule.limit),
            ));
            spec.requirements.max_negotiation_rounds = Some(rule.limit);
        }
    }
}
