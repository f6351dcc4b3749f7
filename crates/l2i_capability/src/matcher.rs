//! Capability matching.
//!
//! Resource classes are checked in a fixed order: ports, queues and tiers,
//! WFQ weights, meters, multicast, atomic commit, telemetry. Every class
//! runs; the outcome is the worst one seen.

use crate::fold::FoldStrategy;
use l2i_core::{location, Deployment, Diagnostic, DiagnosticCode, Profile, Rate, Severity};
use l2i_spec::{CanonicalSpec, PriorityTier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tri-state capability decision, ordered by severity
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityStatus {
    /// Expressible as requested
    Allow,
    /// Expressible after the recorded rewrites
    Adjust,
    /// Not expressible in this domain
    Deny,
}

/// Result of matching one spec against one profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityOutcome {
    /// Decision
    pub status: CapabilityStatus,
    /// The spec with adjustments applied
    pub spec: CanonicalSpec,
    /// Denial and adjustment reasons, in class order
    pub diagnostics: Vec<Diagnostic>,
}

impl CapabilityOutcome {
    fn from_diagnostics(spec: CanonicalSpec, diagnostics: Vec<Diagnostic>) -> Self {
        let status = diagnostics
            .iter()
            .map(|d| match d.severity {
                Severity::Violation | Severity::Fatal => CapabilityStatus::Deny,
                Severity::Adjustment => CapabilityStatus::Adjust,
                Severity::Info => CapabilityStatus::Allow,
            })
            .max()
            .unwrap_or(CapabilityStatus::Allow);
        Self {
            status,
            spec,
            diagnostics,
        }
    }

    /// Whether the spec was denied
    #[must_use]
    pub fn is_denied(&self) -> bool {
        self.status == CapabilityStatus::Deny
    }
}

/// Matches canonical specs against domain profiles
#[derive(Debug, Clone, Copy, Default)]
pub struct CapabilityMatcher {
    fold: FoldStrategy,
}

impl CapabilityMatcher {
    /// Create a matcher with the default fold strategy
    #[must_use]
    pub fn new() -> Self {
        Self {
            fold: FoldStrategy::default(),
        }
    }

    /// Set the tier fold strategy
    #[must_use]
    pub fn with_fold_strategy(mut self, fold: FoldStrategy) -> Self {
        self.fold = fold;
        self
    }

    /// Active fold strategy
    #[must_use]
    pub fn fold_strategy(&self) -> FoldStrategy {
        self.fold
    }

    /// Match `spec` against `profile`
    #[must_use]
    pub fn check(&self, spec: &CanonicalSpec, profile: &Profile) -> CapabilityOutcome {
        let mut spec = spec.clone();
        let mut out = Vec::new();

        check_ports(&spec, profile, &mut out);
        self.check_tiers(&mut spec, profile, &mut out);
        check_weights(&mut spec, profile, &mut out);
        check_meters(&mut spec, profile, &mut out);
        check_multicast(&mut spec, profile, &mut out);
        check_atomic(&mut spec, profile, &mut out);
        check_telemetry(&mut spec, profile, &mut out);
        spec.normalize();

        let outcome = CapabilityOutcome::from_diagnostics(spec, out);
        tracing::debug!(
            spec = %outcome.spec.id,
            profile = %profile.profile_id,
            status = ?outcome.status,
            diagnostics = outcome.diagnostics.len(),
            "capability match"
        );
        outcome
    }

    /// Resolve the spec's domain in `deployment`, then match against it
    ///
    /// The returned spec always names its resolved domain.
    #[must_use]
    pub fn check_in(&self, spec: &CanonicalSpec, deployment: &Deployment) -> CapabilityOutcome {
        match deployment.resolve(spec.domain.as_deref()) {
            Some((domain, profile)) => {
                let mut outcome = self.check(spec, profile);
                outcome.spec.domain = Some(domain.to_string());
                outcome
            }
            None => {
                let known: Vec<&str> = deployment.iter().map(|(name, _)| name).collect();
                let message = match &spec.domain {
                    Some(domain) => format!(
                        "domain {:?} is not part of the deployment (known: {})",
                        domain,
                        known.join(", ")
                    ),
                    None => format!(
                        "no domain named and the deployment has {} domains",
                        known.len()
                    ),
                };
                tracing::warn!(spec = %spec.id, "domain unresolved");
                CapabilityOutcome::from_diagnostics(
                    spec.clone(),
                    vec![Diagnostic::violation(
                        DiagnosticCode::UnknownDomain,
                        "domain",
                        message,
                    )],
                )
            }
        }
    }

    fn check_tiers(&self, spec: &mut CanonicalSpec, profile: &Profile, out: &mut Vec<Diagnostic>) {
        let max_queues = profile.queues.max_queues as usize;
        let ports: Vec<String> = spec.ports().into_iter().map(str::to_string).collect();

        for port in ports.iter().filter(|p| profile.port(p).is_some()) {
            let tiers: BTreeSet<PriorityTier> =
                spec.flows_on_port(port).map(|f| f.priority).collect();
            if tiers.len() <= max_queues {
                continue;
            }

            // the lowest of the `max_queues` highest tiers
            let floor = tiers.iter().rev().nth(max_queues.saturating_sub(1)).copied();
            match floor {
                Some(floor) if self.fold == FoldStrategy::MergeLowest && profile.supports_wfq() => {
                    let weight = profile.queues.modes.wfq.weights_min;
                    for flow in spec
                        .flows
                        .iter_mut()
                        .filter(|f| &f.port == port && f.priority < floor)
                    {
                        out.push(Diagnostic::adjustment(
                            DiagnosticCode::TiersFolded,
                            format!("{}.priority", location::keyed("flows", &flow.id)),
                            format!(
                                "priority {} folded into {} ({} queues on port {})",
                                flow.priority, floor, max_queues, port
                            ),
                        ));
                        flow.priority = floor;
                        flow.weight.get_or_insert(weight);
                    }
                }
                _ => out.push(Diagnostic::violation(
                    DiagnosticCode::QueueOverflow,
                    location::keyed("ports", &port),
                    format!(
                        "{} distinct priority tiers requested but {} offers {} queues",
                        tiers.len(),
                        profile.profile_id,
                        max_queues
                    ),
                )),
            }
        }
    }
}

fn check_ports(spec: &CanonicalSpec, profile: &Profile, out: &mut Vec<Diagnostic>) {
    for flow in &spec.flows {
        match profile.port(&flow.port) {
            None => out.push(Diagnostic::violation(
                DiagnosticCode::UnknownPort,
                format!("{}.port", location::keyed("flows", &flow.id)),
                format!(
                    "port {:?} is not in the {} inventory",
                    flow.port, profile.profile_id
                ),
            )),
            Some(port) if flow.bandwidth.max > port.speed() => out.push(Diagnostic::violation(
                DiagnosticCode::PortSpeedExceeded,
                format!("{}.bandwidth.max_mbps", location::keyed("flows", &flow.id)),
                format!(
                    "{} requested but port {} runs at {}",
                    flow.bandwidth.max,
                    port.name,
                    port.speed()
                ),
            )),
            Some(_) => {}
        }
    }

    for name in spec.ports() {
        let Some(port) = profile.port(name) else {
            continue;
        };
        let guaranteed: Rate = spec.flows_on_port(name).map(|f| f.bandwidth.min).sum();
        if guaranteed > port.speed() {
            out.push(Diagnostic::violation(
                DiagnosticCode::PortOversubscribed,
                location::keyed("ports", &name),
                format!(
                    "{} guaranteed on a {} port",
                    guaranteed,
                    port.speed()
                ),
            ));
        }
    }
}

fn check_weights(spec: &mut CanonicalSpec, profile: &Profile, out: &mut Vec<Diagnostic>) {
    if profile.supports_wfq() {
        for flow in &mut spec.flows {
            let Some(weight) = flow.weight else { continue };
            let clamped = profile.clamp_weight(weight);
            if clamped != weight {
                out.push(Diagnostic::adjustment(
                    DiagnosticCode::WeightClamped,
                    format!("{}.weight", location::keyed("flows", &flow.id)),
                    format!("weight {} clamped to {}", weight, clamped),
                ));
                flow.weight = Some(clamped);
            }
        }
        return;
    }

    let ports: Vec<String> = spec.ports().into_iter().map(str::to_string).collect();
    for port in &ports {
        let mut tiers = BTreeSet::new();
        let mut weighted = 0usize;
        let mut separable = true;
        for flow in spec.flows_on_port(port).filter(|f| f.weight.is_some()) {
            weighted += 1;
            separable &= tiers.insert(flow.priority);
        }
        if weighted == 0 {
            continue;
        }

        if profile.queues.modes.strict && separable {
            // each weighted flow already sits in its own strict tier
            for flow in spec
                .flows
                .iter_mut()
                .filter(|f| &f.port == port && f.weight.is_some())
            {
                out.push(Diagnostic::adjustment(
                    DiagnosticCode::WeightsDropped,
                    format!("{}.weight", location::keyed("flows", &flow.id)),
                    format!(
                        "{} schedules strict priority only; weight dropped",
                        profile.profile_id
                    ),
                ));
                flow.weight = None;
            }
        } else {
            out.push(Diagnostic::violation(
                DiagnosticCode::WfqUnsupported,
                location::keyed("ports", &port),
                format!(
                    "flows share a tier with weighted sharing but {} has no WFQ",
                    profile.profile_id
                ),
            ));
        }
    }
}

fn check_meters(spec: &mut CanonicalSpec, profile: &Profile, out: &mut Vec<Diagnostic>) {
    let meters = &profile.meters;
    if !meters.supported {
        for meter in &spec.meters {
            out.push(Diagnostic::violation(
                DiagnosticCode::MeterUnsupported,
                location::keyed("meters", &meter.id),
                format!("{} has no metering", profile.profile_id),
            ));
        }
        return;
    }

    for meter in &mut spec.meters {
        if let Some(algorithm) = meter.algorithm {
            if !meters.offers(algorithm) {
                let offered: Vec<&str> = meters.types.iter().map(|t| t.as_str()).collect();
                out.push(Diagnostic::violation(
                    DiagnosticCode::MeterAlgorithmUnsupported,
                    format!("{}.algorithm", location::keyed("meters", &meter.id)),
                    format!(
                        "{} is not offered by {} (offers {})",
                        algorithm,
                        profile.profile_id,
                        offered.join(", ")
                    ),
                ));
            }
        }

        let clamped = meter.rate.clamp_to(meters.min_rate(), meters.max_rate());
        if clamped != meter.rate {
            out.push(Diagnostic::adjustment(
                DiagnosticCode::MeterRateClamped,
                format!("{}.rate_mbps", location::keyed("meters", &meter.id)),
                format!("rate {} clamped to {}", meter.rate, clamped),
            ));
            meter.rate = clamped;
        }
    }
}

fn check_multicast(spec: &mut CanonicalSpec, profile: &Profile, out: &mut Vec<Diagnostic>) {
    if spec.multicast.is_empty() {
        return;
    }
    let limits = &profile.multicast;
    let Some(native) = limits.mode.native_group_mode() else {
        out.push(Diagnostic::violation(
            DiagnosticCode::MulticastUnsupported,
            "multicast",
            format!("{} has no multicast replication", profile.profile_id),
        ));
        return;
    };

    if spec.multicast.len() > limits.max_groups as usize {
        out.push(Diagnostic::violation(
            DiagnosticCode::MulticastGroupLimit,
            "multicast",
            format!(
                "{} groups requested but {} allows {}",
                spec.multicast.len(),
                profile.profile_id,
                limits.max_groups
            ),
        ));
    }

    for group in &mut spec.multicast {
        if group.replicas > limits.max_replications_per_group {
            out.push(Diagnostic::violation(
                DiagnosticCode::MulticastReplicaLimit,
                format!("{}.replicas", location::keyed("multicast", &group.id)),
                format!(
                    "{} replicas requested but {} allows {} per group",
                    group.replicas, profile.profile_id, limits.max_replications_per_group
                ),
            ));
        }
        for member in group.members.iter().filter(|m| profile.port(m).is_none()) {
            out.push(Diagnostic::violation(
                DiagnosticCode::UnknownPort,
                format!("{}.members", location::keyed("multicast", &group.id)),
                format!(
                    "member port {:?} is not in the {} inventory",
                    member, profile.profile_id
                ),
            ));
        }
        if !limits.mode.supports(group.mode) {
            out.push(Diagnostic::adjustment(
                DiagnosticCode::MulticastModeSubstituted,
                format!("{}.mode", location::keyed("multicast", &group.id)),
                format!(
                    "{} membership rewritten to {} ({} is {})",
                    group.mode, native, profile.profile_id, limits.mode
                ),
            ));
            group.mode = native;
        }
    }
}

fn check_atomic(spec: &mut CanonicalSpec, profile: &Profile, out: &mut Vec<Diagnostic>) {
    if spec.requirements.atomic_commit && !profile.atomic_commit {
        out.push(Diagnostic::adjustment(
            DiagnosticCode::AtomicCommitDegraded,
            "requirements.atomic_commit",
            format!(
                "{} applies changes non-atomically; degraded to best effort",
                profile.profile_id
            ),
        ));
        spec.requirements.atomic_commit = false;
    }
}

fn check_telemetry(spec: &mut CanonicalSpec, profile: &Profile, out: &mut Vec<Diagnostic>) {
    let missing: Vec<_> = spec
        .requirements
        .telemetry
        .iter()
        .copied()
        .filter(|m| !profile.telemetry.supports(*m))
        .collect();
    for metric in missing {
        out.push(Diagnostic::adjustment(
            DiagnosticCode::TelemetryUnavailable,
            format!("requirements.telemetry[{}]", metric.as_str()),
            format!("{} cannot export {}", profile.profile_id, metric.as_str()),
        ));
        spec.requirements.telemetry.remove(&metric);
    }
}
