//! Multi-spec composition.
//!
//! Specs are sorted by id before anything else happens, so conflict
//! detection and the merged plan are independent of input order.
//! Composition is atomic: the first conflict found aborts with a single
//! fatal diagnostic.

use l2i_core::{
    location, Deployment, Diagnostic, DiagnosticCode, Profile, Rate, Stage, TelemetryMetric,
};
use l2i_spec::{CanonicalSpec, Flow, MeterRequest, MulticastGroup, PriorityTier};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A resource tagged with the spec that requested it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sourced<T> {
    /// Owning spec id
    pub spec: String,
    /// The resource
    pub item: T,
}

impl<T> Sourced<T> {
    fn new(spec: &str, item: T) -> Self {
        Self {
            spec: spec.to_string(),
            item,
        }
    }
}

/// Everything composed into one domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainPlan {
    /// Domain id
    pub domain: String,
    /// Flows, sorted by (flow id, spec id)
    pub flows: Vec<Sourced<Flow>>,
    /// Meters, sorted by (meter id, spec id)
    pub meters: Vec<Sourced<MeterRequest>>,
    /// Multicast groups, sorted by (group id, spec id)
    pub multicast: Vec<Sourced<MulticastGroup>>,
    /// Whether any spec in this domain requires atomic application
    pub atomic_commit: bool,
    /// Union of requested telemetry
    pub telemetry: BTreeSet<TelemetryMetric>,
}

impl DomainPlan {
    fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            flows: Vec::new(),
            meters: Vec::new(),
            multicast: Vec::new(),
            atomic_commit: false,
            telemetry: BTreeSet::new(),
        }
    }

    fn absorb(&mut self, spec: &CanonicalSpec) {
        self.flows
            .extend(spec.flows.iter().cloned().map(|f| Sourced::new(&spec.id, f)));
        self.meters
            .extend(spec.meters.iter().cloned().map(|m| Sourced::new(&spec.id, m)));
        self.multicast
            .extend(spec.multicast.iter().cloned().map(|g| Sourced::new(&spec.id, g)));
        self.atomic_commit |= spec.requirements.atomic_commit;
        self.telemetry
            .extend(spec.requirements.telemetry.iter().copied());
    }

    fn sort(&mut self) {
        self.flows
            .sort_by(|a, b| (&a.item.id, &a.spec).cmp(&(&b.item.id, &b.spec)));
        self.meters
            .sort_by(|a, b| (&a.item.id, &a.spec).cmp(&(&b.item.id, &b.spec)));
        self.multicast
            .sort_by(|a, b| (a.item.id, &a.spec).cmp(&(b.item.id, &b.spec)));
    }
}

/// Merged, conflict-free plan over a deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedPlan {
    /// Ids of the composed specs, sorted
    pub specs: Vec<String>,
    /// Tightest negotiation round limit requested by any spec
    pub negotiation_rounds: Option<u32>,
    /// Per-domain content, sorted by domain id
    pub domains: Vec<DomainPlan>,
}

impl ComposedPlan {
    /// Look up a domain's content
    #[must_use]
    pub fn domain(&self, domain: &str) -> Option<&DomainPlan> {
        self.domains.iter().find(|d| d.domain == domain)
    }
}

/// Merges specs into a [`ComposedPlan`]
#[derive(Debug, Clone, Copy, Default)]
pub struct Composer;

impl Composer {
    /// Create a new composer
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Compose capability-adjusted specs over `deployment`
    ///
    /// # Errors
    ///
    /// Returns a single `fatal` diagnostic naming the colliding resource and
    /// the specs involved
    pub fn compose(
        &self,
        specs: &[CanonicalSpec],
        deployment: &Deployment,
    ) -> Result<ComposedPlan, Diagnostic> {
        let mut sorted: Vec<&CanonicalSpec> = specs.iter().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));

        for pair in sorted.windows(2) {
            if pair[0].id == pair[1].id {
                return Err(conflict(
                    DiagnosticCode::DuplicateSpec,
                    "specs",
                    format!("spec id {:?} submitted more than once", pair[0].id),
                ));
            }
        }

        let mut by_domain: BTreeMap<&str, Vec<&CanonicalSpec>> = BTreeMap::new();
        for &spec in &sorted {
            let Some((domain, _)) = deployment.resolve(spec.domain.as_deref()) else {
                return Err(conflict(
                    DiagnosticCode::UnknownDomain,
                    format!("{}.domain", location::keyed("specs", &spec.id)),
                    format!("spec {:?} targets no domain of the deployment", spec.id),
                ));
            };
            by_domain.entry(domain).or_default().push(spec);
        }

        for (domain, members) in &by_domain {
            let Some(profile) = deployment.profile(domain) else {
                continue;
            };
            check_port_contention(domain, members, profile)?;
            check_queue_contention(domain, members, profile)?;
            check_group_collision(domain, members)?;
            check_group_limit(domain, members, profile)?;
        }

        let mut domains = Vec::with_capacity(by_domain.len());
        for (domain, members) in &by_domain {
            let mut plan = DomainPlan::new(domain);
            for spec in members {
                plan.absorb(spec);
            }
            plan.sort();
            domains.push(plan);
        }

        let negotiation_rounds = sorted
            .iter()
            .filter_map(|s| s.requirements.max_negotiation_rounds)
            .min();

        tracing::debug!(
            specs = sorted.len(),
            domains = domains.len(),
            "composition succeeded"
        );

        Ok(ComposedPlan {
            specs: sorted.iter().map(|s| s.id.clone()).collect(),
            negotiation_rounds,
            domains,
        })
    }
}

fn conflict(code: DiagnosticCode, at: impl Into<String>, message: String) -> Diagnostic {
    // every conflict is reported under composition, unknown_domain included
    let diagnostic = Diagnostic::fatal(code, at, message).with_stage(Stage::Composition);
    tracing::warn!(code = %diagnostic.code, "composition conflict");
    diagnostic
}

fn check_port_contention(
    domain: &str,
    specs: &[&CanonicalSpec],
    profile: &Profile,
) -> Result<(), Diagnostic> {
    // port -> (guaranteed total, contributing specs)
    let mut load: BTreeMap<&str, (Rate, BTreeSet<&str>)> = BTreeMap::new();
    for spec in specs {
        for flow in &spec.flows {
            let entry = load.entry(flow.port.as_str()).or_default();
            entry.0 = entry.0.saturating_add(flow.bandwidth.min);
            entry.1.insert(spec.id.as_str());
        }
    }

    for (port, (guaranteed, owners)) in &load {
        if owners.len() < 2 {
            continue;
        }
        let Some(info) = profile.port(port) else {
            continue;
        };
        if *guaranteed > info.speed() {
            let owners: Vec<&str> = owners.iter().copied().collect();
            return Err(conflict(
                DiagnosticCode::PortContention,
                location::in_domain(domain, &location::keyed("ports", port)),
                format!(
                    "port {} in domain {}: {} guaranteed by specs {} exceeds {}",
                    port,
                    domain,
                    guaranteed,
                    owners.join(", "),
                    info.speed()
                ),
            ));
        }
    }
    Ok(())
}

fn check_group_collision(domain: &str, specs: &[&CanonicalSpec]) -> Result<(), Diagnostic> {
    let mut owners: BTreeMap<u32, Vec<&str>> = BTreeMap::new();
    for spec in specs {
        for group in &spec.multicast {
            owners.entry(group.id).or_default().push(spec.id.as_str());
        }
    }

    for (group, specs) in &owners {
        if specs.len() > 1 {
            return Err(conflict(
                DiagnosticCode::GroupCollision,
                location::in_domain(domain, &location::keyed("multicast", group)),
                format!(
                    "multicast group {} in domain {} declared by specs {}",
                    group,
                    domain,
                    specs.join(", ")
                ),
            ));
        }
    }
    Ok(())
}

fn check_queue_contention(
    domain: &str,
    specs: &[&CanonicalSpec],
    profile: &Profile,
) -> Result<(), Diagnostic> {
    let max_queues = profile.queues.max_queues as usize;

    // port -> (distinct tiers, contributing specs)
    let mut demand: BTreeMap<&str, (BTreeSet<PriorityTier>, BTreeSet<&str>)> = BTreeMap::new();
    for spec in specs {
        for flow in &spec.flows {
            let entry = demand.entry(flow.port.as_str()).or_default();
            entry.0.insert(flow.priority);
            entry.1.insert(spec.id.as_str());
        }
    }

    for (port, (tiers, owners)) in &demand {
        if owners.len() < 2 || tiers.len() <= max_queues {
            continue;
        }
        let owners: Vec<&str> = owners.iter().copied().collect();
        return Err(conflict(
            DiagnosticCode::QueueContention,
            location::in_domain(domain, &location::keyed("ports", port)),
            format!(
                "port {} in domain {}: specs {} need {} queues but {} offers {}",
                port,
                domain,
                owners.join(", "),
                tiers.len(),
                profile.profile_id,
                max_queues
            ),
        ));
    }
    Ok(())
}

fn check_group_limit(
    domain: &str,
    specs: &[&CanonicalSpec],
    profile: &Profile,
) -> Result<(), Diagnostic> {
    let limit = profile.multicast.max_groups as usize;
    let owners: Vec<&str> = specs
        .iter()
        .filter(|s| !s.multicast.is_empty())
        .map(|s| s.id.as_str())
        .collect();
    let total: usize = specs.iter().map(|s| s.multicast.len()).sum();
    if owners.len() < 2 || total <= limit {
        return Ok(());
    }
    Err(conflict(
        DiagnosticCode::GroupLimitExceeded,
        location::in_domain(domain, "multicast"),
        format!(
            "domain {}: specs {} declare {} multicast groups but {} holds {}",
            domain,
            owners.join(", "),
            total,
            profile.profile_id,
            limit
        ),
    ))
}
