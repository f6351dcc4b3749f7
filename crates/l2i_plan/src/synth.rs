//! IR synthesis.
//!
//! Resolves a composed plan against each domain's profile. Input is assumed
//! to have passed capability matching, so there is no deny path here: any
//! broken assumption is reported as an `internal_inconsistency` fatal
//! diagnostic.

use crate::compose::{ComposedPlan, DomainPlan, Sourced};
use crate::ir::{
    CommitMode, DomainAction, FlowMatch, IrPlan, MeterAction, MeterInstance, MulticastAction,
    QueueAction, Replica, Replication, Scheduling,
};
use l2i_core::{
    location, Deployment, Diagnostic, DiagnosticCode, GroupMode, MeterAlgorithm, Profile, Rate,
    SchemaVersion,
};
use l2i_spec::{Flow, MeterRequest, MulticastGroup, PriorityTier};
use std::collections::{BTreeMap, BTreeSet};

/// Default burst window in milliseconds
const BURST_WINDOW_MS: u64 = 10;

/// Smallest burst that still admits one full-size frame
const MIN_BURST_BYTES: u64 = 1_500;

/// Turns a [`ComposedPlan`] into an [`IrPlan`]
#[derive(Debug, Clone, Copy, Default)]
pub struct Synthesizer;

impl Synthesizer {
    /// Create a new synthesizer
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Resolve every domain of `plan` against its profile in `deployment`
    ///
    /// # Errors
    ///
    /// Returns `internal_inconsistency` diagnostics when the plan breaks an
    /// assumption capability matching should have guaranteed
    pub fn synthesize(
        &self,
        plan: &ComposedPlan,
        deployment: &Deployment,
    ) -> Result<IrPlan, Vec<Diagnostic>> {
        let mut issues = Vec::new();
        let mut domains = Vec::with_capacity(plan.domains.len());

        for domain in &plan.domains {
            match deployment.profile(&domain.domain) {
                Some(profile) => {
                    let mut ctx = DomainContext {
                        domain: &domain.domain,
                        profile,
                        issues: &mut issues,
                    };
                    domains.push(ctx.resolve(domain));
                }
                None => issues.push(inconsistency(
                    location::keyed("domains", &domain.domain),
                    "domain has no profile in the deployment".to_string(),
                )),
            }
        }

        if !issues.is_empty() {
            tracing::warn!(issues = issues.len(), "synthesis found internal inconsistencies");
            return Err(issues);
        }

        let ir = IrPlan {
            version: SchemaVersion::CURRENT,
            negotiation_rounds: plan.negotiation_rounds,
            domains,
        };
        tracing::debug!(
            domains = ir.domains.len(),
            actions = ir.action_count(),
            "ir synthesized"
        );
        Ok(ir)
    }
}

fn inconsistency(at: String, message: String) -> Diagnostic {
    Diagnostic::fatal(DiagnosticCode::InternalInconsistency, at, message)
}

/// Per-domain resolution state
struct DomainContext<'a> {
    domain: &'a str,
    profile: &'a Profile,
    issues: &'a mut Vec<Diagnostic>,
}

impl DomainContext<'_> {
    fn report(&mut self, resource: String, message: String) {
        self.issues.push(inconsistency(
            location::in_domain(self.domain, &resource),
            message,
        ));
    }

    fn port_id(&mut self, port: &str, resource: &str) -> Option<u32> {
        let id = self
            .profile
            .port_index(port)
            .and_then(|i| u32::try_from(i).ok());
        if id.is_none() {
            self.report(
                resource.to_string(),
                format!("port {:?} is not in the {} inventory", port, self.profile.profile_id),
            );
        }
        id
    }

    fn resolve(&mut self, plan: &DomainPlan) -> DomainAction {
        let commit = if plan.atomic_commit {
            if !self.profile.atomic_commit {
                self.report(
                    "commit".to_string(),
                    "atomic commit requested on a non-transactional domain".to_string(),
                );
            }
            CommitMode::Atomic
        } else {
            CommitMode::BestEffort
        };

        let queues = self.queues(&plan.flows);
        let meters = self.meters(&plan.meters, &plan.flows);
        let multicast = self.multicast(&plan.multicast);

        DomainAction {
            domain: self.domain.to_string(),
            profile_id: self.profile.profile_id.clone(),
            commit,
            queues,
            meters,
            multicast,
        }
    }

    fn queues(&mut self, flows: &[Sourced<Flow>]) -> Vec<QueueAction> {
        // distinct tiers per port, highest first
        let mut tiers: BTreeMap<&str, BTreeSet<PriorityTier>> = BTreeMap::new();
        for flow in flows {
            tiers
                .entry(flow.item.port.as_str())
                .or_default()
                .insert(flow.item.priority);
        }

        let profile = self.profile;
        let max_queues = profile.queues.max_queues;
        let mut actions = Vec::with_capacity(flows.len());
        for Sourced { spec, item: flow } in flows {
            let resource = location::keyed("flows", &flow.id);
            let Some(port_id) = self.port_id(&flow.port, &resource) else {
                continue;
            };
            let queue = tiers
                .get(flow.port.as_str())
                .and_then(|t| t.iter().rev().position(|p| *p == flow.priority))
                .and_then(|i| u32::try_from(i).ok())
                .unwrap_or(u32::MAX);
            if queue >= max_queues {
                self.report(
                    resource.clone(),
                    format!("queue index {} exceeds the {} available queues", queue, max_queues),
                );
            }

            let scheduling = match flow.weight {
                None => Scheduling::Strict,
                Some(weight) => {
                    if !profile.supports_wfq() || profile.clamp_weight(weight) != weight {
                        self.report(
                            resource.clone(),
                            format!(
                                "weight {} is not schedulable on {}",
                                weight, profile.profile_id
                            ),
                        );
                    }
                    Scheduling::Wfq { weight }
                }
            };

            if let Some(port) = profile.port(&flow.port) {
                if flow.bandwidth.max > port.speed() {
                    self.report(
                        resource.clone(),
                        format!("{} exceeds port speed {}", flow.bandwidth.max, port.speed()),
                    );
                }
            }

            actions.push(QueueAction {
                spec: spec.clone(),
                flow: flow.id.clone(),
                matches: flow_match(flow),
                port: flow.port.clone(),
                port_id,
                queue,
                scheduling,
                dscp: flow.effective_dscp(),
                min_rate: flow.bandwidth.min,
                max_rate: flow.bandwidth.max,
            });
        }

        actions.sort_by(|a, b| {
            (&a.port, a.queue, &a.flow, &a.spec).cmp(&(&b.port, b.queue, &b.flow, &b.spec))
        });
        actions
    }

    fn meters(
        &mut self,
        meters: &[Sourced<MeterRequest>],
        flows: &[Sourced<Flow>],
    ) -> Vec<MeterAction> {
        let profile = self.profile;
        let limits = &profile.meters;
        if !meters.is_empty() && !limits.supported {
            self.report(
                "meters".to_string(),
                format!("{} has no metering", profile.profile_id),
            );
            return Vec::new();
        }

        let mut actions = Vec::with_capacity(meters.len());
        for (index, Sourced { spec, item: meter }) in meters.iter().enumerate() {
            let resource = location::keyed("meters", &meter.id);
            let Some(algorithm) = meter.algorithm.or_else(|| limits.types.first().copied()) else {
                continue;
            };
            if !limits.offers(algorithm) {
                self.report(
                    resource.clone(),
                    format!("{} is not offered by {}", algorithm, profile.profile_id),
                );
            }
            if meter.rate < limits.min_rate() || meter.rate > limits.max_rate() {
                self.report(
                    resource.clone(),
                    format!(
                        "rate {} outside [{}, {}]",
                        meter.rate,
                        limits.min_rate(),
                        limits.max_rate()
                    ),
                );
            }

            let flow = match &meter.flow {
                None => None,
                Some(id) => {
                    let found = flows
                        .iter()
                        .find(|f| &f.spec == spec && &f.item.id == id)
                        .map(|f| &f.item);
                    if found.is_none() {
                        self.report(
                            resource.clone(),
                            format!("meter references unknown flow {:?}", id),
                        );
                    }
                    found
                }
            };

            let Ok(index) = u32::try_from(index) else {
                self.report(resource, "meter index overflow".to_string());
                continue;
            };

            actions.push(MeterAction {
                spec: spec.clone(),
                meter: meter.id.clone(),
                index,
                flow: flow.map(|f| (f.id.clone(), flow_match(f))),
                instance: meter_instance(algorithm, meter, flow),
            });
        }
        actions
    }

    fn multicast(&mut self, groups: &[Sourced<MulticastGroup>]) -> Vec<MulticastAction> {
        if groups.is_empty() {
            return Vec::new();
        }
        let profile = self.profile;
        let limits = &profile.multicast;
        if groups.len() > limits.max_groups as usize {
            self.report(
                "multicast".to_string(),
                format!("{} groups exceed the limit of {}", groups.len(), limits.max_groups),
            );
        }

        let mut actions = Vec::with_capacity(groups.len());
        for Sourced { spec, item: group } in groups {
            let resource = location::keyed("multicast", &group.id);
            if !limits.mode.supports(group.mode) {
                self.report(
                    resource.clone(),
                    format!("{} membership is not expressible in {} mode", group.mode, limits.mode),
                );
            }
            if group.replicas > limits.max_replications_per_group {
                self.report(
                    resource.clone(),
                    format!(
                        "{} replicas exceed the limit of {}",
                        group.replicas, limits.max_replications_per_group
                    ),
                );
            }

            let replication = match group.mode {
                GroupMode::Flood => Replication::Flood,
                GroupMode::Static | GroupMode::Dynamic => {
                    let mut replicas = Vec::new();
                    for (instance, port) in group.members.iter().take(group.replicas as usize).enumerate() {
                        let Some(port_id) = self.port_id(port, &resource) else {
                            continue;
                        };
                        replicas.push(Replica {
                            port: port.clone(),
                            port_id,
                            instance: u32::try_from(instance).unwrap_or(u32::MAX),
                        });
                    }
                    Replication::Static { replicas }
                }
            };

            actions.push(MulticastAction {
                spec: spec.clone(),
                group_id: group.id,
                address: group.address.clone(),
                replication,
            });
        }
        actions
    }
}

fn flow_match(flow: &Flow) -> FlowMatch {
    FlowMatch {
        src: flow.src.clone(),
        dst: flow.dst.clone(),
        dst_port: flow.dst_port,
    }
}

fn burst_bytes(explicit_kbytes: Option<u32>, rate: Rate) -> u64 {
    match explicit_kbytes {
        Some(kbytes) => u64::from(kbytes) * 1_000,
        None => rate.bytes_over_ms(BURST_WINDOW_MS).max(MIN_BURST_BYTES),
    }
}

fn meter_instance(algorithm: MeterAlgorithm, meter: &MeterRequest, flow: Option<&Flow>) -> MeterInstance {
    match algorithm {
        MeterAlgorithm::Tbf => MeterInstance::Tbf {
            rate: meter.rate,
            burst: burst_bytes(meter.burst_kbytes, meter.rate),
        },
        MeterAlgorithm::Srtcm => {
            let cbs = burst_bytes(meter.burst_kbytes, meter.rate);
            MeterInstance::Srtcm {
                cir: meter.rate,
                cbs,
                ebs: cbs.saturating_mul(2),
            }
        }
        MeterAlgorithm::Trtcm => {
            let cir = flow.map_or(meter.rate, |f| f.bandwidth.min.min(meter.rate));
            MeterInstance::Trtcm {
                cir,
                pir: meter.rate,
                cbs: burst_bytes(meter.burst_kbytes, cir),
                pbs: burst_bytes(meter.burst_kbytes, meter.rate),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::Composer;
    use l2i_spec::{BandwidthRange, CanonicalSpec};

    fn flow(id: &str, port: &str, priority: PriorityTier) -> Flow {
        Flow {
            id: id.to_string(),
            src: "10.0.0.1".to_string(),
            dst: "10.0.0.3".to_string(),
            port: port.to_string(),
            dst_port: Some(5001),
            priority,
            bandwidth: BandwidthRange {
                min: Rate::from_mbps(5),
                max: Rate::from_mbps(6),
            },
            latency_max_ms: 30.0,
            weight: None,
            dscp: None,
        }
    }

    fn synth(spec: CanonicalSpec, profile: &str) -> Result<IrPlan, Vec<Diagnostic>> {
        let deployment = Deployment::single("A", Profile::embedded(profile).unwrap());
        let plan = Composer::new().compose(&[spec], &deployment).unwrap();
        Synthesizer::new().synthesize(&plan, &deployment)
    }

    #[test]
    fn test_single_flow() {
        let mut spec = CanonicalSpec::new("s1");
        spec.flows.push(flow("f1", "eth0", PriorityTier::Medium));
        let ir = synth(spec, "legacy").unwrap();
        let domain = ir.domain("A").unwrap();
        assert_eq!(domain.profile_id, "legacy-vlan-tc");
        assert_eq!(domain.commit, CommitMode::BestEffort);
        assert_eq!(domain.action_count(), 1);
        let queue = &domain.queues[0];
        assert_eq!(queue.queue, 0);
        assert_eq!(queue.port_id, 0);
        assert_eq!(queue.dscp, 26);
        assert_eq!(queue.scheduling, Scheduling::Strict);
    }

    #[test]
    fn test_highest_tier_gets_lowest_index() {
        let mut spec = CanonicalSpec::new("s1");
        spec.flows.push(flow("a", "eth0", PriorityTier::Low));
        spec.flows.push(flow("b", "eth0", PriorityTier::High));
        spec.flows.push(flow("c", "eth0", PriorityTier::Low));
        spec.flows.push(flow("d", "eth1", PriorityTier::Low));
        let ir = synth(spec, "legacy").unwrap();
        let order: Vec<_> = ir.domains[0]
            .queues
            .iter()
            .map(|q| (q.flow.as_str(), q.queue))
            .collect();
        assert_eq!(order, vec![("b", 0), ("a", 1), ("c", 1), ("d", 0)]);
    }

    #[test]
    fn test_trtcm_uses_flow_minimum() {
        let mut spec = CanonicalSpec::new("s1");
        spec.flows.push(flow("f1", "p1", PriorityTier::High));
        spec.meters.push(MeterRequest {
            id: "m1".to_string(),
            flow: Some("f1".to_string()),
            rate: Rate::from_mbps(8),
            burst_kbytes: None,
            algorithm: None,
        });
        let ir = synth(spec, "p4").unwrap();
        let meter = &ir.domains[0].meters[0];
        assert_eq!(
            meter.instance,
            MeterInstance::Trtcm {
                cir: Rate::from_mbps(5),
                pir: Rate::from_mbps(8),
                cbs: 6_250,
                pbs: 10_000,
            }
        );
        assert_eq!(meter.flow.as_ref().map(|(id, _)| id.as_str()), Some("f1"));
    }

    #[test]
    fn test_tbf_burst_floor() {
        let mut spec = CanonicalSpec::new("s1");
        spec.meters.push(MeterRequest {
            id: "m1".to_string(),
            flow: None,
            rate: Rate::from_mbps(1),
            burst_kbytes: None,
            algorithm: Some(MeterAlgorithm::Tbf),
        });
        let ir = synth(spec, "legacy").unwrap();
        assert_eq!(
            ir.domains[0].meters[0].instance,
            MeterInstance::Tbf {
                rate: Rate::from_mbps(1),
                burst: 1_500,
            }
        );
    }

    #[test]
    fn test_static_replicas_truncated() {
        let mut spec = CanonicalSpec::new("s2");
        spec.multicast.push(MulticastGroup {
            id: 1,
            members: vec!["p2".to_string(), "p1".to_string()],
            replicas: 1,
            mode: GroupMode::Static,
            address: Some("239.1.1.1".to_string()),
        });
        let ir = synth(spec, "p4").unwrap();
        let action = &ir.domains[0].multicast[0];
        assert_eq!(
            action.replication,
            Replication::Static {
                replicas: vec![Replica {
                    port: "p2".to_string(),
                    port_id: 1,
                    instance: 0,
                }]
            }
        );
    }

    #[test]
    fn test_flood_on_vlan_domain() {
        let mut spec = CanonicalSpec::new("s2");
        spec.multicast.push(MulticastGroup {
            id: 3,
            members: vec!["eth0".to_string(), "eth1".to_string()],
            replicas: 2,
            mode: GroupMode::Flood,
            address: None,
        });
        let ir = synth(spec, "legacy").unwrap();
        assert_eq!(ir.domains[0].multicast[0].replication, Replication::Flood);
    }

    #[test]
    fn test_unchecked_input_is_internal_inconsistency() {
        let mut spec = CanonicalSpec::new("s1");
        spec.flows.push(flow("f1", "eth9", PriorityTier::Medium));
        spec.meters.push(MeterRequest {
            id: "m1".to_string(),
            flow: None,
            rate: Rate::from_mbps(50_000),
            burst_kbytes: None,
            algorithm: Some(MeterAlgorithm::Srtcm),
        });
        let issues = synth(spec, "legacy").unwrap_err();
        assert!(issues.len() >= 3);
        assert!(issues.iter().all(|d| {
            d.code == DiagnosticCode::InternalInconsistency
                && d.severity == l2i_core::Severity::Fatal
        }));
        assert_eq!(issues[0].location, "domains[id=A].flows[id=f1]");
    }

    #[test]
    fn test_synthesis_deterministic() {
        let mut spec = CanonicalSpec::new("s1");
        spec.flows.push(flow("f2", "eth1", PriorityTier::High));
        spec.flows.push(flow("f1", "eth0", PriorityTier::Low));
        let a = synth(spec.clone(), "legacy").unwrap();
        let b = synth(spec, "legacy").unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
