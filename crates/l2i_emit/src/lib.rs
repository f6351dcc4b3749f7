//! L2I Emitters
//!
//! Pure renderers from an [`l2i_plan::IrPlan`] to backend artifacts. An
//! emitter reads the plan and nothing else: no profile, no raw spec. The
//! same plan always renders to the same bytes.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod artifact;
pub mod netconf;
pub mod p4runtime;

pub use artifact::{Artifact, Backend, CanonicalArtifact, Emitter};
pub use netconf::{
    Datastore, EditConfigFragment, EditOperation, EditSession, Leaf, NetconfArtifact,
    NetconfEmitter,
};
pub use p4runtime::{
    ActionParam, MatchField, MulticastGroupEntry, P4Device, P4RuntimeArtifact, P4RuntimeEmitter,
    ReplicaEntry, TableEntry,
};

#[cfg(test)]
pub(crate) mod fixtures {
    use l2i_core::{Rate, SchemaVersion};
    use l2i_plan::{
        CommitMode, DomainAction, FlowMatch, IrPlan, MeterAction, MeterInstance, MulticastAction,
        QueueAction, Replica, Replication, Scheduling,
    };

    pub fn flow_match() -> FlowMatch {
        FlowMatch {
            src: "10.0.0.1".to_string(),
            dst: "10.0.0.3".to_string(),
            dst_port: Some(5001),
        }
    }

    pub fn queue(flow: &str, queue: u32) -> QueueAction {
        QueueAction {
            spec: "s1".to_string(),
            flow: flow.to_string(),
            matches: flow_match(),
            port: "eth0".to_string(),
            port_id: 0,
            queue,
            scheduling: Scheduling::Strict,
            dscp: 26,
            min_rate: Rate::from_mbps(5),
            max_rate: Rate::from_mbps(6),
        }
    }

    /// One queue on a best-effort domain
    pub fn single_flow() -> IrPlan {
        IrPlan {
            version: SchemaVersion::CURRENT,
            negotiation_rounds: None,
            domains: vec![DomainAction {
                domain: "A".to_string(),
                profile_id: "legacy-vlan-tc".to_string(),
                commit: CommitMode::BestEffort,
                queues: vec![queue("f1", 0)],
                meters: Vec::new(),
                multicast: Vec::new(),
            }],
        }
    }

    /// A queue, a meter and two groups on an atomic domain
    pub fn full() -> IrPlan {
        IrPlan {
            version: SchemaVersion::CURRENT,
            negotiation_rounds: Some(5),
            domains: vec![DomainAction {
                domain: "B".to_string(),
                profile_id: "p4-bmv2-basic".to_string(),
                commit: CommitMode::Atomic,
                queues: vec![QueueAction {
                    scheduling: Scheduling::Wfq { weight: 4.0 },
                    ..queue("f1", 1)
                }],
                meters: vec![MeterAction {
                    spec: "s1".to_string(),
                    meter: "m1".to_string(),
                    index: 0,
                    flow: Some(("f1".to_string(), flow_match())),
                    instance: MeterInstance::Trtcm {
                        cir: Rate::from_mbps(5),
                        pir: Rate::from_mbps(8),
                        cbs: 6_250,
                        pbs: 10_000,
                    },
                }],
                multicast: vec![
                    MulticastAction {
                        spec: "s2".to_string(),
                        group_id: 1,
                        address: Some("239.1.1.1".to_string()),
                        replication: Replication::Static {
                            replicas: vec![
                                Replica {
                                    port: "p1".to_string(),
                                    port_id: 0,
                                    instance: 0,
                                },
                                Replica {
                                    port: "p2".to_string(),
                                    port_id: 1,
                                    instance: 1,
                                },
                            ],
                        },
                    },
                    MulticastAction {
                        spec: "s2".to_string(),
                        group_id: 2,
                        address: None,
                        replication: Replication::Flood,
                    },
                ],
            }],
        }
    }
}
