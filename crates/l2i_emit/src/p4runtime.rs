//! P4Runtime-like emitter.
//!
//! Renders table-entry descriptors against the `ingress` control of the
//! reference pipeline: `tbl_flow_qos` marks and enqueues unicast flows,
//! `tbl_meter` binds flows to meter instances, `tbl_route_mcast` steers
//! group traffic. Static groups also get a packet-replication-engine entry.

use crate::artifact::{Backend, CanonicalArtifact, Emitter};
use l2i_plan::{
    CommitMode, DomainAction, FlowMatch, IrPlan, MeterAction, MeterInstance, MulticastAction,
    QueueAction, Replication,
};
use serde::{Deserialize, Serialize};

const TBL_FLOW_QOS: &str = "ingress.tbl_flow_qos";
const TBL_METER: &str = "ingress.tbl_meter";
const TBL_ROUTE_MCAST: &str = "ingress.tbl_route_mcast";

/// An exact-match field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchField {
    /// Header field name
    pub field: String,
    /// Rendered value
    pub value: String,
}

impl MatchField {
    fn new(field: &str, value: impl ToString) -> Self {
        Self {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

/// An action parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionParam {
    /// Parameter name
    pub name: String,
    /// Value
    pub value: u64,
}

impl ActionParam {
    fn new(name: &str, value: u64) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

/// One table entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableEntry {
    /// Fully qualified table name
    pub table: String,
    /// Match key
    pub match_key: Vec<MatchField>,
    /// Fully qualified action name
    pub action: String,
    /// Action parameters
    pub params: Vec<ActionParam>,
    /// Entry priority; higher wins
    pub priority: u32,
}

/// One replica of a multicast group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicaEntry {
    /// Egress port number
    pub egress_port: u32,
    /// Replica instance id
    pub instance: u32,
}

/// Packet replication engine group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MulticastGroupEntry {
    /// Group id
    pub group_id: u32,
    /// Replicas
    pub replicas: Vec<ReplicaEntry>,
}

/// Everything written to one device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct P4Device {
    /// Domain id
    pub domain: String,
    /// Profile the plan was resolved against
    pub profile_id: String,
    /// Whether the writes must form one atomic batch
    pub atomic: bool,
    /// Table entries, in IR order
    pub table_entries: Vec<TableEntry>,
    /// Replication groups, by group id
    pub multicast_groups: Vec<MulticastGroupEntry>,
}

/// P4Runtime-like rendering of an IR plan
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct P4RuntimeArtifact {
    /// IR schema version
    pub version: String,
    /// One entry per domain
    pub devices: Vec<P4Device>,
}

impl P4RuntimeArtifact {
    /// Total table entries across devices
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.devices.iter().map(|d| d.table_entries.len()).sum()
    }
}

impl CanonicalArtifact for P4RuntimeArtifact {}

/// Emits [`P4RuntimeArtifact`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct P4RuntimeEmitter;

impl P4RuntimeEmitter {
    /// Create a new emitter
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Emitter for P4RuntimeEmitter {
    type Artifact = P4RuntimeArtifact;

    fn backend(&self) -> Backend {
        Backend::P4runtime
    }

    fn emit(&self, plan: &IrPlan) -> P4RuntimeArtifact {
        let artifact = P4RuntimeArtifact {
            version: plan.version.to_string(),
            devices: plan.domains.iter().map(device).collect(),
        };
        tracing::debug!(
            devices = artifact.devices.len(),
            entries = artifact.entry_count(),
            "p4runtime artifact emitted"
        );
        artifact
    }
}

fn device(domain: &DomainAction) -> P4Device {
    let table_entries = domain
        .queues
        .iter()
        .map(qos_entry)
        .chain(domain.meters.iter().map(meter_entry))
        .chain(domain.multicast.iter().map(route_entry))
        .collect();

    let multicast_groups = domain
        .multicast
        .iter()
        .filter_map(|g| match &g.replication {
            Replication::Flood => None,
            Replication::Static { replicas } => Some(MulticastGroupEntry {
                group_id: g.group_id,
                replicas: replicas
                    .iter()
                    .map(|r| ReplicaEntry {
                        egress_port: r.port_id,
                        instance: r.instance,
                    })
                    .collect(),
            }),
        })
        .collect();

    P4Device {
        domain: domain.domain.clone(),
        profile_id: domain.profile_id.clone(),
        atomic: domain.commit == CommitMode::Atomic,
        table_entries,
        multicast_groups,
    }
}

fn flow_key(matches: &FlowMatch) -> Vec<MatchField> {
    let mut key = vec![
        MatchField::new("hdr.ipv4.srcAddr", &matches.src),
        MatchField::new("hdr.ipv4.dstAddr", &matches.dst),
    ];
    if let Some(port) = matches.dst_port {
        key.push(MatchField::new("hdr.udp.dstPort", port));
    }
    key
}

fn qos_entry(q: &QueueAction) -> TableEntry {
    TableEntry {
        table: TBL_FLOW_QOS.to_string(),
        match_key: flow_key(&q.matches),
        action: "ingress.set_dscp_queue".to_string(),
        params: vec![
            ActionParam::new("new_dscp", u64::from(q.dscp)),
            ActionParam::new("qid", u64::from(q.queue)),
        ],
        // queue 0 is the most urgent
        priority: u32::MAX - q.queue,
    }
}

fn meter_entry(m: &MeterAction) -> TableEntry {
    let (cburst, pburst) = match m.instance {
        MeterInstance::Tbf { burst, .. } => (burst, burst),
        MeterInstance::Srtcm { cbs, ebs, .. } => (cbs, cbs.saturating_add(ebs)),
        MeterInstance::Trtcm { cbs, pbs, .. } => (cbs, pbs),
    };
    let match_key = match &m.flow {
        Some((_, matches)) => flow_key(matches),
        None => vec![MatchField::new("meta.meter_index", m.index)],
    };
    TableEntry {
        table: TBL_METER.to_string(),
        match_key,
        action: "ingress.meter_apply".to_string(),
        params: vec![
            ActionParam::new("index", u64::from(m.index)),
            ActionParam::new("cir_kbps", m.instance.committed_rate().kbps()),
            ActionParam::new("pir_kbps", m.instance.peak_rate().kbps()),
            ActionParam::new("cburst", cburst),
            ActionParam::new("pburst", pburst),
        ],
        priority: 0,
    }
}

fn route_entry(g: &MulticastAction) -> TableEntry {
    let match_key = match &g.address {
        Some(address) => vec![MatchField::new("hdr.ipv4.dstAddr", address)],
        None => vec![MatchField::new("meta.mcast_group", g.group_id)],
    };
    let (action, params) = match g.replication {
        Replication::Flood => ("ingress.flood", Vec::new()),
        Replication::Static { .. } => (
            "ingress.set_mcast",
            vec![ActionParam::new("grp", u64::from(g.group_id))],
        ),
    };
    TableEntry {
        table: TBL_ROUTE_MCAST.to_string(),
        match_key,
        action: action.to_string(),
        params,
        priority: 0,
    }
}
