//! Backend-neutral intermediate representation.
//!
//! An [`IrPlan`] is fully resolved: every queue has a concrete index, every
//! meter a concrete algorithm instance, every multicast group a replication
//! descriptor. Emitters read it and nothing else.

use l2i_core::{MeterAlgorithm, Rate, SchemaVersion};
use serde::{Deserialize, Serialize};

/// How a domain applies its configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitMode {
    /// All-or-nothing
    Atomic,
    /// Each change applies independently
    BestEffort,
}

/// Packet classification key of a flow
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowMatch {
    /// Source address
    pub src: String,
    /// Destination address
    pub dst: String,
    /// L4 destination port
    pub dst_port: Option<u16>,
}

/// Scheduling discipline of a queue
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Scheduling {
    /// Strict priority by queue index
    Strict,
    /// Weighted fair share within the queue
    Wfq {
        /// Relative weight
        weight: f64,
    },
}

/// One flow's queue assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueAction {
    /// Owning spec
    pub spec: String,
    /// Flow id
    pub flow: String,
    /// Classification key
    pub matches: FlowMatch,
    /// Egress port name
    pub port: String,
    /// Egress port number (position in the profile inventory)
    pub port_id: u32,
    /// Queue index; 0 is the highest priority
    pub queue: u32,
    /// Scheduling discipline
    pub scheduling: Scheduling,
    /// DSCP to mark
    pub dscp: u8,
    /// Guaranteed rate
    pub min_rate: Rate,
    /// Ceiling rate
    pub max_rate: Rate,
}

/// Concrete meter algorithm instance; burst sizes are in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum MeterInstance {
    /// Token bucket filter
    Tbf {
        /// Shaped rate
        rate: Rate,
        /// Bucket depth
        burst: u64,
    },
    /// Single-rate three-color marker
    Srtcm {
        /// Committed information rate
        cir: Rate,
        /// Committed burst size
        cbs: u64,
        /// Excess burst size
        ebs: u64,
    },
    /// Two-rate three-color marker
    Trtcm {
        /// Committed information rate
        cir: Rate,
        /// Peak information rate
        pir: Rate,
        /// Committed burst size
        cbs: u64,
        /// Peak burst size
        pbs: u64,
    },
}

impl MeterInstance {
    /// The algorithm family
    #[must_use]
    pub const fn algorithm(&self) -> MeterAlgorithm {
        match self {
            Self::Tbf { .. } => MeterAlgorithm::Tbf,
            Self::Srtcm { .. } => MeterAlgorithm::Srtcm,
            Self::Trtcm { .. } => MeterAlgorithm::Trtcm,
        }
    }

    /// Committed rate
    #[must_use]
    pub const fn committed_rate(&self) -> Rate {
        match self {
            Self::Tbf { rate, .. } => *rate,
            Self::Srtcm { cir, .. } | Self::Trtcm { cir, .. } => *cir,
        }
    }

    /// Highest rate the meter admits
    #[must_use]
    pub const fn peak_rate(&self) -> Rate {
        match self {
            Self::Tbf { rate, .. } => *rate,
            Self::Srtcm { cir, .. } => *cir,
            Self::Trtcm { pir, .. } => *pir,
        }
    }
}

/// One meter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterAction {
    /// Owning spec
    pub spec: String,
    /// Meter id
    pub meter: String,
    /// Meter index within the domain
    pub index: u32,
    /// Flow the meter polices and its classification key
    pub flow: Option<(String, FlowMatch)>,
    /// Algorithm instance
    pub instance: MeterInstance,
}

/// One replica of a static multicast group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Replica {
    /// Egress port name
    pub port: String,
    /// Egress port number
    pub port_id: u32,
    /// Replica instance id
    pub instance: u32,
}

/// How a group's traffic is replicated
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Replication {
    /// Flood the VLAN; no explicit membership
    Flood,
    /// Explicit replica list
    Static {
        /// Replicas, in member order
        replicas: Vec<Replica>,
    },
}

/// One multicast group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MulticastAction {
    /// Owning spec
    pub spec: String,
    /// Group id
    pub group_id: u32,
    /// Group address
    pub address: Option<String>,
    /// Replication descriptor
    pub replication: Replication,
}

/// Everything to configure in one domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainAction {
    /// Domain id
    pub domain: String,
    /// Profile the actions were resolved against
    pub profile_id: String,
    /// Commit discipline
    pub commit: CommitMode,
    /// Queue assignments, by (port, queue, flow, spec)
    pub queues: Vec<QueueAction>,
    /// Meters, by index
    pub meters: Vec<MeterAction>,
    /// Multicast groups, by group id
    pub multicast: Vec<MulticastAction>,
}

impl DomainAction {
    /// Number of configuration changes in this domain
    #[must_use]
    pub fn action_count(&self) -> usize {
        self.queues.len() + self.meters.len() + self.multicast.len()
    }
}

/// Fully resolved plan, one entry per domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrPlan {
    /// Schema version of the plan
    pub version: SchemaVersion,
    /// Negotiation round limit for an adaptive controller
    pub negotiation_rounds: Option<u32>,
    /// Per-domain actions, sorted by domain id
    pub domains: Vec<DomainAction>,
}

impl IrPlan {
    /// Look up a domain
    #[must_use]
    pub fn domain(&self, domain: &str) -> Option<&DomainAction> {
        self.domains.iter().find(|d| d.domain == domain)
    }

    /// Total configuration changes across domains
    #[must_use]
    pub fn action_count(&self) -> usize {
        self.domains.iter().map(DomainAction::action_count).sum()
    }
}
