//! Canonical (validated, normalized) intent specification.
//!
//! Every collection is sorted by its identifier, rates are whole kbit/s,
//! and every cross-reference has been resolved. Stages that modify a spec
//! return a new value; none mutate their input.

use l2i_core::{GroupMode, MeterAlgorithm, Rate, SchemaVersion, TelemetryMetric};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Priority tier of a flow, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    /// Background traffic
    BestEffort,
    /// Low priority
    Low,
    /// Medium priority
    Medium,
    /// High priority
    High,
    /// Network-critical traffic
    Critical,
}

impl PriorityTier {
    /// All tiers, lowest first
    pub const ALL: [Self; 5] = [
        Self::BestEffort,
        Self::Low,
        Self::Medium,
        Self::High,
        Self::Critical,
    ];

    /// Parse the snake_case name
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "best_effort" => Some(Self::BestEffort),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Snake_case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BestEffort => "best_effort",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// DiffServ code point used when a flow does not pick one
    #[must_use]
    pub const fn default_dscp(self) -> u8 {
        match self {
            Self::Critical => 46, // EF
            Self::High => 34,     // AF41
            Self::Medium => 26,   // AF31
            Self::Low => 10,      // AF11
            Self::BestEffort => 0,
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Guaranteed minimum and shaped maximum bandwidth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BandwidthRange {
    /// Guaranteed rate
    pub min: Rate,
    /// Ceiling rate
    pub max: Rate,
}

/// A unicast flow with its QoS treatment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    /// Flow identifier, unique within the spec
    pub id: String,
    /// Source endpoint (host or address)
    pub src: String,
    /// Destination endpoint (host or address)
    pub dst: String,
    /// Egress port in the target domain
    pub port: String,
    /// L4 destination port, if the flow is port-specific
    pub dst_port: Option<u16>,
    /// Priority tier
    pub priority: PriorityTier,
    /// Bandwidth bounds
    pub bandwidth: BandwidthRange,
    /// Latency bound in milliseconds
    pub latency_max_ms: f64,
    /// WFQ weight, if the flow asks for weighted sharing
    pub weight: Option<f64>,
    /// Explicit DSCP marking
    pub dscp: Option<u8>,
}

impl Flow {
    /// DSCP to mark, explicit or derived from the tier
    #[must_use]
    pub fn effective_dscp(&self) -> u8 {
        self.dscp.unwrap_or_else(|| self.priority.default_dscp())
    }
}

/// A multicast group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MulticastGroup {
    /// Group identifier, unique within a domain
    pub id: u32,
    /// Member egress ports, in declaration order
    pub members: Vec<String>,
    /// Replication fan-out
    pub replicas: u32,
    /// Membership mode
    pub mode: GroupMode,
    /// Group address, e.g. `239.1.1.1`
    pub address: Option<String>,
}

/// A metering request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterRequest {
    /// Meter identifier, unique within the spec
    pub id: String,
    /// Flow the meter polices, if any
    pub flow: Option<String>,
    /// Target rate
    pub rate: Rate,
    /// Burst size in kilobytes
    pub burst_kbytes: Option<u32>,
    /// Requested algorithm; the domain's preferred one when absent
    pub algorithm: Option<MeterAlgorithm>,
}

/// Deployment-wide requirements of an intent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    /// Changes must apply all-or-nothing
    pub atomic_commit: bool,
    /// Telemetry the caller expects to collect
    pub telemetry: BTreeSet<TelemetryMetric>,
    /// Rounds an adaptive controller may renegotiate
    pub max_negotiation_rounds: Option<u32>,
}

/// The validated, normalized form of an intent document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalSpec {
    /// Schema version the document was written against
    pub version: SchemaVersion,
    /// Spec identifier
    pub id: String,
    /// Target domain, if named
    pub domain: Option<String>,
    /// Flows, sorted by id
    pub flows: Vec<Flow>,
    /// Multicast groups, sorted by id
    pub multicast: Vec<MulticastGroup>,
    /// Meters, sorted by id
    pub meters: Vec<MeterRequest>,
    /// Requirements
    pub requirements: Requirements,
}

impl CanonicalSpec {
    /// Create an empty spec with the given id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            version: SchemaVersion::CURRENT,
            id: id.into(),
            domain: None,
            flows: Vec::new(),
            multicast: Vec::new(),
            meters: Vec::new(),
            requirements: Requirements::default(),
        }
    }

    /// Look up a flow
    #[must_use]
    pub fn flow(&self, id: &str) -> Option<&Flow> {
        self.flows.iter().find(|f| f.id == id)
    }

    /// Flows egressing through `port`
    pub fn flows_on_port<'a>(&'a self, port: &'a str) -> impl Iterator<Item = &'a Flow> + 'a {
        self.flows.iter().filter(move |f| f.port == port)
    }

    /// Distinct egress ports, sorted
    #[must_use]
    pub fn ports(&self) -> BTreeSet<&str> {
        self.flows.iter().map(|f| f.port.as_str()).collect()
    }

    /// Sum of guaranteed bandwidth
    #[must_use]
    pub fn aggregate_min(&self) -> Rate {
        self.flows.iter().map(|f| f.bandwidth.min).sum()
    }

    /// Sum of bandwidth ceilings
    #[must_use]
    pub fn aggregate_max(&self) -> Rate {
        self.flows.iter().map(|f| f.bandwidth.max).sum()
    }

    /// Restore canonical ordering after a stage rewrote collections
    pub fn normalize(&mut self) {
        self.flows.sort_by(|a, b| a.id.cmp(&b.id));
        self.multicast.sort_by_key(|g| g.id);
        self.meters.sort_by(|a, b| a.id.cmp(&b.id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(id: &str, port: &str, min: u64, max: u64) -> Flow {
        Flow {
            id: id.to_string(),
            src: "10.0.0.1".to_string(),
            dst: "10.0.0.3".to_string(),
            port: port.to_string(),
            dst_port: None,
            priority: PriorityTier::Medium,
            bandwidth: BandwidthRange {
                min: Rate::from_mbps(min),
                max: Rate::from_mbps(max),
            },
            latency_max_ms: 30.0,
            weight: None,
            dscp: None,
        }
    }

    #[test]
    fn test_priority_order() {
        assert!(PriorityTier::BestEffort < PriorityTier::Low);
        assert!(PriorityTier::High < PriorityTier::Critical);
        assert_eq!(PriorityTier::parse("high"), Some(PriorityTier::High));
        assert_eq!(PriorityTier::parse("urgent"), None);
    }

    #[test]
    fn test_effective_dscp() {
        let mut f = flow("f1", "eth0", 5, 6);
        assert_eq!(f.effective_dscp(), 26);
        f.dscp = Some(40);
        assert_eq!(f.effective_dscp(), 40);
    }

    #[test]
    fn test_aggregates() {
        let mut spec = CanonicalSpec::new("s1");
        spec.flows.push(flow("f1", "eth0", 5, 6));
        spec.flows.push(flow("f2", "eth1", 10, 12));
        assert_eq!(spec.aggregate_min(), Rate::from_mbps(15));
        assert_eq!(spec.aggregate_max(), Rate::from_mbps(18));
        assert_eq!(spec.flows_on_port("eth0").count(), 1);
        assert_eq!(spec.ports().into_iter().collect::<Vec<_>>(), vec!["eth0", "eth1"]);
    }

    #[test]
    fn test_normalize_sorts() {
        let mut spec = CanonicalSpec::new("s1");
        spec.flows.push(flow("f2", "eth0", 1, 2));
        spec.flows.push(flow("f1", "eth0", 1, 2));
        spec.normalize();
        assert_eq!(spec.flows[0].id, "f1");
    }
}
