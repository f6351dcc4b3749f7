//! Capability profiles describing one domain's hardware/software envelope.
//!
//! Profiles are configuration data: decoded once at startup and never
//! mutated by the pipeline. The JSON shape matches the profile documents
//! used by the experiment tooling field for field.

use crate::error::{CoreError, CoreResult};
use crate::rate::Rate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

const LEGACY_VLAN_TC: &str = include_str!("../profiles/legacy-vlan-tc.json");
const NETCONF_L2MC: &str = include_str!("../profiles/netconf-l2mc.json");
const P4_BMV2_BASIC: &str = include_str!("../profiles/p4-bmv2-basic.json");

/// Names of the profiles compiled into the binary, with their short aliases
pub const EMBEDDED_PROFILES: &[(&str, &str)] = &[
    ("legacy", "legacy-vlan-tc"),
    ("netconf", "netconf-l2mc"),
    ("p4", "p4-bmv2-basic"),
];

/// Metering algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterAlgorithm {
    /// Token bucket filter (Linux tc)
    Tbf,
    /// Single-rate three-color marker (RFC 2697)
    Srtcm,
    /// Two-rate three-color marker (RFC 2698)
    Trtcm,
}

impl MeterAlgorithm {
    /// Parse the lowercase name
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tbf" => Some(Self::Tbf),
            "srtcm" => Some(Self::Srtcm),
            "trtcm" => Some(Self::Trtcm),
            _ => None,
        }
    }

    /// Lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tbf => "tbf",
            Self::Srtcm => "srtcm",
            Self::Trtcm => "trtcm",
        }
    }
}

impl fmt::Display for MeterAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Membership mode requested by a multicast group in an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupMode {
    /// Replicate to every port in the broadcast domain
    Flood,
    /// Fixed, explicitly listed replicas
    Static,
    /// Receivers join and leave at runtime
    Dynamic,
}

impl GroupMode {
    /// Parse the lowercase name
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "flood" => Some(Self::Flood),
            "static" => Some(Self::Static),
            "dynamic" => Some(Self::Dynamic),
            _ => None,
        }
    }

    /// Lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flood => "flood",
            Self::Static => "static",
            Self::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for GroupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Multicast replication mode offered by a domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MulticastMode {
    /// No multicast support
    None,
    /// VLAN flooding, no explicit membership
    VlanFlood,
    /// Static L2 multicast groups
    L2mcStatic,
    /// L2 multicast with dynamic membership
    L2mcDynamic,
}

impl MulticastMode {
    /// Whether groups requesting `mode` can be expressed as-is
    #[must_use]
    pub const fn supports(self, mode: GroupMode) -> bool {
        match self {
            Self::None => false,
            Self::VlanFlood => matches!(mode, GroupMode::Flood),
            Self::L2mcStatic => matches!(mode, GroupMode::Flood | GroupMode::Static),
            Self::L2mcDynamic => true,
        }
    }

    /// The group mode unsupported requests are rewritten to
    #[must_use]
    pub const fn native_group_mode(self) -> Option<GroupMode> {
        match self {
            Self::None => None,
            Self::VlanFlood => Some(GroupMode::Flood),
            Self::L2mcStatic | Self::L2mcDynamic => Some(GroupMode::Static),
        }
    }
}

impl fmt::Display for MulticastMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::VlanFlood => "vlan_flood",
            Self::L2mcStatic => "l2mc_static",
            Self::L2mcDynamic => "l2mc_dynamic",
        };
        f.write_str(name)
    }
}

/// Telemetry metric a domain may export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryMetric {
    /// RTT percentiles
    RttPercentile,
    /// Sustained throughput
    ThroughputSustained,
    /// Queue occupancy
    QueueOccupancy,
    /// Multicast delivery ratio
    DeliveryRatio,
}

impl TelemetryMetric {
    /// Parse the snake_case name
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rtt_percentile" => Some(Self::RttPercentile),
            "throughput_sustained" => Some(Self::ThroughputSustained),
            "queue_occupancy" => Some(Self::QueueOccupancy),
            "delivery_ratio" => Some(Self::DeliveryRatio),
            _ => None,
        }
    }

    /// Snake_case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RttPercentile => "rtt_percentile",
            Self::ThroughputSustained => "throughput_sustained",
            Self::QueueOccupancy => "queue_occupancy",
            Self::DeliveryRatio => "delivery_ratio",
        }
    }
}

/// Weighted-fair queueing support
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WfqSupport {
    /// Whether WFQ is available
    pub supported: bool,
    /// Smallest accepted weight
    pub weights_min: f64,
    /// Largest accepted weight
    pub weights_max: f64,
}

/// Scheduling disciplines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingModes {
    /// Strict priority available
    pub strict: bool,
    /// WFQ parameters
    pub wfq: WfqSupport,
}

/// Egress queueing envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueProfile {
    /// Queues per port
    pub max_queues: u32,
    /// Scheduling disciplines
    pub modes: SchedulingModes,
}

/// Metering envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterProfile {
    /// Whether meters can be installed at all
    pub supported: bool,
    /// Offered algorithms, in order of preference
    pub types: Vec<MeterAlgorithm>,
    /// Lowest configurable rate
    pub min_rate_mbps: u64,
    /// Highest configurable rate
    pub max_rate_mbps: u64,
}

impl MeterProfile {
    /// Lowest rate as a [`Rate`]
    #[must_use]
    pub const fn min_rate(&self) -> Rate {
        Rate::from_mbps(self.min_rate_mbps)
    }

    /// Highest rate as a [`Rate`]
    #[must_use]
    pub const fn max_rate(&self) -> Rate {
        Rate::from_mbps(self.max_rate_mbps)
    }

    /// Whether `algorithm` is offered
    #[must_use]
    pub fn offers(&self, algorithm: MeterAlgorithm) -> bool {
        self.supported && self.types.contains(&algorithm)
    }
}

/// Multicast envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MulticastProfile {
    /// Replication mode
    pub mode: MulticastMode,
    /// Maximum number of groups
    pub max_groups: u32,
    /// Maximum replicas per group
    pub max_replications_per_group: u32,
}

/// A port in the domain inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Port name, e.g. `eth0`
    pub name: String,
    /// Link speed
    pub speed_mbps: u64,
}

impl Port {
    /// Link speed as a [`Rate`]
    #[must_use]
    pub const fn speed(&self) -> Rate {
        Rate::from_mbps(self.speed_mbps)
    }
}

/// Telemetry flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySupport {
    /// RTT percentiles exported
    pub rtt_percentile: bool,
    /// Sustained throughput exported
    pub throughput_sustained: bool,
    /// Queue occupancy exported
    pub queue_occupancy: bool,
    /// Delivery ratio exported
    pub delivery_ratio: bool,
}

impl TelemetrySupport {
    /// Whether `metric` is exported
    #[must_use]
    pub const fn supports(&self, metric: TelemetryMetric) -> bool {
        match metric {
            TelemetryMetric::RttPercentile => self.rtt_percentile,
            TelemetryMetric::ThroughputSustained => self.throughput_sustained,
            TelemetryMetric::QueueOccupancy => self.queue_occupancy,
            TelemetryMetric::DeliveryRatio => self.delivery_ratio,
        }
    }
}

/// Static capability envelope of one domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile identifier
    pub profile_id: String,
    /// Queueing
    pub queues: QueueProfile,
    /// Metering
    pub meters: MeterProfile,
    /// Multicast
    pub multicast: MulticastProfile,
    /// Port inventory, in declaration order
    pub ports: Vec<Port>,
    /// Whether changes apply transactionally
    pub atomic_commit: bool,
    /// Telemetry flags
    #[serde(default)]
    pub telemetry: TelemetrySupport,
}

impl Profile {
    /// Decode and validate a profile from JSON
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed or the envelope is inconsistent
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let profile: Self = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Load a profile compiled into the binary by alias or full id
    ///
    /// # Errors
    ///
    /// Returns error if no embedded profile has this name
    pub fn embedded(name: &str) -> CoreResult<Self> {
        let json = match name {
            "legacy" | "legacy-vlan-tc" => LEGACY_VLAN_TC,
            "netconf" | "netconf-l2mc" => NETCONF_L2MC,
            "p4" | "p4-bmv2-basic" => P4_BMV2_BASIC,
            _ => {
                return Err(CoreError::UnknownProfile {
                    name: name.to_string(),
                });
            }
        };
        Self::from_json(json)
    }

    /// Check the envelope for internal consistency
    ///
    /// # Errors
    ///
    /// Returns error describing the first inconsistency found
    pub fn validate(&self) -> CoreResult<()> {
        let invalid = |reason: String| CoreError::InvalidProfile {
            profile: self.profile_id.clone(),
            reason,
        };

        if self.profile_id.trim().is_empty() {
            return Err(invalid("profile_id is empty".to_string()));
        }
        if self.queues.max_queues == 0 {
            return Err(invalid("queues.max_queues must be at least 1".to_string()));
        }
        if !self.queues.modes.strict && !self.queues.modes.wfq.supported {
            return Err(invalid("no scheduling mode supported".to_string()));
        }
        let wfq = &self.queues.modes.wfq;
        if wfq.supported
            && !(wfq.weights_min.is_finite()
                && wfq.weights_max.is_finite()
                && wfq.weights_min > 0.0
                && wfq.weights_min <= wfq.weights_max)
        {
            return Err(invalid(format!(
                "wfq weights range [{}, {}] is invalid",
                wfq.weights_min, wfq.weights_max
            )));
        }
        if self.meters.supported {
            if self.meters.types.is_empty() {
                return Err(invalid("meters supported but no types listed".to_string()));
            }
            if self.meters.min_rate_mbps > self.meters.max_rate_mbps {
                return Err(invalid(format!(
                    "meter rate range [{}, {}] is inverted",
                    self.meters.min_rate_mbps, self.meters.max_rate_mbps
                )));
            }
        }
        let mut names = BTreeSet::new();
        for port in &self.ports {
            if port.speed_mbps == 0 {
                return Err(invalid(format!("port {} has zero speed", port.name)));
            }
            if !names.insert(port.name.as_str()) {
                return Err(invalid(format!("port {} declared twice", port.name)));
            }
        }
        Ok(())
    }

    /// Look up a port by name
    #[must_use]
    pub fn port(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name == name)
    }

    /// Position of a port in the inventory
    #[must_use]
    pub fn port_index(&self, name: &str) -> Option<usize> {
        self.ports.iter().position(|p| p.name == name)
    }

    /// Whether WFQ scheduling is available
    #[must_use]
    pub fn supports_wfq(&self) -> bool {
        self.queues.modes.wfq.supported
    }

    /// Clamp a WFQ weight into the profile range
    #[must_use]
    pub fn clamp_weight(&self, weight: f64) -> f64 {
        let wfq = &self.queues.modes.wfq;
        weight.max(wfq.weights_min).min(wfq.weights_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_profiles_load() {
        for (alias, id) in EMBEDDED_PROFILES {
            let by_alias = Profile::embedded(alias).unwrap();
            let by_id = Profile::embedded(id).unwrap();
            assert_eq!(by_alias, by_id);
            assert_eq!(by_alias.profile_id, *id);
        }
    }

    #[test]
    fn test_legacy_profile_shape() {
        let p = Profile::embedded("legacy").unwrap();
        assert_eq!(p.queues.max_queues, 4);
        assert_eq!(p.meters.types, vec![MeterAlgorithm::Tbf]);
        assert_eq!(p.multicast.mode, MulticastMode::VlanFlood);
        assert!(!p.atomic_commit);
        assert_eq!(p.port("eth0").map(Port::speed), Some(Rate::from_mbps(1000)));
        assert!(!p.telemetry.supports(TelemetryMetric::DeliveryRatio));
    }

    #[test]
    fn test_p4_profile_shape() {
        let p = Profile::embedded("p4").unwrap();
        assert_eq!(p.meters.max_rate(), Rate::from_mbps(40_000));
        assert!(p.meters.offers(MeterAlgorithm::Trtcm));
        assert!(!p.meters.offers(MeterAlgorithm::Tbf));
        assert!(p.atomic_commit);
    }

    #[test]
    fn test_unknown_embedded() {
        assert!(matches!(
            Profile::embedded("tofino"),
            Err(CoreError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_weights() {
        let mut p = Profile::embedded("legacy").unwrap();
        p.queues.modes.wfq.weights_min = 20.0;
        assert!(matches!(p.validate(), Err(CoreError::InvalidProfile { .. })));
    }

    #[test]
    fn test_validate_rejects_duplicate_ports() {
        let mut p = Profile::embedded("p4").unwrap();
        p.ports.push(p.ports[0].clone());
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_multicast_mode_support() {
        assert!(MulticastMode::VlanFlood.supports(GroupMode::Flood));
        assert!(!MulticastMode::VlanFlood.supports(GroupMode::Dynamic));
        assert!(MulticastMode::L2mcStatic.supports(GroupMode::Static));
        assert!(!MulticastMode::L2mcStatic.supports(GroupMode::Dynamic));
        assert!(MulticastMode::L2mcDynamic.supports(GroupMode::Dynamic));
        assert_eq!(MulticastMode::None.native_group_mode(), None);
        assert_eq!(
            MulticastMode::VlanFlood.native_group_mode(),
            Some(GroupMode::Flood)
        );
    }

    #[test]
    fn test_clamp_weight() {
        let p = Profile::embedded("legacy").unwrap();
        assert_eq!(p.clamp_weight(0.1), 0.5);
        assert_eq!(p.clamp_weight(32.0), 16.0);
        assert_eq!(p.clamp_weight(4.0), 4.0);
    }
}
