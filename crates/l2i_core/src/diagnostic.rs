//! Structured diagnostics emitted by every compilation stage.
//!
//! A diagnostic is never free text only: callers match on the
//! [`DiagnosticCode`] and [`Severity`] to decide what to do next.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious a diagnostic is.
///
/// Ordered from least to most severe, so `max()` over a list gives the
/// worst severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational only
    Info,
    /// The intent was modified to fit
    Adjustment,
    /// An organizational rule was breached
    Violation,
    /// The request cannot proceed
    Fatal,
}

impl Severity {
    /// Whether a diagnostic of this severity halts the pipeline
    #[must_use]
    pub const fn is_blocking(self) -> bool {
        matches!(self, Self::Violation | Self::Fatal)
    }

    /// Stable lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Adjustment => "adjustment",
            Self::Violation => "violation",
            Self::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Schema and semantic validation
    Validation,
    /// Organization-wide policy enforcement
    Policy,
    /// Per-domain capability matching
    Capability,
    /// Multi-spec composition
    Composition,
    /// IR synthesis
    Synthesis,
    /// Backend emission
    Emission,
}

impl Stage {
    /// Stable lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Policy => "policy",
            Self::Capability => "capability",
            Self::Composition => "composition",
            Self::Synthesis => "synthesis",
            Self::Emission => "emission",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of diagnostic codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    // validation
    /// Required field absent
    MissingField,
    /// Field has the wrong JSON type
    InvalidType,
    /// Priority string outside the tier enumeration
    UnknownPriority,
    /// Enumerated string outside its allowed values
    UnknownValue,
    /// Intent schema version not understood
    UnsupportedVersion,
    /// Numeric value outside its allowed range
    OutOfRange,
    /// Bandwidth minimum above maximum
    BandwidthRange,
    /// Latency bound below zero
    NegativeLatency,
    /// Multicast replicas above declared members
    ReplicasExceedMembers,
    /// Identifier declared twice
    DuplicateId,
    /// Reference to an undeclared identifier
    UnknownReference,
    /// Intent requests nothing
    EmptyIntent,

    // policy
    /// Priority tier above the organizational ceiling
    PriorityCeiling,
    /// Aggregate bandwidth above the organizational ceiling
    BandwidthCeiling,
    /// Negotiation rounds above the organizational ceiling
    NegotiationRounds,

    // capability
    /// Intent targets a domain absent from the deployment
    UnknownDomain,
    /// Port not in the profile inventory
    UnknownPort,
    /// A single flow exceeds its port speed
    PortSpeedExceeded,
    /// Guaranteed bandwidth on a port exceeds its speed
    PortOversubscribed,
    /// More priority tiers than queues
    QueueOverflow,
    /// Tiers merged to fit the queue count
    TiersFolded,
    /// WFQ weight clamped into the profile range
    WeightClamped,
    /// Weights requested but WFQ unavailable
    WfqUnsupported,
    /// Weights dropped in favor of strict priority
    WeightsDropped,
    /// Metering requested but unsupported
    MeterUnsupported,
    /// Meter algorithm not offered by the profile
    MeterAlgorithmUnsupported,
    /// Meter rate clamped into the profile range
    MeterRateClamped,
    /// Multicast requested but unsupported
    MulticastUnsupported,
    /// Too many multicast groups
    MulticastGroupLimit,
    /// Too many replicas in one group
    MulticastReplicaLimit,
    /// Group membership mode rewritten
    MulticastModeSubstituted,
    /// Transactional commit degraded to best effort
    AtomicCommitDegraded,
    /// Telemetry metric unavailable in the domain
    TelemetryUnavailable,

    // composition
    /// Same spec id composed twice
    DuplicateSpec,
    /// Flows from several specs oversubscribe a port
    PortContention,
    /// Several specs claim the same multicast group id
    GroupCollision,
    /// Specs together declare more multicast groups than a domain holds
    GroupLimitExceeded,
    /// Specs together need more queues on a port than it offers
    QueueContention,

    // synthesis
    /// Post-capability invariant violated
    InternalInconsistency,
}

impl DiagnosticCode {
    /// Stable snake_case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingField => "missing_field",
            Self::InvalidType => "invalid_type",
            Self::UnknownPriority => "unknown_priority",
            Self::UnknownValue => "unknown_value",
            Self::UnsupportedVersion => "unsupported_version",
            Self::OutOfRange => "out_of_range",
            Self::BandwidthRange => "bandwidth_range",
            Self::NegativeLatency => "negative_latency",
            Self::ReplicasExceedMembers => "replicas_exceed_members",
            Self::DuplicateId => "duplicate_id",
            Self::UnknownReference => "unknown_reference",
            Self::EmptyIntent => "empty_intent",
            Self::PriorityCeiling => "priority_ceiling",
            Self::BandwidthCeiling => "bandwidth_ceiling",
            Self::NegotiationRounds => "negotiation_rounds",
            Self::UnknownDomain => "unknown_domain",
            Self::UnknownPort => "unknown_port",
            Self::PortSpeedExceeded => "port_speed_exceeded",
            Self::PortOversubscribed => "port_oversubscribed",
            Self::QueueOverflow => "queue_overflow",
            Self::TiersFolded => "tiers_folded",
            Self::WeightClamped => "weight_clamped",
            Self::WfqUnsupported => "wfq_unsupported",
            Self::WeightsDropped => "weights_dropped",
            Self::MeterUnsupported => "meter_unsupported",
            Self::MeterAlgorithmUnsupported => "meter_algorithm_unsupported",
            Self::MeterRateClamped => "meter_rate_clamped",
            Self::MulticastUnsupported => "multicast_unsupported",
            Self::MulticastGroupLimit => "multicast_group_limit",
            Self::MulticastReplicaLimit => "multicast_replica_limit",
            Self::MulticastModeSubstituted => "multicast_mode_substituted",
            Self::AtomicCommitDegraded => "atomic_commit_degraded",
            Self::TelemetryUnavailable => "telemetry_unavailable",
            Self::DuplicateSpec => "duplicate_spec",
            Self::PortContention => "port_contention",
            Self::GroupCollision => "group_collision",
            Self::GroupLimitExceeded => "group_limit_exceeded",
            Self::QueueContention => "queue_contention",
            Self::InternalInconsistency => "internal_inconsistency",
        }
    }

    /// The stage that owns this code
    #[must_use]
    pub const fn stage(self) -> Stage {
        match self {
            Self::MissingField
            | Self::InvalidType
            | Self::UnknownPriority
            | Self::UnknownValue
            | Self::UnsupportedVersion
            | Self::OutOfRange
            | Self::BandwidthRange
            | Self::NegativeLatency
            | Self::ReplicasExceedMembers
            | Self::DuplicateId
            | Self::UnknownReference
            | Self::EmptyIntent => Stage::Validation,
            Self::PriorityCeiling | Self::BandwidthCeiling | Self::NegotiationRounds => {
                Stage::Policy
            }
            Self::DuplicateSpec
            | Self::PortContention
            | Self::GroupCollision
            | Self::GroupLimitExceeded
            | Self::QueueContention => Stage::Composition,
            Self::InternalInconsistency => Stage::Synthesis,
            _ => Stage::Capability,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured record explaining an adjustment or failure
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Machine-readable code
    pub code: DiagnosticCode,
    /// Severity
    pub severity: Severity,
    /// Stage that produced the record
    pub stage: Stage,
    /// Where in the input the problem lies, see [`crate::location`]
    pub location: String,
    /// Human-readable explanation
    pub message: String,
}

impl Diagnostic {
    /// Create a diagnostic; the stage is derived from the code
    #[must_use]
    pub fn new(
        code: DiagnosticCode,
        severity: Severity,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            severity,
            stage: code.stage(),
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create a fatal diagnostic
    #[must_use]
    pub fn fatal(
        code: DiagnosticCode,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(code, Severity::Fatal, location, message)
    }

    /// Create a violation diagnostic
    #[must_use]
    pub fn violation(
        code: DiagnosticCode,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(code, Severity::Violation, location, message)
    }

    /// Create an adjustment diagnostic
    #[must_use]
    pub fn adjustment(
        code: DiagnosticCode,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(code, Severity::Adjustment, location, message)
    }

    /// Attribute the diagnostic to `stage` instead of the code's owner
    #[must_use]
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    /// Whether this diagnostic halts the pipeline
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.severity.is_blocking()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}/{}] {} at {}: {}",
            self.stage, self.severity, self.code, self.location, self.message
        )
    }
}

/// Whether any diagnostic in the list halts the pipeline
#[must_use]
pub fn any_blocking(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_blocking)
}
