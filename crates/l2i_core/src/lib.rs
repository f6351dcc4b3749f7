//! L2I Core Types
//!
//! Pure types shared by every compilation stage: diagnostics, rates,
//! capability profiles and deployments. This crate performs no I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod deployment;
pub mod diagnostic;
pub mod error;
pub mod hash;
pub mod location;
pub mod profile;
pub mod rate;
pub mod version;

// Re-exports
pub use deployment::Deployment;
pub use diagnostic::{any_blocking, Diagnostic, DiagnosticCode, Severity, Stage};
pub use error::{CoreError, CoreResult};
pub use hash::Hash;
pub use profile::{
    GroupMode, MeterAlgorithm, MeterProfile, MulticastMode, MulticastProfile, Port, Profile,
    QueueProfile, SchedulingModes, TelemetryMetric, TelemetrySupport, WfqSupport,
    EMBEDDED_PROFILES,
};
pub use rate::Rate;
pub use version::{SchemaVersion, VersionError};
