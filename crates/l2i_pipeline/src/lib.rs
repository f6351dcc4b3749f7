//! L2I Pipeline
//!
//! Drives intent documents through validation, policy, capability matching,
//! composition and synthesis, halting at the first stage that rejects any
//! document. Also hosts the compiler configuration and the per-domain
//! compatibility map.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compat;
pub mod config;
pub mod driver;

pub use compat::{compatibility_map, Compatibility, CompatibilityMap};
pub use config::{load_profile, CompilerConfig, ConfigError, DocumentLimits, DomainConfig};
pub use driver::{Pipeline, PipelineResult};

// Re-exports for callers that only depend on the pipeline
pub use l2i_capability::FoldStrategy;
pub use l2i_core::{Deployment, Diagnostic, DiagnosticCode, Profile, Severity, Stage};
pub use l2i_emit::{Artifact, Backend, CanonicalArtifact};
pub use l2i_plan::IrPlan;
pub use l2i_policy::PolicyConfig;
