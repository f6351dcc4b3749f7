//! L2I Policy Engine
//!
//! Applies organization-wide admission rules to a canonical spec before any
//! domain profile is consulted. Rules are independent of hardware: they cap
//! priority, aggregate bandwidth and negotiation rounds.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;

pub use config::{Enforcement, PolicyConfig, Rule};
pub use engine::{PolicyEngine, PolicyOutcome, PolicyStatus};
