//! L2I Capability Matcher
//!
//! Reconciles a canonical spec with one domain's capability profile. Each
//! resource class is checked in a fixed order; requests the domain can
//! express after a lossless or documented rewrite are adjusted, everything
//! else is denied. The matcher is idempotent: a spec it has adjusted is
//! allowed unchanged on a second pass.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fold;
pub mod matcher;

pub use fold::FoldStrategy;
pub use matcher::{CapabilityMatcher, CapabilityOutcome, CapabilityStatus};
