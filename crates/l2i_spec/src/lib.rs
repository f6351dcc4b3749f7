//! L2I Intent Specifications
//!
//! The single validation boundary of the compiler: untrusted intent
//! documents go in, a typed [`CanonicalSpec`] (or every problem found)
//! comes out. All later stages operate on the canonical form only.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod canonical;
pub mod validate;

pub use canonical::{
    BandwidthRange, CanonicalSpec, Flow, MeterRequest, MulticastGroup, PriorityTier, Requirements,
};
pub use validate::Validator;
