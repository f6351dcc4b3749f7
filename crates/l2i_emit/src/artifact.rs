//! Emitter contract and artifact encoding.

use crate::netconf::NetconfArtifact;
use crate::p4runtime::P4RuntimeArtifact;
use l2i_core::{CoreError, CoreResult, Hash};
use l2i_plan::IrPlan;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend kinds an IR plan can be rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// NETCONF-like edit-config fragments
    Netconf,
    /// P4Runtime-like table entries
    P4runtime,
}

impl Backend {
    /// Every backend
    pub const ALL: [Self; 2] = [Self::Netconf, Self::P4runtime];

    /// Parse a backend name
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "netconf" => Some(Self::Netconf),
            "p4runtime" | "p4" => Some(Self::P4runtime),
            _ => None,
        }
    }

    /// Canonical name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Netconf => "netconf",
            Self::P4runtime => "p4runtime",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders an IR plan for one backend
///
/// Implementations must be pure and total: same plan, same artifact.
pub trait Emitter {
    /// Artifact produced
    type Artifact: CanonicalArtifact;

    /// Backend this emitter targets
    fn backend(&self) -> Backend;

    /// Render `plan`
    fn emit(&self, plan: &IrPlan) -> Self::Artifact;
}

/// Byte-stable encoding of an artifact
pub trait CanonicalArtifact: Serialize {
    /// Pretty-printed JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    fn to_json(&self) -> CoreResult<String> {
        serde_json::to_string_pretty(self).map_err(CoreError::from)
    }

    /// BLAKE3 hash of the JSON encoding
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    fn fingerprint(&self) -> CoreResult<Hash> {
        Ok(Hash::compute(self.to_json()?.as_bytes()))
    }
}

/// An artifact of any backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum Artifact {
    /// NETCONF-like rendering
    Netconf(NetconfArtifact),
    /// P4Runtime-like rendering
    P4runtime(P4RuntimeArtifact),
}

impl Artifact {
    /// Backend of this artifact
    #[must_use]
    pub fn backend(&self) -> Backend {
        match self {
            Self::Netconf(_) => Backend::Netconf,
            Self::P4runtime(_) => Backend::P4runtime,
        }
    }

    /// Render `plan` with the emitter for `backend`
    #[must_use]
    pub fn render(backend: Backend, plan: &IrPlan) -> Self {
        match backend {
            Backend::Netconf => Self::Netconf(crate::NetconfEmitter::new().emit(plan)),
            Backend::P4runtime => Self::P4runtime(crate::P4RuntimeEmitter::new().emit(plan)),
        }
    }

    /// JSON of the inner artifact, without the backend tag
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> CoreResult<String> {
        match self {
            Self::Netconf(a) => a.to_json(),
            Self::P4runtime(a) => a.to_json(),
        }
    }

    /// Fingerprint of the inner artifact
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn fingerprint(&self) -> CoreResult<Hash> {
        match self {
            Self::Netconf(a) => a.fingerprint(),
            Self::P4runtime(a) => a.fingerprint(),
        }
    }
}

impl CanonicalArtifact for Artifact {}
