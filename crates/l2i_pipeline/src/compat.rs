//! Intent × domain compatibility matrix.
//!
//! Runs validation, policy and capability matching for each intent against
//! every domain of a deployment independently, without composing. Useful to
//! see which domains could host an intent and at what cost.

use l2i_capability::{CapabilityMatcher, FoldStrategy};
use l2i_core::{Deployment, Diagnostic, DiagnosticCode};
use l2i_policy::{PolicyConfig, PolicyEngine};
use l2i_spec::Validator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Verdict for one intent in one domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Compatibility {
    /// The intent never reached a domain
    Validation {
        /// Validation codes, first occurrence order
        codes: Vec<DiagnosticCode>,
    },
    /// Policy or the domain refused the intent
    Deny {
        /// First blocking code
        code: DiagnosticCode,
    },
    /// Accepted after rewrites
    Adjust {
        /// Adjustment codes, in stage order
        codes: Vec<DiagnosticCode>,
    },
    /// Accepted as written
    Allow,
}

impl fmt::Display for Compatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |codes: &[DiagnosticCode]| {
            codes
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(",")
        };
        match self {
            Self::Validation { codes } => write!(f, "validation({})", join(codes)),
            Self::Deny { code } => write!(f, "deny({})", code),
            Self::Adjust { codes } => write!(f, "adjust({})", join(codes)),
            Self::Allow => write!(f, "allow"),
        }
    }
}

/// Intent name → domain id → verdict
pub type CompatibilityMap = BTreeMap<String, BTreeMap<String, Compatibility>>;

/// Evaluate every named intent against every domain
#[must_use]
pub fn compatibility_map(
    intents: &[(String, Value)],
    deployment: &Deployment,
    policy: &PolicyConfig,
    fold: FoldStrategy,
) -> CompatibilityMap {
    let validator = Validator::new();
    let engine = PolicyEngine::new(policy.clone());
    let matcher = CapabilityMatcher::new().with_fold_strategy(fold);

    let mut map = CompatibilityMap::new();
    for (name, doc) in intents {
        let row = match validator.validate(doc) {
            Err(found) => {
                let verdict = Compatibility::Validation {
                    codes: distinct_codes(&found),
                };
                deployment
                    .iter()
                    .map(|(domain, _)| (domain.to_string(), verdict.clone()))
                    .collect()
            }
            Ok(spec) => {
                let policed = engine.apply(&spec);
                deployment
                    .iter()
                    .map(|(domain, profile)| {
                        let verdict = if policed.is_denied() {
                            deny(&policed.diagnostics)
                        } else {
                            let matched = matcher.check(&policed.spec, profile);
                            if matched.is_denied() {
                                deny(&matched.diagnostics)
                            } else {
                                let mut all = policed.diagnostics.clone();
                                all.extend(matched.diagnostics);
                                adjust_or_allow(&all)
                            }
                        };
                        (domain.to_string(), verdict)
                    })
                    .collect()
            }
        };
        tracing::debug!(intent = %name, domains = deployment.len(), "compatibility row");
        map.insert(name.clone(), row);
    }
    map
}

fn distinct_codes(diagnostics: &[Diagnostic]) -> Vec<DiagnosticCode> {
    let mut codes = Vec::new();
    for d in diagnostics {
        if !codes.contains(&d.code) {
            codes.push(d.code);
        }
    }
    codes
}

fn deny(diagnostics: &[Diagnostic]) -> Compatibility {
    match diagnostics.iter().find(|d| d.is_blocking()) {
        Some(d) => Compatibility::Deny { code: d.code },
        None => Compatibility::Deny {
            code: DiagnosticCode::InternalInconsistency,
        },
    }
}

fn adjust_or_allow(diagnostics: &[Diagnostic]) -> Compatibility {
    if diagnostics.is_empty() {
        Compatibility::Allow
    } else {
        Compatibility::Adjust {
            codes: distinct_codes(diagnostics),
        }
    }
}
