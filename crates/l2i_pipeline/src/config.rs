//! Compiler configuration.

use l2i_capability::FoldStrategy;
use l2i_core::{CoreError, Deployment, Profile};
use l2i_emit::Backend;
use l2i_policy::PolicyConfig;
use l2i_spec::Validator;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Offending path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// Configuration JSON is malformed
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
    /// A profile reference could not be resolved
    #[error("profile {reference:?}: {source}")]
    Profile {
        /// Embedded name or path as written
        reference: String,
        /// Underlying error
        #[source]
        source: CoreError,
    },
    /// Policy rules are unusable
    #[error("invalid policy: {0}")]
    Policy(#[source] CoreError),
    /// Deployment could not be assembled
    #[error("invalid deployment: {0}")]
    Deployment(#[source] CoreError),
}

/// One domain of the deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Domain id
    pub id: String,
    /// Embedded profile name or path to a profile JSON file
    pub profile: String,
}

/// Per-document size limits enforced during validation; 0 means no limit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentLimits {
    /// Maximum flows in one intent
    pub max_flows: usize,
    /// Maximum multicast groups in one intent
    pub max_groups: usize,
}

impl DocumentLimits {
    /// Validator enforcing these limits
    #[must_use]
    pub fn validator(&self) -> Validator {
        Validator::new()
            .with_max_flows(self.max_flows)
            .with_max_groups(self.max_groups)
    }
}

/// Everything a compilation needs besides the intents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Policy rules
    pub policy: PolicyConfig,
    /// Tier fold strategy
    pub fold_strategy: FoldStrategy,
    /// Backends to emit, in order
    pub backends: Vec<Backend>,
    /// Deployment description
    pub domains: Vec<DomainConfig>,
    /// Intent size limits
    pub limits: DocumentLimits,
}

impl CompilerConfig {
    /// Default policy, `reject` folding, every backend, no domains
    #[must_use]
    pub fn new() -> Self {
        Self {
            policy: PolicyConfig::new(),
            fold_strategy: FoldStrategy::default(),
            backends: Backend::ALL.to_vec(),
            domains: Vec::new(),
            limits: DocumentLimits::default(),
        }
    }

    /// Decode from JSON and check the policy rules
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed or the policy is invalid
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.policy.validate().map_err(ConfigError::Policy)?;
        Ok(config)
    }

    /// Load from a JSON file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or decoded
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = read(path)?;
        Self::from_json(&json)
    }

    /// Add a domain
    #[must_use]
    pub fn with_domain(mut self, id: impl Into<String>, profile: impl Into<String>) -> Self {
        self.domains.push(DomainConfig {
            id: id.into(),
            profile: profile.into(),
        });
        self
    }

    /// Build the deployment, loading each profile
    ///
    /// # Errors
    ///
    /// Returns error if a profile cannot be loaded or a domain id repeats
    pub fn deployment(&self) -> Result<Deployment, ConfigError> {
        let mut deployment = Deployment::new();
        for domain in &self.domains {
            let profile = load_profile(&domain.profile)?;
            deployment = deployment
                .with_domain(domain.id.clone(), profile)
                .map_err(ConfigError::Deployment)?;
        }
        Ok(deployment)
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a profile reference
///
/// Embedded names (`legacy`, `netconf`, `p4` or their full ids) win;
/// anything else is read as a JSON file.
///
/// # Errors
///
/// Returns error if the reference is neither an embedded name nor a readable,
/// valid profile file
pub fn load_profile(reference: &str) -> Result<Profile, ConfigError> {
    match Profile::embedded(reference) {
        Ok(profile) => Ok(profile),
        Err(CoreError::UnknownProfile { .. }) => {
            let json = read(Path::new(reference))?;
            Profile::from_json(&json).map_err(|source| ConfigError::Profile {
                reference: reference.to_string(),
                source,
            })
        }
        Err(source) => Err(ConfigError::Profile {
            reference: reference.to_string(),
            source,
        }),
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use l2i_policy::Enforcement;
    use std::io::Write;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = CompilerConfig::from_json("{}").unwrap();
        assert_eq!(config, CompilerConfig::new());
        assert_eq!(config.backends, vec![Backend::Netconf, Backend::P4runtime]);
    }

    #[test]
    fn test_full_config() {
        let config = CompilerConfig::from_json(
            r#"{
                "policy": {
                    "max_priority": {"limit": "critical", "mode": "hard"},
                    "bandwidth_ceiling_mbps": null
                },
                "fold_strategy": "merge_lowest",
                "backends": ["p4runtime"],
                "domains": [{"id": "A", "profile": "legacy"}, {"id": "B", "profile": "p4"}]
            }"#,
        )
        .unwrap();
        assert_eq!(config.fold_strategy, FoldStrategy::MergeLowest);
        assert_eq!(config.backends, vec![Backend::P4runtime]);
        assert_eq!(config.policy.bandwidth_ceiling_mbps, None);
        let priority = config.policy.max_priority.unwrap();
        assert_eq!(priority.mode, Enforcement::Hard);

        let deployment = config.deployment().unwrap();
        assert_eq!(deployment.len(), 2);
        assert_eq!(
            deployment.profile("B").map(|p| p.profile_id.as_str()),
            Some("p4-bmv2-basic")
        );
    }

    #[test]
    fn test_limits_reach_validator() {
        let config = CompilerConfig::from_json(r#"{"limits": {"max_flows": 2}}"#).unwrap();
        assert_eq!(config.limits.max_flows, 2);
        assert_eq!(config.limits.max_groups, 0);
        let validator = config.limits.validator();
        assert_eq!(validator.max_flows, 2);
        assert_eq!(validator.max_groups, 0);
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let err = CompilerConfig::from_json(
            r#"{"policy": {"max_negotiation_rounds": {"limit": 0, "mode": "soft"}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Policy(_)));
        assert!(err.to_string().contains("max_negotiation_rounds"));
    }

    #[test]
    fn test_duplicate_domain() {
        let config = CompilerConfig::new()
            .with_domain("A", "legacy")
            .with_domain("A", "p4");
        assert!(matches!(
            config.deployment(),
            Err(ConfigError::Deployment(_))
        ));
    }

    #[test]
    fn test_profile_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&Profile::embedded("netconf").unwrap()).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let path = file.path().to_string_lossy().to_string();
        let profile = load_profile(&path).unwrap();
        assert_eq!(profile.profile_id, "netconf-l2mc");
    }

    #[test]
    fn test_missing_profile_file() {
        let err = load_profile("/nonexistent/profile.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
