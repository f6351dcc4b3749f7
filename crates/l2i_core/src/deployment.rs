//! A deployment: the set of domains a compilation targets.

use crate::error::{CoreError, CoreResult};
use crate::profile::Profile;
use std::collections::BTreeMap;

/// Immutable mapping of domain id to its capability profile
///
/// Domains iterate in id order, which keeps every later stage deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Deployment {
    domains: BTreeMap<String, Profile>,
}

impl Deployment {
    /// Create an empty deployment
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a deployment with a single domain
    #[must_use]
    pub fn single(domain: impl Into<String>, profile: Profile) -> Self {
        let mut domains = BTreeMap::new();
        domains.insert(domain.into(), profile);
        Self { domains }
    }

    /// Add a domain
    ///
    /// # Errors
    ///
    /// Returns error if the domain id is already present
    pub fn with_domain(mut self, domain: impl Into<String>, profile: Profile) -> CoreResult<Self> {
        let domain = domain.into();
        if self.domains.contains_key(&domain) {
            return Err(CoreError::AlreadyExists {
                kind: "Domain".to_string(),
                id: domain,
            });
        }
        self.domains.insert(domain, profile);
        Ok(self)
    }

    /// Profile of a domain
    #[must_use]
    pub fn profile(&self, domain: &str) -> Option<&Profile> {
        self.domains.get(domain)
    }

    /// Resolve the domain an intent targets
    ///
    /// An explicit domain must exist. Without one, a single-domain
    /// deployment resolves to its only domain.
    #[must_use]
    pub fn resolve(&self, requested: Option<&str>) -> Option<(&str, &Profile)> {
        match requested {
            Some(domain) => self
                .domains
                .get_key_value(domain)
                .map(|(k, v)| (k.as_str(), v)),
            None if self.domains.len() == 1 => {
                self.domains.iter().next().map(|(k, v)| (k.as_str(), v))
            }
            None => None,
        }
    }

    /// Iterate domains in id order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Profile)> {
        self.domains.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of domains
    #[must_use]
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy() -> Profile {
        Profile::embedded("legacy").unwrap()
    }

    #[test]
    fn test_single_resolves_without_name() {
        let d = Deployment::single("A", legacy());
        let (name, profile) = d.resolve(None).unwrap();
        assert_eq!(name, "A");
        assert_eq!(profile.profile_id, "legacy-vlan-tc");
        assert!(d.resolve(Some("B")).is_none());
    }

    #[test]
    fn test_multi_requires_name() {
        let d = Deployment::single("A", legacy())
            .with_domain("C", Profile::embedded("p4").unwrap())
            .unwrap();
        assert!(d.resolve(None).is_none());
        assert_eq!(d.resolve(Some("C")).map(|(n, _)| n), Some("C"));
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn test_duplicate_domain() {
        let result = Deployment::single("A", legacy()).with_domain("A", legacy());
        assert!(matches!(result, Err(CoreError::AlreadyExists { .. })));
    }

    #[test]
    fn test_iter_in_id_order() {
        let d = Deployment::new()
            .with_domain("C", legacy())
            .unwrap()
            .with_domain("A", legacy())
            .unwrap();
        let names: Vec<_> = d.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["A", "C"]);
    }
}
