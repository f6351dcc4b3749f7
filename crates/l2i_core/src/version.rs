//! Intent schema versions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Version of the intent document schema, `major.minor`
///
/// Documents may write just the major component (`"1"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
}

impl SchemaVersion {
    /// The version this build reads and writes
    pub const CURRENT: Self = Self::new(1, 0);

    /// Create a new version
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse from `"1"` or `"1.0"`
    ///
    /// # Errors
    ///
    /// Returns error if format is invalid
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let mut parts = s.split('.');
        let major = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| VersionError::InvalidFormat(s.to_string()))?;
        let minor = parts.next().unwrap_or("0");
        if parts.next().is_some() {
            return Err(VersionError::InvalidFormat(s.to_string()));
        }

        let major = major
            .parse()
            .map_err(|_| VersionError::InvalidComponent(major.to_string()))?;
        let minor = minor
            .parse()
            .map_err(|_| VersionError::InvalidComponent(minor.to_string()))?;

        Ok(Self { major, minor })
    }

    /// Whether this build understands documents of this version
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        self.major == Self::CURRENT.major
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for SchemaVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Version-related errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// Invalid format
    InvalidFormat(String),
    /// Invalid component
    InvalidComponent(String),
}

impl fmt::Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFormat(s) => write!(f, "Invalid version format: {}", s),
            Self::InvalidComponent(s) => write!(f, "Invalid version component: {}", s),
        }
    }
}

impl std::error::Error for VersionError {}
