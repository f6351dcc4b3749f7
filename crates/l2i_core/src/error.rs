//! Core error types for L2I.
//!
//! These cover infrastructure failures only (profile decoding, configuration
//! lookups). Compilation outcomes are reported as [`crate::Diagnostic`]s.

use std::fmt;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Input could not be decoded
    InvalidEncoding { reason: String },

    /// Profile envelope is inconsistent
    InvalidProfile { profile: String, reason: String },

    /// No embedded profile with this name
    UnknownProfile { name: String },

    /// Validation error
    Validation { field: String, reason: String },

    /// Not found
    NotFound { kind: String, id: String },

    /// Already exists
    AlreadyExists { kind: String, id: String },

    /// Internal error (for unexpected errors)
    Internal {
        /// Error message
        message: String,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEncoding { reason } => write!(f, "Invalid encoding: {}", reason),
            Self::InvalidProfile { profile, reason } => {
                write!(f, "Invalid profile {}: {}", profile, reason)
            }
            Self::UnknownProfile { name } => write!(f, "Unknown profile: {}", name),
            Self::Validation { field, reason } => {
                write!(f, "Validation failed for {}: {}", field, reason)
            }
            Self::NotFound { kind, id } => write!(f, "{} not found: {}", kind, id),
            Self::AlreadyExists { kind, id } => write!(f, "{} already exists: {}", kind, id),
            Self::Internal { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidEncoding {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::UnknownProfile {
            name: "tofino".to_string(),
        };
        assert_eq!(format!("{}", err), "Unknown profile: tofino");

        let err = CoreError::NotFound {
            kind: "Domain".to_string(),
            id: "B".to_string(),
        };
        assert_eq!(format!("{}", err), "Domain not found: B");
    }

    #[test]
    fn test_invalid_profile_error() {
        let err = CoreError::InvalidProfile {
            profile: "legacy-vlan-tc".to_string(),
            reason: "weights_min > weights_max".to_string(),
        };
        let s = format!("{}", err);
        assert!(s.contains("legacy-vlan-tc"));
        assert!(s.contains("weights_min"));
    }

    #[test]
    fn test_from_serde_error() {
        let err: CoreError = serde_json::from_str::<u32>("\"x\"").unwrap_err().into();
        assert!(matches!(err, CoreError::InvalidEncoding { .. }));
    }
}
