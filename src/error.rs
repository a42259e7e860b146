//! Error types for school directory operations.
//!
//! Validation problems are always reported as a whole: a [`ValidationError`]
//! carries every offending attribute with all of its messages, never only
//! the first failure.

use crate::directory::DirectoryError;
use std::collections::BTreeMap;
use std::fmt;

/// Main error type for school directory operations.
#[derive(Debug, thiserror::Error)]
pub enum KelvinError {
    /// One or more attributes failed validation
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A value that must be unique within an import run is already taken
    #[error("{attribute} {value:?} is already used by {existing_dn}")]
    UniqueId {
        attribute: String,
        value: String,
        existing_dn: String,
    },

    /// No directory object exists at the DN
    #[error("No object found at {dn}")]
    NoObject { dn: String },

    /// The options of a directory object match no known model
    #[error("Object {dn} matches no known model (options: {options:?})")]
    UnknownModel { dn: String, options: Vec<String> },

    /// The object was loaded as one model but is another
    #[error("Object {dn} is a {actual}, not a {expected}")]
    WrongModel {
        dn: String,
        expected: String,
        actual: String,
    },

    /// The directory object has an unexpected object type
    #[error("Object {dn} has type {actual}, expected {expected}")]
    WrongObjectType {
        dn: String,
        expected: String,
        actual: String,
    },

    /// Attributes could not be written to the directory object
    #[error("Could not write properties of {dn}: {message}")]
    UdmProperties { dn: String, message: String },

    /// A role conversion precondition failed; nothing was written
    #[error("Role conversion failed: {message}")]
    RoleConversion { message: String },

    /// Import scheme evaluation failed
    #[error("Initialisation error: {message}")]
    Initialisation { message: String },

    /// A lifecycle hook rejected the operation
    #[error("Hook '{hook}' failed: {message}")]
    Hook { hook: String, message: String },

    /// Errors from the directory client
    #[error("Directory error: {0}")]
    Directory(#[source] DirectoryError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration could not be loaded
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The request is malformed
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },
}

impl From<DirectoryError> for KelvinError {
    fn from(error: DirectoryError) -> Self {
        match error {
            DirectoryError::NoObject { dn } => KelvinError::NoObject { dn },
            DirectoryError::InvalidProperty {
                dn,
                property,
                message,
            } => KelvinError::UdmProperties {
                dn,
                message: format!("{}: {}", property, message),
            },
            other => KelvinError::Directory(other),
        }
    }
}

/// Aggregated validation failure: attribute name → messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
pub struct ValidationError {
    errors: BTreeMap<String, Vec<String>>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (attribute, messages) in &self.errors {
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            write!(f, "{}: {}", attribute, messages.join(" "))?;
        }
        Ok(())
    }
}

impl ValidationError {
    /// Wrap a complete error map.
    pub fn new(errors: BTreeMap<String, Vec<String>>) -> Self {
        Self { errors }
    }

    /// A validation error for a single attribute.
    pub fn single(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        let mut error = Self::default();
        error.add(attribute, message);
        error
    }

    /// Record another message for an attribute.
    pub fn add(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(attribute.into())
            .or_default()
            .push(message.into());
    }

    /// Merge all messages of `other` into this error.
    pub fn merge(&mut self, other: ValidationError) {
        for (attribute, messages) in other.errors {
            self.errors.entry(attribute).or_default().extend(messages);
        }
    }

    /// The full error map.
    pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    /// Messages for one attribute.
    pub fn messages(&self, attribute: &str) -> &[String] {
        self.errors
            .get(attribute)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether no errors were recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Err(self)` if anything was recorded.
    pub fn into_result(self) -> ValidationResult<()> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

// Convenience methods for creating common errors
impl KelvinError {
    /// Create a missing-object error
    pub fn no_object(dn: impl Into<String>) -> Self {
        Self::NoObject { dn: dn.into() }
    }

    /// Create a role conversion error
    pub fn role_conversion(message: impl Into<String>) -> Self {
        Self::RoleConversion {
            message: message.into(),
        }
    }

    /// Create an initialisation error
    pub fn initialisation(message: impl Into<String>) -> Self {
        Self::Initialisation {
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

// Result type aliases for convenience
pub type KelvinResult<T> = Result<T, KelvinError>;
pub type ValidationResult<T> = Result<T, ValidationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_keeps_every_message() {
        let mut error = ValidationError::single("name", "Must not be empty.");
        error.add("email", "Not a valid email address.");
        error.add("name", "Contains invalid characters.");

        assert_eq!(error.messages("name").len(), 2);
        assert_eq!(error.messages("email").len(), 1);
        assert!(error.messages("school").is_empty());
        assert_eq!(
            error.to_string(),
            "email: Not a valid email address.; name: Must not be empty. Contains invalid characters."
        );
    }

    #[test]
    fn test_directory_errors_map_to_domain_errors() {
        let error = KelvinError::from(DirectoryError::no_object("uid=x"));
        assert!(matches!(error, KelvinError::NoObject { .. }));

        let error = KelvinError::from(DirectoryError::invalid_property("uid=x", "groups", "bad"));
        assert!(matches!(error, KelvinError::UdmProperties { .. }));

        let error = KelvinError::from(DirectoryError::backend("timeout"));
        assert!(error.to_string().contains("timeout"));
    }

    #[test]
    fn test_error_chain() {
        let validation_error = ValidationError::single("name", "Must not be empty.");
        let error = KelvinError::from(validation_error);
        assert!(error.to_string().contains("Validation error"));
    }
}
