//! Directory-client error types.
//!
//! These errors describe failures of the directory backend itself, separate
//! from validation or business-rule failures of the school models. The
//! lifecycle engine translates them into [`KelvinError`](crate::KelvinError)
//! variants at its boundary.

use std::fmt;

/// Errors that can occur while talking to the directory.
#[derive(Debug)]
pub enum DirectoryError {
    /// No object exists at the given DN.
    NoObject { dn: String },

    /// An object already exists at the DN a save would create.
    AlreadyExists { dn: String },

    /// The container an object should be placed in does not exist.
    NoSuperordinate { position: String },

    /// A property could not be written (wrong shape, dangling reference, ...).
    InvalidProperty {
        dn: String,
        property: String,
        message: String,
    },

    /// The object cannot be moved, e.g. because the target is below itself.
    InvalidMove { dn: String, target: String },

    /// An LDAP filter string could not be parsed.
    InvalidFilter { filter: String, message: String },

    /// Network, authentication or other backend failure.
    Backend {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectoryError::NoObject { dn } => write!(f, "No object found at {}", dn),
            DirectoryError::AlreadyExists { dn } => write!(f, "Object already exists: {}", dn),
            DirectoryError::NoSuperordinate { position } => {
                write!(f, "Superordinate container does not exist: {}", position)
            }
            DirectoryError::InvalidProperty {
                dn,
                property,
                message,
            } => write!(f, "Invalid property '{}' on {}: {}", property, dn, message),
            DirectoryError::InvalidMove { dn, target } => {
                write!(f, "Cannot move {} to {}", dn, target)
            }
            DirectoryError::InvalidFilter { filter, message } => {
                write!(f, "Invalid filter '{}': {}", filter, message)
            }
            DirectoryError::Backend { message, .. } => {
                write!(f, "Directory backend error: {}", message)
            }
        }
    }
}

impl std::error::Error for DirectoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DirectoryError::Backend { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl DirectoryError {
    /// Create a new NoObject error.
    pub fn no_object(dn: impl Into<String>) -> Self {
        Self::NoObject { dn: dn.into() }
    }

    /// Create a new AlreadyExists error.
    pub fn already_exists(dn: impl Into<String>) -> Self {
        Self::AlreadyExists { dn: dn.into() }
    }

    /// Create a new InvalidProperty error.
    pub fn invalid_property(
        dn: impl Into<String>,
        property: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidProperty {
            dn: dn.into(),
            property: property.into(),
            message: message.into(),
        }
    }

    /// Create a new InvalidFilter error.
    pub fn invalid_filter(filter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidFilter {
            filter: filter.into(),
            message: message.into(),
        }
    }

    /// Create a new Backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }

    /// Check if this error indicates a missing object.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DirectoryError::NoObject { .. })
    }

    /// Check if this error indicates a conflict with an existing object.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DirectoryError::AlreadyExists { .. })
    }
}

/// Result alias for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;
