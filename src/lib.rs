//! School directory identity management for Rust.
//!
//! Maps school domain objects (schools, users in five roles, classes,
//! workgroups and their shares) onto a generic LDAP-style directory and
//! keeps them consistent across create, modify, move and delete.
//!
//! # Core Components
//!
//! - [`SchoolDirectory`] - Model lifecycle with validation and hooks
//! - [`DirectoryClient`] - Trait for directory backends
//! - [`ImportUser`] - Import-side username and identifier generation
//! - [`KelvinHandler`] - Transport-agnostic REST resource handler
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use kelvin_school::{CreateOptions, InMemoryDirectory, KelvinConfig, School, SchoolDirectory};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = SchoolDirectory::new(InMemoryDirectory::default(), KelvinConfig::default());
//! directory.create(&mut School::new("OU1"), CreateOptions::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod directory;
pub mod error;
pub mod import;
pub mod model;
pub mod resource;
pub mod schema;

// Re-export commonly used types for convenience
pub use config::{ContainerNames, ImportConfig, KelvinConfig};
pub use directory::{DirectoryClient, DirectoryError, DirectoryObject, Filter, InMemoryDirectory};
pub use error::{KelvinError, KelvinResult, ValidationError};
pub use import::{ImportAction, ImportSession, ImportUser, Scheme};
pub use model::{
    CreateOptions, GroupKind, HookPhase, LifecycleHook, ModifyOptions, School, SchoolDirectory,
    SchoolGroup, SchoolModel, Share, User, UserRole, convert,
};
pub use resource::{KelvinHandler, ResourceKind, ResourceOperation, ResourceRequest, ResourceResponse};
