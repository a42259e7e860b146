//! School models and their lifecycle.
//!
//! Every model implements [`SchoolModel`]: a descriptor table, placement
//! rules and the mapping to and from [`DirectoryObject`]s. The lifecycle
//! (create, modify, move, remove, validation and hooks) is run by
//! [`SchoolDirectory`].
//!
//! # Example Usage
//!
//! ```rust
//! use kelvin_school::config::KelvinConfig;
//! use kelvin_school::directory::InMemoryDirectory;
//! use kelvin_school::model::{CreateOptions, School, SchoolDirectory, SchoolModel, User, UserRole};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = SchoolDirectory::new(InMemoryDirectory::default(), KelvinConfig::default());
//! directory.create(&mut School::new("OU1"), CreateOptions::default()).await?;
//!
//! let mut alice = User::new(UserRole::Student, "alice", "OU1").with_names("Alice", "Smith");
//! assert!(directory.create(&mut alice, CreateOptions::default()).await?);
//! assert_eq!(alice.state().old_dn.as_deref(),
//!     Some("uid=alice,cn=schueler,cn=users,ou=OU1,dc=example,dc=com"));
//! # Ok(())
//! # }
//! ```
//!
//! [`DirectoryObject`]: crate::directory::DirectoryObject

pub mod base;
pub mod converter;
pub mod group;
pub mod hooks;
pub mod layout;
pub mod lifecycle;
pub mod role;
pub mod school;
pub mod share;
pub mod user;

pub use base::{Dependent, EntityState, ModelKind, ModelMeta, SchoolModel};
pub use converter::convert;
pub use group::{GroupKind, SchoolGroup};
pub use hooks::{
    HookContext, HookError, HookEvent, HookPhase, HookRegistry, HookTarget, LifecycleHook,
};
pub use layout::{DirectoryLayout, ManagedGroup};
pub use lifecycle::{CreateOptions, ModifyOptions, SchoolDirectory};
pub use role::{RoleGroup, RoleString, UserRole};
pub use school::School;
pub use share::Share;
pub use user::User;
