//! User import.
//!
//! An import run creates, modifies and deletes users from an external
//! source. Generated attributes (username, email, record UID, ...) come from
//! scheme templates in [`ImportConfig`](crate::config::ImportConfig); the
//! [`ImportSession`] makes sure identifiers stay unique within the run and
//! against the directory.
//!
//! ```rust
//! use kelvin_school::config::KelvinConfig;
//! use kelvin_school::directory::InMemoryDirectory;
//! use kelvin_school::import::{ImportAction, ImportSession, ImportUser};
//! use kelvin_school::model::{SchoolDirectory, SchoolModel, User, UserRole};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = SchoolDirectory::new(InMemoryDirectory::default(), KelvinConfig::default());
//! let mut session = ImportSession::new();
//!
//! let mut user = User::empty(UserRole::Teacher).with_names("Anna", "Miller");
//! user.set_school("OU1");
//! let mut import = ImportUser::new(user, ImportAction::Add);
//! import.prepare_all(&directory, &mut session).await?;
//! assert_eq!(import.user.attributes().get_str("name"), Some("A.Miller"));
//! # Ok(())
//! # }
//! ```

pub mod scheme;
pub mod session;
pub mod user;
pub mod username;

pub use scheme::{Counter, Rendered, Scheme, Tag};
pub use session::{ImportSession, Keyspace};
pub use user::{ImportAction, ImportUser};
pub use username::make_username;
