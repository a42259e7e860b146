//! Directory client abstraction.
//!
//! The school models never talk LDAP directly. They read and write
//! [`DirectoryObject`]s through the [`DirectoryClient`] trait, which mirrors
//! the operations of the directory-management layer: `get`, `new`, `save`,
//! `delete` and `search`, all keyed by distinguished name.
//!
//! # Architecture
//!
//! The directory layer is responsible for:
//! - Storing objects as a flat property bag plus a set of options
//! - Allocating DNs from the naming property and the position
//! - Moving objects when their naming property or position changes
//! - Keeping group memberships consistent on both sides
//!
//! It is NOT responsible for:
//! - School-specific naming conventions and container layout
//! - Validation of attribute values
//! - Role semantics of options and role strings
//!
//! # Example Usage
//!
//! ```rust
//! use kelvin_school::directory::{DirectoryClient, Filter, InMemoryDirectory};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = InMemoryDirectory::new("dc=example,dc=com");
//!
//! let mut ou = directory.new_object("container/ou", "dc=example,dc=com");
//! ou.set("name", json!("OU1"));
//! let saved = directory.save(ou).await?;
//! assert_eq!(saved.dn(), Some("ou=OU1,dc=example,dc=com"));
//!
//! let found = directory
//!     .search("container/ou", "dc=example,dc=com", &Filter::equal("name", "ou1"))
//!     .await?;
//! assert_eq!(found.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod dn;
pub mod errors;
pub mod filter;
pub mod in_memory;


pub use errors::{DirectoryError, DirectoryResult};
pub use filter::Filter;
pub use in_memory::InMemoryDirectory;

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::future::Future;

/// Directory module of user objects.
pub const USER_TYPE: &str = "users/user";
/// Directory module of group objects.
pub const GROUP_TYPE: &str = "groups/group";
/// Directory module of organizational units (schools).
pub const OU_TYPE: &str = "container/ou";
/// Directory module of plain containers.
pub const CONTAINER_TYPE: &str = "container/cn";
/// Directory module of file shares.
pub const SHARE_TYPE: &str = "shares/share";

/// Name of the naming property and of the RDN attribute for an object type.
pub fn naming_attribute(object_type: &str) -> (&'static str, &'static str) {
    match object_type {
        USER_TYPE => ("username", "uid"),
        OU_TYPE => ("name", "ou"),
        _ => ("name", "cn"),
    }
}

/// An object as exposed by the directory-management layer.
///
/// `dn` is `None` until the object has been saved. Changing the naming
/// property or the position of a saved object makes the next `save` a move.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryObject {
    object_type: String,
    position: String,
    dn: Option<String>,
    /// Flat typed property bag.
    pub properties: Map<String, Value>,
    /// Boolean capability flags.
    pub options: BTreeSet<String>,
}

impl DirectoryObject {
    /// A new, unsaved object of the given type below `position`.
    pub fn new(object_type: impl Into<String>, position: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            position: position.into(),
            dn: None,
            properties: Map::new(),
            options: BTreeSet::new(),
        }
    }

    /// The DN the object is stored at, if saved.
    pub fn dn(&self) -> Option<&str> {
        self.dn.as_deref()
    }

    pub(crate) fn set_dn(&mut self, dn: Option<String>) {
        self.dn = dn;
    }

    /// Directory module, e.g. `users/user`.
    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    /// DN of the container the object is (or will be) placed in.
    pub fn position(&self) -> &str {
        &self.position
    }

    /// Change the container; takes effect on the next `save`.
    pub fn set_position(&mut self, position: impl Into<String>) {
        self.position = position.into();
    }

    /// Whether the object has been saved.
    pub fn is_persisted(&self) -> bool {
        self.dn.is_some()
    }

    /// Get a property value.
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.properties.get(property)
    }

    /// Get a non-empty string property.
    pub fn get_str(&self, property: &str) -> Option<&str> {
        self.properties
            .get(property)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Get a list property; a scalar string is returned as a one-element list.
    pub fn get_list(&self, property: &str) -> Vec<String> {
        match self.properties.get(property) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    /// Set a property value.
    pub fn set(&mut self, property: impl Into<String>, value: Value) {
        self.properties.insert(property.into(), value);
    }

    /// Remove a property.
    pub fn remove(&mut self, property: &str) -> Option<Value> {
        self.properties.remove(property)
    }

    /// The RDN derived from the naming property.
    pub fn rdn(&self) -> DirectoryResult<String> {
        let (property, attribute) = naming_attribute(&self.object_type);
        let value = self.get_str(property).ok_or_else(|| {
            DirectoryError::invalid_property(
                self.dn.clone().unwrap_or_else(|| self.position.clone()),
                property,
                "naming property is empty",
            )
        })?;
        Ok(dn::build(attribute, value, ""))
    }

    /// The DN this object will have after the next `save`.
    pub fn target_dn(&self) -> DirectoryResult<String> {
        let rdn = self.rdn()?;
        if self.position.is_empty() {
            Ok(rdn)
        } else {
            Ok(format!("{},{}", rdn, self.position))
        }
    }
}

/// Client for the directory-management layer.
///
/// All operations are scoped by DN. The core treats the directory as an
/// async key-value store with search; consistency between concurrent
/// writers is whatever the backend provides.
pub trait DirectoryClient: Send + Sync {
    /// Load the object at `dn`.
    fn get(&self, dn: &str) -> impl Future<Output = DirectoryResult<Option<DirectoryObject>>> + Send;

    /// Allocate a new, unsaved object.
    fn new_object(&self, object_type: &str, position: &str) -> DirectoryObject {
        DirectoryObject::new(object_type, position)
    }

    /// Create or update an object and return its stored state.
    ///
    /// An unsaved object is created at its target DN. A saved object whose
    /// target DN differs from its current DN is moved and updated in one step.
    fn save(
        &self,
        object: DirectoryObject,
    ) -> impl Future<Output = DirectoryResult<DirectoryObject>> + Send;

    /// Delete the object at `dn` and everything below it.
    ///
    /// Returns `false` if nothing existed at `dn`.
    fn delete(&self, dn: &str) -> impl Future<Output = DirectoryResult<bool>> + Send;

    /// Find objects of `object_type` at or below `base` matching `filter`.
    fn search(
        &self,
        object_type: &str,
        base: &str,
        filter: &Filter,
    ) -> impl Future<Output = DirectoryResult<Vec<DirectoryObject>>> + Send;

    /// Check whether an object exists at `dn`.
    fn exists(&self, dn: &str) -> impl Future<Output = DirectoryResult<bool>> + Send {
        async move { Ok(self.get(dn).await?.is_some()) }
    }
}
