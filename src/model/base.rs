//! The contract shared by all school models.

use super::group::SchoolGroup;
use super::layout::DirectoryLayout;
use super::role::{RoleString, UserRole};
use crate::directory::{DirectoryObject, dn, naming_attribute};
use crate::error::{KelvinResult, ValidationError};
use crate::schema::{AttributeDescriptor, Attributes, write_attributes};
use log::warn;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Identifies a concrete model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ModelKind {
    School,
    SchoolClass,
    WorkGroup,
    ClassShare,
    WorkGroupShare,
    User(UserRole),
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::School => f.write_str("School"),
            ModelKind::SchoolClass => f.write_str("SchoolClass"),
            ModelKind::WorkGroup => f.write_str("WorkGroup"),
            ModelKind::ClassShare => f.write_str("ClassShare"),
            ModelKind::WorkGroupShare => f.write_str("WorkGroupShare"),
            ModelKind::User(role) => write!(f, "{}", role),
        }
    }
}

/// Per-model policy flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelMeta {
    /// No two objects of the model may share a name directory-wide.
    pub name_is_unique: bool,
    /// Default for `move_if_necessary` in `modify`.
    pub allow_move: bool,
}

/// Persistence state of a model instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityState {
    /// DN at load time; `None` for unsaved entities.
    pub old_dn: Option<String>,
    cached: Option<DirectoryObject>,
    warnings: BTreeMap<String, String>,
}

impl EntityState {
    /// State of an entity loaded from `object`.
    pub fn loaded(object: &DirectoryObject) -> Self {
        Self {
            old_dn: object.dn().map(str::to_string),
            cached: Some(object.clone()),
            warnings: BTreeMap::new(),
        }
    }

    pub fn cached(&self) -> Option<&DirectoryObject> {
        self.cached.as_ref()
    }

    pub fn cache(&mut self, object: DirectoryObject) {
        self.cached = Some(object);
    }

    /// Drop the cached directory object.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    pub fn warnings(&self) -> &BTreeMap<String, String> {
        &self.warnings
    }

    pub fn add_warning(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        self.warnings.insert(attribute.into(), message.into());
    }

    pub fn clear_warnings(&mut self) {
        self.warnings.clear();
    }
}

/// A directory object created together with a model.
#[derive(Debug, Clone)]
pub struct Dependent {
    pub object: DirectoryObject,
    /// Owned dependents are moved and removed with the model. Shared ones
    /// (global containers) are only created when missing.
    pub owned: bool,
}

impl Dependent {
    pub fn owned(object: DirectoryObject) -> Self {
        Self {
            object,
            owned: true,
        }
    }

    pub fn shared(object: DirectoryObject) -> Self {
        Self {
            object,
            owned: false,
        }
    }
}

/// A school model backed by a directory object.
///
/// Implementors provide their descriptor table, placement and the
/// conversion from and to directory objects. The lifecycle itself lives in
/// [`SchoolDirectory`](super::SchoolDirectory).
pub trait SchoolModel: Clone + fmt::Debug + Send + Sync {
    fn kind(&self) -> ModelKind;

    /// Directory module of the backing object.
    fn object_type(&self) -> &'static str;

    fn meta(&self) -> ModelMeta;

    fn descriptors(&self) -> &'static [AttributeDescriptor];

    fn attributes(&self) -> &Attributes;

    fn attributes_mut(&mut self) -> &mut Attributes;

    fn state(&self) -> &EntityState;

    fn state_mut(&mut self) -> &mut EntityState;

    /// Build the model from a directory object.
    fn from_directory_object(object: &DirectoryObject, layout: &DirectoryLayout) -> KelvinResult<Self>;

    /// Container the object belongs in.
    fn position(&self, layout: &DirectoryLayout) -> String;

    fn name(&self) -> Option<&str> {
        self.attributes().get_str("name")
    }

    fn school(&self) -> Option<&str> {
        self.attributes().get_str("school")
    }

    /// The DN computed from the current name and position.
    fn dn(&self, layout: &DirectoryLayout) -> String {
        let (_, attribute) = naming_attribute(self.object_type());
        dn::build(attribute, self.name().unwrap_or_default(), &self.position(layout))
    }

    /// Fill in derived defaults before validation and writing.
    fn prepare(&mut self) {}

    /// Schools that must exist.
    fn referenced_schools(&self) -> Vec<String> {
        self.school().map(str::to_string).into_iter().collect()
    }

    /// Schools school-scoped role strings may refer to.
    fn member_schools(&self) -> Vec<String> {
        self.referenced_schools()
    }

    fn role_strings(&self) -> Vec<String> {
        self.attributes().get_list("ucsschool_roles")
    }

    /// Model-specific consistency checks.
    fn validate_model(&self, _layout: &DirectoryLayout, _errors: &mut ValidationError) {}

    /// Write the model onto its directory object.
    fn write_to(&self, object: &mut DirectoryObject, _layout: &DirectoryLayout) -> KelvinResult<()> {
        write_attributes(self.descriptors(), self.attributes(), object);
        Ok(())
    }

    /// Objects created with the model, in creation order.
    fn dependents(&self, _layout: &DirectoryLayout) -> Vec<Dependent> {
        Vec::new()
    }

    /// Groups that must exist before the model is written.
    fn implied_groups(&self) -> Vec<SchoolGroup> {
        Vec::new()
    }

    /// Called when a move changes the primary school.
    fn on_school_change(&mut self, _old_school: &str, _new_school: &str) {}
}

/// Role strings of a model that are not well-formed are dropped with a warning.
pub fn parse_role_strings(raw: &[String]) -> Vec<RoleString> {
    raw.iter()
        .filter_map(|s| match s.parse() {
            Ok(role) => Some(role),
            Err(e) => {
                warn!("Ignoring {}", e);
                None
            }
        })
        .collect()
}
