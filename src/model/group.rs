//! School classes and workgroups.

use super::base::{Dependent, EntityState, ModelKind, ModelMeta, SchoolModel};
use super::layout::{DirectoryLayout, ManagedGroup};
use super::role::RoleString;
use super::share::Share;
use crate::directory::{DirectoryObject, GROUP_TYPE};
use crate::error::{KelvinError, KelvinResult, ValidationError};
use crate::schema::{AttributeDescriptor, Attributes, Syntax, read_attributes};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

static GROUP_ATTRIBUTES: &[AttributeDescriptor] = &[
    AttributeDescriptor::new("name", "Name", Syntax::GroupName).required(),
    AttributeDescriptor::new("school", "School", Syntax::SchoolName)
        .required()
        .transient(),
    AttributeDescriptor::new("description", "Description", Syntax::Text),
    AttributeDescriptor::new("users", "Users", Syntax::DnList),
    AttributeDescriptor::new("ucsschool_roles", "Roles", Syntax::RoleStrings).udm("ucsschoolRole"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    SchoolClass,
    WorkGroup,
}

impl GroupKind {
    fn role(self) -> &'static str {
        match self {
            GroupKind::SchoolClass => "school_class",
            GroupKind::WorkGroup => "workgroup",
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKind::SchoolClass => f.write_str("school class"),
            GroupKind::WorkGroup => f.write_str("workgroup"),
        }
    }
}

/// Whether `name` has the form `{school}-{something}`.
pub fn has_school_prefix(name: &str, school: &str) -> bool {
    let prefix = format!("{}-", school);
    name.len() > prefix.len()
        && name
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(&prefix))
}

/// Full directory name of a group from its school and relative name.
///
/// Names that already carry the school prefix are kept.
pub fn full_name(school: &str, name: &str) -> String {
    if has_school_prefix(name, school) {
        name.to_string()
    } else {
        format!("{}-{}", school, name)
    }
}

/// A school class or workgroup.
///
/// `name` holds the full directory name (`OU1-1a`); members are DNs.
#[derive(Debug, Clone, PartialEq)]
pub struct SchoolGroup {
    kind: GroupKind,
    attributes: Attributes,
    state: EntityState,
}

impl SchoolGroup {
    /// A new group; `name` may be relative (`1a`) or full (`OU1-1a`).
    pub fn new(kind: GroupKind, school: impl Into<String>, name: &str) -> Self {
        let school = school.into();
        let mut attributes = Attributes::new();
        attributes.set_str("name", full_name(&school, name));
        attributes.set_str("school", school);
        Self {
            kind,
            attributes,
            state: EntityState::default(),
        }
    }

    pub fn school_class(school: impl Into<String>, name: &str) -> Self {
        Self::new(GroupKind::SchoolClass, school, name)
    }

    pub fn workgroup(school: impl Into<String>, name: &str) -> Self {
        Self::new(GroupKind::WorkGroup, school, name)
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    /// The name without the school prefix.
    pub fn relative_name(&self) -> Option<&str> {
        let name = self.name()?;
        let school = self.school()?;
        if has_school_prefix(name, school) {
            Some(&name[school.len() + 1..])
        } else {
            Some(name)
        }
    }

    /// Rename keeping the school prefix.
    pub fn set_name(&mut self, name: &str) {
        let school = self.school().unwrap_or_default().to_string();
        self.attributes.set_str("name", full_name(&school, name));
    }

    pub fn description(&self) -> Option<&str> {
        self.attributes.get_str("description")
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.attributes.set_str("description", description);
    }

    /// Member DNs.
    pub fn users(&self) -> Vec<String> {
        self.attributes.get_list("users")
    }

    pub fn set_users(&mut self, users: Vec<String>) {
        self.attributes.set_list("users", users);
    }

    /// The share that belongs to this group.
    pub fn share(&self, layout: &DirectoryLayout) -> Share {
        Share::for_group(self, layout)
    }

    /// Directory object for this group without going through the lifecycle.
    pub(crate) fn to_directory_object(&self, layout: &DirectoryLayout) -> KelvinResult<DirectoryObject> {
        let mut object = DirectoryObject::new(GROUP_TYPE, self.position(layout));
        self.write_to(&mut object, layout)?;
        Ok(object)
    }
}

impl SchoolModel for SchoolGroup {
    fn kind(&self) -> ModelKind {
        match self.kind {
            GroupKind::SchoolClass => ModelKind::SchoolClass,
            GroupKind::WorkGroup => ModelKind::WorkGroup,
        }
    }

    fn object_type(&self) -> &'static str {
        GROUP_TYPE
    }

    fn meta(&self) -> ModelMeta {
        ModelMeta {
            name_is_unique: false,
            allow_move: true,
        }
    }

    fn descriptors(&self) -> &'static [AttributeDescriptor] {
        GROUP_ATTRIBUTES
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    fn state(&self) -> &EntityState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EntityState {
        &mut self.state
    }

    fn from_directory_object(object: &DirectoryObject, layout: &DirectoryLayout) -> KelvinResult<Self> {
        let object_dn = object.dn().unwrap_or_default();
        let (kind, school) = match layout.classify_group(object_dn) {
            Some(ManagedGroup::SchoolClass { school, .. }) => (GroupKind::SchoolClass, school),
            Some(ManagedGroup::WorkGroup { school, .. }) => (GroupKind::WorkGroup, school),
            _ => {
                return Err(KelvinError::WrongObjectType {
                    dn: object_dn.to_string(),
                    expected: "school class or workgroup".to_string(),
                    actual: object.object_type().to_string(),
                });
            }
        };
        if object.object_type() != GROUP_TYPE {
            return Err(KelvinError::WrongObjectType {
                dn: object_dn.to_string(),
                expected: GROUP_TYPE.to_string(),
                actual: object.object_type().to_string(),
            });
        }
        let mut attributes = read_attributes(GROUP_ATTRIBUTES, object);
        attributes.set_str("school", school);
        Ok(Self {
            kind,
            attributes,
            state: EntityState::loaded(object),
        })
    }

    fn position(&self, layout: &DirectoryLayout) -> String {
        let school = self.school().unwrap_or_default();
        match self.kind {
            GroupKind::SchoolClass => layout.classes_container(school),
            GroupKind::WorkGroup => layout.student_groups_container(school),
        }
    }

    fn prepare(&mut self) {
        let Some(school) = self.school().map(str::to_string) else {
            return;
        };
        let own = RoleString::school(self.kind.role(), &school);
        let mut roles = self.attributes.get_list("ucsschool_roles");
        let present = roles
            .iter()
            .filter_map(|r| r.parse::<RoleString>().ok())
            .any(|r| r.matches(&own));
        if !present {
            roles.push(own.to_string());
            self.attributes.set_list("ucsschool_roles", roles);
        }
    }

    fn validate_model(&self, _layout: &DirectoryLayout, errors: &mut ValidationError) {
        if let (Some(name), Some(school)) = (self.name(), self.school()) {
            if !has_school_prefix(name, school) {
                errors.add(
                    "name",
                    format!("Name must start with the school name {:?}.", format!("{}-", school)),
                );
            }
        }
    }

    fn dependents(&self, layout: &DirectoryLayout) -> Vec<Dependent> {
        match self.share(layout).to_directory_object(layout) {
            Ok(object) => vec![Dependent::owned(object)],
            Err(e) => {
                warn!("Cannot build share for {:?}: {}", self.name(), e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContainerNames;

    fn layout() -> DirectoryLayout {
        DirectoryLayout::new("dc=example,dc=com", ContainerNames::default())
    }

    #[test]
    fn test_names_carry_the_school_prefix() {
        let class = SchoolGroup::school_class("OU1", "1a");
        assert_eq!(class.name(), Some("OU1-1a"));
        assert_eq!(class.relative_name(), Some("1a"));
        assert_eq!(SchoolGroup::school_class("OU1", "OU1-1a").name(), Some("OU1-1a"));
        assert_eq!(SchoolGroup::school_class("OU1", "ou1-1a").relative_name(), Some("1a"));
        assert!(!has_school_prefix("OU1-", "OU1"));
        assert!(!has_school_prefix("OU12-a", "OU1"));
    }

    #[test]
    fn test_placement() {
        let layout = layout();
        assert_eq!(
            SchoolGroup::school_class("OU1", "1a").dn(&layout),
            "cn=OU1-1a,cn=klassen,cn=schueler,cn=groups,ou=OU1,dc=example,dc=com"
        );
        assert_eq!(
            SchoolGroup::workgroup("OU1", "chess").dn(&layout),
            "cn=OU1-chess,cn=schueler,cn=groups,ou=OU1,dc=example,dc=com"
        );
    }

    #[test]
    fn test_share_follows_group() {
        let layout = layout();
        let class = SchoolGroup::school_class("OU1", "1a");
        let dependents = class.dependents(&layout);
        assert_eq!(dependents.len(), 1);
        let share = &dependents[0].object;
        assert_eq!(
            share.target_dn().unwrap(),
            "cn=OU1-1a,cn=klassen,cn=shares,ou=OU1,dc=example,dc=com"
        );
        assert_eq!(share.get_str("group"), Some(class.dn(&layout).as_str()));
    }

    #[test]
    fn test_missing_prefix_is_a_validation_error() {
        let layout = layout();
        let mut group = SchoolGroup::workgroup("OU1", "chess");
        group.attributes_mut().set_str("name", "chess");
        let mut errors = ValidationError::default();
        group.validate_model(&layout, &mut errors);
        assert_eq!(errors.messages("name").len(), 1);
    }

    #[test]
    fn test_prepare_adds_role_once() {
        let mut group = SchoolGroup::workgroup("OU1", "chess");
        group.prepare();
        group.prepare();
        assert_eq!(group.role_strings(), vec!["workgroup:school:OU1".to_string()]);
    }
}
