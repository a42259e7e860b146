//! File shares belonging to school classes and workgroups.

use super::base::{EntityState, ModelKind, ModelMeta, SchoolModel};
use super::group::{GroupKind, SchoolGroup};
use super::layout::DirectoryLayout;
use super::role::RoleString;
use crate::directory::{DirectoryObject, SHARE_TYPE, dn};
use crate::error::{KelvinError, KelvinResult, ValidationError};
use crate::schema::{AttributeDescriptor, Attributes, Syntax, read_attributes};

static SHARE_ATTRIBUTES: &[AttributeDescriptor] = &[
    AttributeDescriptor::new("name", "Name", Syntax::GroupName).required(),
    AttributeDescriptor::new("school", "School", Syntax::SchoolName)
        .required()
        .transient(),
    AttributeDescriptor::new("group", "Group", Syntax::Text).required(),
    AttributeDescriptor::new("path", "Path", Syntax::Text),
    AttributeDescriptor::new("ucsschool_roles", "Roles", Syntax::RoleStrings).udm("ucsschoolRole"),
];

/// The share of a school class or workgroup; same name as its group.
#[derive(Debug, Clone, PartialEq)]
pub struct Share {
    kind: GroupKind,
    attributes: Attributes,
    state: EntityState,
}

impl Share {
    /// The share belonging to `group`.
    pub fn for_group(group: &SchoolGroup, layout: &DirectoryLayout) -> Self {
        let name = group.name().unwrap_or_default().to_string();
        let school = group.school().unwrap_or_default().to_string();
        let mut attributes = Attributes::new();
        attributes.set_str("group", group.dn(layout));
        let folder = match group.kind() {
            GroupKind::SchoolClass => "klassen/",
            GroupKind::WorkGroup => "",
        };
        attributes.set_str(
            "path",
            format!("/home/{}/groups/{}{}", school, folder, name),
        );
        attributes.set_list(
            "ucsschool_roles",
            [RoleString::school(Self::role_for(group.kind()), &school).to_string()],
        );
        attributes.set_str("name", name);
        attributes.set_str("school", school);
        Self {
            kind: group.kind(),
            attributes,
            state: EntityState::default(),
        }
    }

    fn role_for(kind: GroupKind) -> &'static str {
        match kind {
            GroupKind::SchoolClass => "school_class_share",
            GroupKind::WorkGroup => "workgroup_share",
        }
    }

    pub fn group_kind(&self) -> GroupKind {
        self.kind
    }

    /// DN of the group this share belongs to.
    pub fn group_dn(&self) -> Option<&str> {
        self.attributes.get_str("group")
    }

    pub fn path(&self) -> Option<&str> {
        self.attributes.get_str("path")
    }

    /// A fresh directory object for this share.
    pub fn to_directory_object(&self, layout: &DirectoryLayout) -> KelvinResult<DirectoryObject> {
        let mut object = DirectoryObject::new(SHARE_TYPE, self.position(layout));
        self.write_to(&mut object, layout)?;
        Ok(object)
    }
}

impl SchoolModel for Share {
    fn kind(&self) -> ModelKind {
        match self.kind {
            GroupKind::SchoolClass => ModelKind::ClassShare,
            GroupKind::WorkGroup => ModelKind::WorkGroupShare,
        }
    }

    fn object_type(&self) -> &'static str {
        SHARE_TYPE
    }

    fn meta(&self) -> ModelMeta {
        ModelMeta {
            name_is_unique: false,
            allow_move: true,
        }
    }

    fn descriptors(&self) -> &'static [AttributeDescriptor] {
        SHARE_ATTRIBUTES
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
        let wrong_type = || KelvinError::WrongObjectType {
            dn: object_dn.to_string(),
            expected: "class or workgroup share".to_string(),
            actual: object.object_type().to_string(),
        };
        if object.object_type() != SHARE_TYPE {
            return Err(wrong_type());
        }
        let school = layout.school_of(object_dn).ok_or_else(wrong_type)?;
        let parent = dn::parent(object_dn).unwrap_or_default();
        let kind = if dn::same(&parent, &layout.class_shares_container(&school)) {
            GroupKind::SchoolClass
        } else if dn::same(&parent, &layout.shares_container(&school)) {
            GroupKind::WorkGroup
        } else {
            return Err(wrong_type());
        };
        let mut attributes = read_attributes(SHARE_ATTRIBUTES, object);
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
            GroupKind::SchoolClass => layout.class_shares_container(school),
            GroupKind::WorkGroup => layout.shares_container(school),
        }
    }

    fn validate_model(&self, _layout: &DirectoryLayout, errors: &mut ValidationError) {
        if let (Some(name), Some(school)) = (self.name(), self.school()) {
            if !super::group::has_school_prefix(name, school) {
                errors.add(
                    "name",
                    format!("Name must start with the school name {:?}.", format!("{}-", school)),
                );
            }
        }
    }
}
