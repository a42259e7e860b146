//! Schools (organizational units).

use super::base::{Dependent, EntityState, ModelKind, ModelMeta, SchoolModel};
use super::layout::DirectoryLayout;
use super::role::{RoleGroup, RoleString};
use crate::directory::{CONTAINER_TYPE, DirectoryObject, GROUP_TYPE, OU_TYPE, dn};
use crate::error::{KelvinError, KelvinResult};
use crate::schema::{AttributeDescriptor, Attributes, Syntax, read_attributes};
use serde_json::json;

pub const ROLE_SCHOOL: &str = "school";

static SCHOOL_ATTRIBUTES: &[AttributeDescriptor] = &[
    AttributeDescriptor::new("name", "School name", Syntax::SchoolName)
        .required()
        .unique()
        .unlikely_to_change(),
    AttributeDescriptor::new("display_name", "Display name", Syntax::Text).udm("displayName"),
    AttributeDescriptor::new("ucsschool_roles", "Roles", Syntax::RoleStrings).udm("ucsschoolRole"),
];

/// A school and the container structure below it.
#[derive(Debug, Clone, PartialEq)]
pub struct School {
    attributes: Attributes,
    state: EntityState,
}

impl School {
    pub fn new(name: impl Into<String>) -> Self {
        let mut attributes = Attributes::new();
        attributes.set_str("name", name);
        Self {
            attributes,
            state: EntityState::default(),
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.attributes.set_str("display_name", display_name);
        self
    }

    pub fn display_name(&self) -> Option<&str> {
        self.attributes.get_str("display_name")
    }

    fn container(&self, name: &str, parent: &str) -> DirectoryObject {
        let mut object = DirectoryObject::new(CONTAINER_TYPE, parent);
        object.set("name", json!(name));
        object
    }

    fn group(&self, name: &str, parent: &str, description: &str) -> DirectoryObject {
        let mut object = DirectoryObject::new(GROUP_TYPE, parent);
        object.set("name", json!(name));
        object.set("description", json!(description));
        object.set("users", json!([]));
        object
    }
}

impl SchoolModel for School {
    fn kind(&self) -> ModelKind {
        ModelKind::School
    }

    fn object_type(&self) -> &'static str {
        OU_TYPE
    }

    fn meta(&self) -> ModelMeta {
        ModelMeta {
            name_is_unique: true,
            allow_move: false,
        }
    }

    fn descriptors(&self) -> &'static [AttributeDescriptor] {
        SCHOOL_ATTRIBUTES
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

    fn from_directory_object(object: &DirectoryObject, _layout: &DirectoryLayout) -> KelvinResult<Self> {
        let object_dn = object.dn().unwrap_or_default();
        if object.object_type() != OU_TYPE {
            return Err(KelvinError::WrongObjectType {
                dn: object_dn.to_string(),
                expected: OU_TYPE.to_string(),
                actual: object.object_type().to_string(),
            });
        }
        let mut attributes = read_attributes(SCHOOL_ATTRIBUTES, object);
        if !attributes.contains("name") {
            if let Some(name) = dn::rdn_value(object_dn) {
                attributes.set_str("name", name);
            }
        }
        Ok(Self {
            attributes,
            state: EntityState::loaded(object),
        })
    }

    fn position(&self, layout: &DirectoryLayout) -> String {
        layout.base().to_string()
    }

    fn school(&self) -> Option<&str> {
        self.name()
    }

    fn prepare(&mut self) {
        let Some(name) = self.name().map(str::to_string) else {
            return;
        };
        let own = RoleString::school(ROLE_SCHOOL, &name).to_string();
        let mut roles = self.attributes.get_list("ucsschool_roles");
        if !roles.iter().any(|r| r.eq_ignore_ascii_case(&own)) {
            roles.push(own);
            self.attributes.set_list("ucsschool_roles", roles);
        }
    }

    fn referenced_schools(&self) -> Vec<String> {
        Vec::new()
    }

    fn member_schools(&self) -> Vec<String> {
        self.name().map(str::to_string).into_iter().collect()
    }

    fn dependents(&self, layout: &DirectoryLayout) -> Vec<Dependent> {
        let Some(school) = self.name() else {
            return Vec::new();
        };
        let names = layout.names();
        let school_dn = layout.school_dn(school);
        let users = layout.users_container(school);
        let groups = layout.groups_container(school);
        let student_groups = layout.student_groups_container(school);
        let shares = layout.shares_container(school);

        let mut dependents = vec![
            Dependent::shared(self.container(&names.groups, layout.base())),
            Dependent::shared(self.container(&names.ou_admins, &layout.global_groups_container())),
            Dependent::owned(self.container(&names.users, &school_dn)),
        ];
        for container in [
            &names.students,
            &names.teachers,
            &names.staff,
            &names.teachers_and_staff,
            &names.admins,
        ] {
            dependents.push(Dependent::owned(self.container(container, &users)));
        }
        dependents.push(Dependent::owned(self.container(&names.exam_users, &school_dn)));
        dependents.push(Dependent::owned(self.container(&names.groups, &school_dn)));
        dependents.push(Dependent::owned(self.container(&names.students, &groups)));
        dependents.push(Dependent::owned(self.container(&names.classes, &student_groups)));
        dependents.push(Dependent::owned(self.container(&names.shares, &school_dn)));
        dependents.push(Dependent::owned(self.container(&names.classes, &shares)));

        for (group, description) in [
            (RoleGroup::Students, "Students"),
            (RoleGroup::Teachers, "Teachers"),
            (RoleGroup::Staff, "Staff"),
        ] {
            let name = layout.role_group_name(group, school);
            dependents.push(Dependent::owned(self.group(
                &name,
                &groups,
                &format!("{} of school {}", description, school),
            )));
        }
        dependents.push(Dependent::owned(self.group(
            &layout.domain_users_name(school),
            &groups,
            &format!("All users of school {}", school),
        )));
        dependents.push(Dependent::owned(self.group(
            &layout.role_group_name(RoleGroup::Admins, school),
            &layout.ou_admins_container(),
            &format!("Administrators of school {}", school),
        )));
        dependents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContainerNames;

    #[test]
    fn test_school_placement_and_defaults() {
        let layout = DirectoryLayout::new("dc=example,dc=com", ContainerNames::default());
        let mut school = School::new("OU1").with_display_name("First school");
        school.prepare();
        school.prepare();

        assert_eq!(school.dn(&layout), "ou=OU1,dc=example,dc=com");
        assert_eq!(school.role_strings(), vec!["school:school:OU1".to_string()]);
        assert_eq!(school.member_schools(), vec!["OU1".to_string()]);
        assert!(school.referenced_schools().is_empty());
        assert!(!school.meta().allow_move);
    }

    #[test]
    fn test_dependents_create_parents_first() {
        let layout = DirectoryLayout::new("dc=example,dc=com", ContainerNames::default());
        let dependents = School::new("OU1").dependents(&layout);
        let mut created: Vec<String> = vec!["dc=example,dc=com".to_string(), "ou=OU1,dc=example,dc=com".to_string()];
        for dependent in &dependents {
            let position = dependent.object.position();
            assert!(
                created.iter().any(|c| dn::same(c, position)),
                "{} created before its parent",
                position
            );
            created.push(dependent.object.target_dn().unwrap());
        }
        assert!(created.iter().any(|c| dn::same(c, &layout.domain_users_dn("OU1"))));
        assert!(dependents.iter().filter(|d| !d.owned).count() == 2);
    }
}
