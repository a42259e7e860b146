//! Role-typed school users.
//!
//! A [`User`] carries its [`UserRole`] explicitly. The role decides the
//! container, the capability flags and the role groups; everything else is
//! shared by all roles.
//!
//! School classes and workgroups are kept as relative names per school
//! (`{"OU1": ["1a"]}`) and turned into group DNs when written.

use super::base::{EntityState, ModelKind, ModelMeta, SchoolModel, parse_role_strings};
use super::group::{SchoolGroup, full_name, has_school_prefix};
use super::layout::{DirectoryLayout, ManagedGroup};
use super::role::{ROLE_OPTIONS, RoleString, UserRole};
use crate::directory::{DirectoryObject, USER_TYPE, dn};
use crate::error::{KelvinError, KelvinResult, ValidationError};
use crate::schema::{AttributeDescriptor, Attributes, Syntax, read_attributes};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

static USER_ATTRIBUTES: &[AttributeDescriptor] = &[
    AttributeDescriptor::new("name", "Username", Syntax::UserName)
        .udm("username")
        .required()
        .unique()
        .unlikely_to_change(),
    AttributeDescriptor::new("school", "School", Syntax::SchoolName)
        .required()
        .transient(),
    AttributeDescriptor::new("schools", "Schools", Syntax::StringList)
        .udm("school")
        .required(),
    AttributeDescriptor::new("firstname", "First name", Syntax::Text).required(),
    AttributeDescriptor::new("lastname", "Last name", Syntax::Text).required(),
    AttributeDescriptor::new("birthday", "Birthday", Syntax::Date),
    AttributeDescriptor::new("expiration_date", "Expiration date", Syntax::Date).udm("userexpiry"),
    AttributeDescriptor::new("email", "Email", Syntax::Email).udm("mailPrimaryAddress"),
    AttributeDescriptor::new("password", "Password", Syntax::Text).hidden(),
    AttributeDescriptor::new("disabled", "Disabled", Syntax::Boolean),
    AttributeDescriptor::new("ucsschool_roles", "Roles", Syntax::RoleStrings).udm("ucsschoolRole"),
    AttributeDescriptor::new("record_uid", "Record UID", Syntax::Text)
        .udm("ucsschoolRecordUID")
        .unlikely_to_change(),
    AttributeDescriptor::new("source_uid", "Source UID", Syntax::Text)
        .udm("ucsschoolSourceUID")
        .unlikely_to_change(),
    AttributeDescriptor::new("school_classes", "Classes", Syntax::SchoolMembership).transient(),
    AttributeDescriptor::new("workgroups", "Workgroups", Syntax::SchoolMembership).transient(),
];

/// Descriptor table shared by all user roles.
pub fn user_descriptors() -> &'static [AttributeDescriptor] {
    USER_ATTRIBUTES
}

fn contains_ignore_case(list: &[String], item: &str) -> bool {
    list.iter().any(|x| x.eq_ignore_ascii_case(item))
}

/// A school user of one role.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    role: UserRole,
    attributes: Attributes,
    udm_properties: Map<String, Value>,
    state: EntityState,
}

impl User {
    pub fn new(role: UserRole, name: impl Into<String>, school: impl Into<String>) -> Self {
        let school = school.into();
        let mut attributes = Attributes::new();
        attributes.set_str("name", name);
        attributes.set_list("schools", [school.clone()]);
        attributes.set_str("school", school);
        Self {
            role,
            attributes,
            udm_properties: Map::new(),
            state: EntityState::default(),
        }
    }

    /// An unsaved user with no attributes; used by importers.
    pub fn empty(role: UserRole) -> Self {
        Self {
            role,
            attributes: Attributes::new(),
            udm_properties: Map::new(),
            state: EntityState::default(),
        }
    }

    pub fn with_names(mut self, firstname: &str, lastname: &str) -> Self {
        self.attributes.set_str("firstname", firstname);
        self.attributes.set_str("lastname", lastname);
        self
    }

    pub fn role(&self) -> UserRole {
        self.role
    }

    pub(crate) fn with_role(mut self, role: UserRole) -> Self {
        self.role = role;
        self
    }

    pub fn roles(&self) -> &'static [&'static str] {
        self.role.roles()
    }

    pub fn firstname(&self) -> Option<&str> {
        self.attributes.get_str("firstname")
    }

    pub fn lastname(&self) -> Option<&str> {
        self.attributes.get_str("lastname")
    }

    pub fn email(&self) -> Option<&str> {
        self.attributes.get_str("email")
    }

    pub fn record_uid(&self) -> Option<&str> {
        self.attributes.get_str("record_uid")
    }

    pub fn source_uid(&self) -> Option<&str> {
        self.attributes.get_str("source_uid")
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.attributes.set_str("password", password);
    }

    pub fn schools(&self) -> Vec<String> {
        self.attributes.get_list("schools")
    }

    /// Replace the member schools.
    ///
    /// If the primary school is not among them anymore, the
    /// lexicographically first school becomes primary. Classes, workgroups
    /// and school role strings of removed schools are dropped.
    pub fn set_schools(&mut self, schools: Vec<String>) {
        let mut unique: Vec<String> = Vec::new();
        for school in schools {
            if !contains_ignore_case(&unique, &school) {
                unique.push(school);
            }
        }
        let primary_kept = self
            .school()
            .is_some_and(|school| contains_ignore_case(&unique, school));
        if !primary_kept {
            if let Some(first) = unique.iter().min() {
                self.attributes.set_str("school", first.clone());
            }
        }
        self.attributes.set_list("schools", unique.clone());
        self.prune_schools(&unique);
    }

    /// Change the primary school, adding it to the member schools.
    pub fn set_school(&mut self, school: impl Into<String>) {
        let school = school.into();
        let mut schools = self.schools();
        if !contains_ignore_case(&schools, &school) {
            schools.push(school.clone());
            self.attributes.set_list("schools", schools);
        }
        self.attributes.set_str("school", school);
    }

    fn prune_schools(&mut self, schools: &[String]) {
        for attribute in ["school_classes", "workgroups"] {
            let mut membership = self.attributes.get_membership(attribute);
            let before = membership.len();
            membership.retain(|school, _| contains_ignore_case(schools, school));
            if membership.len() != before {
                self.attributes.set_membership(attribute, &membership);
            }
        }
        let roles: Vec<String> = self
            .role_strings()
            .into_iter()
            .filter(|raw| match raw.parse::<RoleString>() {
                Ok(role) => !role.is_school_context() || contains_ignore_case(schools, &role.context),
                Err(_) => true,
            })
            .collect();
        self.attributes.set_list("ucsschool_roles", roles);
    }

    /// Class names per school, without the school prefix.
    pub fn school_classes(&self) -> BTreeMap<String, Vec<String>> {
        self.attributes.get_membership("school_classes")
    }

    pub fn set_school_classes(&mut self, classes: BTreeMap<String, Vec<String>>) {
        self.attributes
            .set_membership("school_classes", &relative_membership(classes));
    }

    pub fn workgroups(&self) -> BTreeMap<String, Vec<String>> {
        self.attributes.get_membership("workgroups")
    }

    pub fn set_workgroups(&mut self, workgroups: BTreeMap<String, Vec<String>>) {
        self.attributes
            .set_membership("workgroups", &relative_membership(workgroups));
    }

    pub fn set_role_strings(&mut self, roles: Vec<String>) {
        self.attributes.set_list("ucsschool_roles", roles);
    }

    /// Additional directory properties written verbatim.
    pub fn udm_properties(&self) -> &Map<String, Value> {
        &self.udm_properties
    }

    pub fn udm_properties_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.udm_properties
    }

    /// The class and workgroup objects this user is a member of.
    pub fn member_groups(&self) -> Vec<SchoolGroup> {
        let mut groups = Vec::new();
        if self.role.can_hold_classes() {
            for (school, names) in self.school_classes() {
                groups.extend(names.iter().map(|n| SchoolGroup::school_class(school.clone(), n)));
            }
        }
        for (school, names) in self.workgroups() {
            groups.extend(names.iter().map(|n| SchoolGroup::workgroup(school.clone(), n)));
        }
        groups
    }

    /// Group DNs the user should be a member of, given the current ones.
    ///
    /// Groups not managed by the school models are kept.
    pub fn compute_groups(&self, current: &[String], layout: &DirectoryLayout) -> Vec<String> {
        let mut groups: Vec<String> = current
            .iter()
            .filter(|g| layout.classify_group(g).is_none())
            .cloned()
            .collect();
        let mut add = |group: String| {
            if !groups.iter().any(|g| dn::same(g, &group)) {
                groups.push(group);
            }
        };
        for school in self.schools() {
            add(layout.domain_users_dn(&school));
            for role_group in self.role.role_groups() {
                add(layout.role_group_dn(*role_group, &school));
            }
        }
        for group in self.member_groups() {
            add(group.dn(layout));
        }
        groups
    }

    /// Load a user from a directory object, requiring a specific role.
    pub fn from_directory_object_as(
        object: &DirectoryObject,
        layout: &DirectoryLayout,
        expected: UserRole,
    ) -> KelvinResult<Self> {
        let user = Self::from_directory_object(object, layout)?;
        if user.role != expected {
            return Err(KelvinError::WrongModel {
                dn: object.dn().unwrap_or_default().to_string(),
                expected: expected.to_string(),
                actual: user.role.to_string(),
            });
        }
        Ok(user)
    }
}

fn relative_membership(membership: BTreeMap<String, Vec<String>>) -> BTreeMap<String, Vec<String>> {
    membership
        .into_iter()
        .map(|(school, names)| {
            let names = names
                .into_iter()
                .map(|name| {
                    if has_school_prefix(&name, &school) {
                        name[school.len() + 1..].to_string()
                    } else {
                        name
                    }
                })
                .collect();
            (school, names)
        })
        .collect()
}

impl SchoolModel for User {
    fn kind(&self) -> ModelKind {
        ModelKind::User(self.role)
    }

    fn object_type(&self) -> &'static str {
        USER_TYPE
    }

    fn meta(&self) -> ModelMeta {
        ModelMeta {
            name_is_unique: true,
            allow_move: true,
        }
    }

    fn descriptors(&self) -> &'static [AttributeDescriptor] {
        USER_ATTRIBUTES
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
        if object.object_type() != USER_TYPE {
            return Err(KelvinError::WrongObjectType {
                dn: object_dn.to_string(),
                expected: USER_TYPE.to_string(),
                actual: object.object_type().to_string(),
            });
        }
        let role = UserRole::from_options(&object.options).ok_or_else(|| {
            KelvinError::UnknownModel {
                dn: object_dn.to_string(),
                options: object.options.iter().cloned().collect(),
            }
        })?;

        let mut attributes = read_attributes(USER_ATTRIBUTES, object);
        let schools = attributes.get_list("schools");
        let school = layout
            .school_of(object_dn)
            .or_else(|| schools.iter().min().cloned());
        if let Some(school) = school {
            attributes.set_str("school", school);
        }

        let mut classes: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut workgroups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for group in object.get_list("groups") {
            match layout.classify_group(&group) {
                Some(ManagedGroup::SchoolClass { school, name }) => {
                    classes.entry(school).or_default().push(name);
                }
                Some(ManagedGroup::WorkGroup { school, name }) => {
                    workgroups.entry(school).or_default().push(name);
                }
                _ => {}
            }
        }
        attributes.set_membership("school_classes", &relative_membership(classes));
        attributes.set_membership("workgroups", &relative_membership(workgroups));

        Ok(Self {
            role,
            attributes,
            udm_properties: Map::new(),
            state: EntityState::loaded(object),
        })
    }

    fn position(&self, layout: &DirectoryLayout) -> String {
        layout.role_container(self.role, self.school().unwrap_or_default())
    }

    fn prepare(&mut self) {
        let mut schools = self.schools();
        match self.school().map(str::to_string) {
            Some(school) if !contains_ignore_case(&schools, &school) => {
                schools.insert(0, school);
                self.attributes.set_list("schools", schools.clone());
            }
            Some(_) => {}
            None => {
                if let Some(first) = schools.iter().min() {
                    self.attributes.set_str("school", first.clone());
                }
            }
        }

        let classes = self.school_classes();
        if !classes.is_empty() {
            self.set_school_classes(classes);
        }
        let workgroups = self.workgroups();
        if !workgroups.is_empty() {
            self.set_workgroups(workgroups);
        }

        let mut roles = self.role_strings();
        let parsed = parse_role_strings(&roles);
        for school in &schools {
            for default in self.role.default_role_strings(school) {
                if !parsed.iter().any(|r| r.matches(&default)) {
                    roles.push(default.to_string());
                }
            }
        }
        self.attributes.set_list("ucsschool_roles", roles);
    }

    fn referenced_schools(&self) -> Vec<String> {
        let mut schools = self.schools();
        if let Some(school) = self.school() {
            if !contains_ignore_case(&schools, school) {
                schools.push(school.to_string());
            }
        }
        for school in self.school_classes().into_keys().chain(self.workgroups().into_keys()) {
            if !contains_ignore_case(&schools, &school) {
                schools.push(school);
            }
        }
        schools
    }

    fn member_schools(&self) -> Vec<String> {
        self.schools()
    }

    fn validate_model(&self, _layout: &DirectoryLayout, errors: &mut ValidationError) {
        let schools = self.schools();
        if let Some(school) = self.school() {
            if !contains_ignore_case(&schools, school) {
                errors.add("school", format!("Primary school {:?} is not in schools.", school));
            }
        }
        for (attribute, label) in [("school_classes", "classes"), ("workgroups", "workgroups")] {
            for school in self.attributes.get_membership(attribute).keys() {
                if !contains_ignore_case(&schools, school) {
                    errors.add(
                        attribute,
                        format!("User has {} in school {:?} but is not a member of it.", label, school),
                    );
                }
            }
        }
        if !self.role.can_hold_classes() && self.school_classes().values().any(|c| !c.is_empty()) {
            errors.add(
                "school_classes",
                format!("Users of role {} cannot be members of school classes.", self.role),
            );
        }
    }

    fn write_to(&self, object: &mut DirectoryObject, layout: &DirectoryLayout) -> KelvinResult<()> {
        crate::schema::write_attributes(USER_ATTRIBUTES, &self.attributes, object);

        object.options.retain(|o| !ROLE_OPTIONS.contains(&o.as_str()));
        object
            .options
            .extend(self.role.default_options().iter().map(|o| o.to_string()));

        let groups = self.compute_groups(&object.get_list("groups"), layout);
        object.set("groups", json!(groups));
        if let Some(school) = self.school() {
            object.set("primaryGroup", json!(layout.domain_users_dn(school)));
        }
        for (property, value) in &self.udm_properties {
            object.set(property.clone(), value.clone());
        }
        Ok(())
    }

    fn implied_groups(&self) -> Vec<SchoolGroup> {
        self.member_groups()
    }

    fn on_school_change(&mut self, old_school: &str, _new_school: &str) {
        let schools = self.schools();
        if !contains_ignore_case(&schools, old_school) {
            self.prune_schools(&schools);
        }
    }
}

/// Full class names for a relative membership map, e.g. for group lookups.
pub fn class_names(membership: &BTreeMap<String, Vec<String>>) -> Vec<(String, String)> {
    membership
        .iter()
        .flat_map(|(school, names)| {
            names
                .iter()
                .map(move |name| (school.clone(), full_name(school, name)))
        })
        .collect()
}
