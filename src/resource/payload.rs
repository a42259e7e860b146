//! Wire representations of the resources.
//!
//! Payloads reference other resources by URL (`school`, `schools`, `roles`,
//! group `users`). Incoming URLs are resolved by their last path segment,
//! so plain names are accepted as well.
//!
//! All fields are optional on input: for PATCH an absent field is left
//! alone, for PUT it is cleared.

use super::context::{RequestContext, url_tail};
use crate::directory::dn;
use crate::error::{KelvinError, KelvinResult};
use crate::model::{School, SchoolGroup, SchoolModel, User, UserRole};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Role tokens exposed by the `roles` resource.
pub const PUBLIC_ROLES: [(&str, &str); 4] = [
    ("staff", "Staff"),
    ("student", "Student"),
    ("teacher", "Teacher"),
    ("school_admin", "School administrator"),
];

/// Parse a JSON body into a payload; shape errors become 422.
pub fn parse<T: for<'de> Deserialize<'de>>(data: Option<Value>) -> KelvinResult<T> {
    let data = data.ok_or_else(|| KelvinError::invalid_request("Missing request body"))?;
    Ok(serde_json::from_value(data)?)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub name: Option<String>,
    pub school: Option<String>,
    pub schools: Option<Vec<String>>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub birthday: Option<String>,
    pub expiration_date: Option<String>,
    pub disabled: Option<bool>,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub record_uid: Option<String>,
    pub source_uid: Option<String>,
    pub roles: Option<Vec<String>>,
    pub school_classes: Option<BTreeMap<String, Vec<String>>>,
    pub workgroups: Option<BTreeMap<String, Vec<String>>>,
    pub ucsschool_roles: Option<Vec<String>>,
    pub udm_properties: Option<Map<String, Value>>,
}

impl UserPayload {
    /// The role requested by `roles`, if given.
    pub fn role(&self) -> KelvinResult<Option<UserRole>> {
        let Some(roles) = &self.roles else {
            return Ok(None);
        };
        let tokens: Vec<&str> = roles.iter().map(|r| url_tail(r)).collect();
        UserRole::from_role_tokens(&tokens)
            .filter(|role| *role != UserRole::ExamStudent)
            .map(Some)
            .ok_or_else(|| {
                KelvinError::invalid_request(format!("Unknown role combination {:?}", tokens))
            })
    }

    /// Primary school name.
    pub fn school_name(&self) -> Option<&str> {
        self.school.as_deref().map(url_tail)
    }

    pub fn school_names(&self) -> Option<Vec<String>> {
        self.schools
            .as_ref()
            .map(|schools| schools.iter().map(|s| url_tail(s).to_string()).collect())
    }

    /// Build a new user. The role must be given.
    pub fn to_user(&self) -> KelvinResult<User> {
        let role = self
            .role()?
            .ok_or_else(|| KelvinError::invalid_request("Field 'roles' is required"))?;
        let mut user = User::empty(role);
        self.apply(&mut user, true);
        Ok(user)
    }

    /// Copy the payload onto `user`.
    ///
    /// With `replace`, absent fields are cleared; otherwise they are kept.
    /// The role is not touched.
    pub fn apply(&self, user: &mut User, replace: bool) {
        let texts = [
            ("name", &self.name),
            ("firstname", &self.firstname),
            ("lastname", &self.lastname),
            ("birthday", &self.birthday),
            ("expiration_date", &self.expiration_date),
            ("email", &self.email),
            ("record_uid", &self.record_uid),
            ("source_uid", &self.source_uid),
        ];
        for (attribute, value) in texts {
            match value {
                Some(value) => user.attributes_mut().set_str(attribute, value.clone()),
                None if replace => {
                    user.attributes_mut().remove(attribute);
                }
                None => {}
            }
        }
        match self.disabled {
            Some(disabled) => user.attributes_mut().set("disabled", Value::Bool(disabled)),
            None if replace => {
                user.attributes_mut().remove("disabled");
            }
            None => {}
        }
        if let Some(password) = &self.password {
            user.set_password(password.clone());
        }

        if let Some(schools) = self.school_names() {
            user.set_schools(schools);
        }
        if let Some(school) = self.school_name() {
            user.set_school(school);
        }

        match &self.school_classes {
            Some(classes) => user.set_school_classes(classes.clone()),
            None if replace => user.set_school_classes(BTreeMap::new()),
            None => {}
        }
        match &self.workgroups {
            Some(workgroups) => user.set_workgroups(workgroups.clone()),
            None if replace => user.set_workgroups(BTreeMap::new()),
            None => {}
        }
        match &self.ucsschool_roles {
            Some(roles) => user.set_role_strings(roles.clone()),
            None if replace => user.set_role_strings(Vec::new()),
            None => {}
        }
        match &self.udm_properties {
            Some(properties) => *user.udm_properties_mut() = properties.clone(),
            None if replace => user.udm_properties_mut().clear(),
            None => {}
        }
    }

    /// Representation of a stored user.
    pub fn from_user(user: &User, context: &RequestContext) -> Self {
        let name = user.name().unwrap_or_default();
        let attributes = user.attributes();
        let text = |attribute: &str| attributes.get_str(attribute).map(str::to_string);
        Self {
            dn: user.state().old_dn.clone(),
            url: Some(context.url(&["users", name])),
            name: Some(name.to_string()),
            school: user.school().map(|s| context.url(&["schools", s])),
            schools: Some(
                user.schools()
                    .iter()
                    .map(|s| context.url(&["schools", s.as_str()]))
                    .collect(),
            ),
            firstname: text("firstname"),
            lastname: text("lastname"),
            birthday: text("birthday"),
            expiration_date: text("expiration_date"),
            disabled: Some(attributes.get_bool("disabled").unwrap_or(false)),
            email: text("email"),
            password: None,
            record_uid: text("record_uid"),
            source_uid: text("source_uid"),
            roles: Some(
                user.roles()
                    .iter()
                    .map(|r| context.url(&["roles", *r]))
                    .collect(),
            ),
            school_classes: Some(user.school_classes()),
            workgroups: Some(user.workgroups()),
            ucsschool_roles: Some(user.role_strings()),
            udm_properties: Some(user.udm_properties().clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchoolPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub ucsschool_roles: Option<Vec<String>>,
}

impl SchoolPayload {
    pub fn to_school(&self) -> KelvinResult<School> {
        let name = self
            .name
            .as_deref()
            .ok_or_else(|| KelvinError::invalid_request("Field 'name' is required"))?;
        let mut school = School::new(name);
        self.apply(&mut school, true);
        Ok(school)
    }

    pub fn apply(&self, school: &mut School, replace: bool) {
        match &self.display_name {
            Some(display_name) => school.attributes_mut().set_str("display_name", display_name.clone()),
            None if replace => {
                school.attributes_mut().remove("display_name");
            }
            None => {}
        }
        if let Some(roles) = &self.ucsschool_roles {
            school.attributes_mut().set_list("ucsschool_roles", roles.clone());
        }
    }

    pub fn from_school(school: &School, context: &RequestContext) -> Self {
        let name = school.name().unwrap_or_default();
        Self {
            dn: school.state().old_dn.clone(),
            url: Some(context.url(&["schools", name])),
            name: Some(name.to_string()),
            display_name: school.display_name().map(str::to_string),
            ucsschool_roles: Some(school.role_strings()),
        }
    }
}

/// A school class or workgroup; `name` is relative to the school.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub name: Option<String>,
    pub school: Option<String>,
    pub description: Option<String>,
    /// User URLs or usernames.
    pub users: Option<Vec<String>>,
    pub ucsschool_roles: Option<Vec<String>>,
}

impl GroupPayload {
    pub fn school_name(&self) -> Option<&str> {
        self.school.as_deref().map(url_tail)
    }

    /// Usernames of the listed members.
    pub fn usernames(&self) -> Option<Vec<String>> {
        self.users
            .as_ref()
            .map(|users| users.iter().map(|u| url_tail(u).to_string()).collect())
    }

    /// Copy name, description and role strings onto `group`; members are
    /// resolved by the caller.
    pub fn apply(&self, group: &mut SchoolGroup, replace: bool) {
        if let Some(name) = &self.name {
            group.set_name(name);
        }
        match &self.description {
            Some(description) => group.set_description(description.clone()),
            None if replace => {
                group.attributes_mut().remove("description");
            }
            None => {}
        }
        if let Some(roles) = &self.ucsschool_roles {
            group.attributes_mut().set_list("ucsschool_roles", roles.clone());
        }
    }

    pub fn from_group(group: &SchoolGroup, collection: &str, context: &RequestContext) -> Self {
        let school = group.school().unwrap_or_default();
        let name = group.relative_name().unwrap_or_default();
        Self {
            dn: group.state().old_dn.clone(),
            url: Some(context.url(&[collection, school, name])),
            name: Some(name.to_string()),
            school: Some(context.url(&["schools", school])),
            description: group.description().map(str::to_string),
            users: Some(
                group
                    .users()
                    .iter()
                    .filter_map(|member| dn::rdn_value(member))
                    .map(|username| context.url(&["users", username.as_str()]))
                    .collect(),
            ),
            ucsschool_roles: Some(group.role_strings()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolePayload {
    pub name: String,
    pub display_name: String,
    pub url: String,
}

impl RolePayload {
    pub fn all(context: &RequestContext) -> Vec<Self> {
        PUBLIC_ROLES
            .iter()
            .map(|(name, display_name)| Self {
                name: name.to_string(),
                display_name: display_name.to_string(),
                url: context.url(&["roles", *name]),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> RequestContext {
        RequestContext::new("r".to_string(), "https://h/v1")
    }

    #[test]
    fn test_user_payload_resolves_urls() {
        let payload: UserPayload = serde_json::from_value(json!({
            "name": "alice",
            "school": "https://h/v1/schools/OU1",
            "schools": ["https://h/v1/schools/OU1", "OU2"],
            "firstname": "Alice",
            "lastname": "Smith",
            "roles": ["https://h/v1/roles/student"],
            "school_classes": {"OU1": ["1a"]},
        }))
        .unwrap();
        let user = payload.to_user().unwrap();
        assert_eq!(user.role(), UserRole::Student);
        assert_eq!(user.school(), Some("OU1"));
        assert_eq!(user.schools(), vec!["OU1".to_string(), "OU2".to_string()]);
        assert_eq!(user.school_classes()["OU1"], vec!["1a".to_string()]);
    }

    #[test]
    fn test_unknown_roles_are_a_payload_error() {
        let payload = UserPayload {
            roles: Some(vec!["student".to_string(), "teacher".to_string()]),
            ..UserPayload::default()
        };
        assert!(matches!(payload.role(), Err(KelvinError::InvalidRequest { .. })));
        let payload = UserPayload {
            roles: Some(vec!["exam_user".to_string()]),
            ..UserPayload::default()
        };
        assert!(payload.role().is_err());
    }

    #[test]
    fn test_patch_keeps_absent_fields() {
        let mut user = User::new(UserRole::Teacher, "tom", "OU1").with_names("Tom", "T");
        let patch = UserPayload {
            lastname: Some("Tailor".to_string()),
            ..UserPayload::default()
        };
        patch.apply(&mut user, false);
        assert_eq!(user.firstname(), Some("Tom"));
        assert_eq!(user.lastname(), Some("Tailor"));

        patch.apply(&mut user, true);
        assert_eq!(user.firstname(), None);
    }

    #[test]
    fn test_user_representation() {
        let mut user = User::new(UserRole::Student, "alice", "OU1").with_names("Alice", "Smith");
        user.set_password("secret");
        let body = serde_json::to_value(UserPayload::from_user(&user, &context())).unwrap();
        assert_eq!(body["url"], "https://h/v1/users/alice");
        assert_eq!(body["roles"], json!(["https://h/v1/roles/student"]));
        assert!(body.get("password").is_none());
    }
}
