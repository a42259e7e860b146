//! Placement of school objects in the directory tree.
//!
//! [`DirectoryLayout`] turns school names and roles into container DNs and
//! classifies group DNs back into the school-managed group they represent.

use super::role::{RoleGroup, UserRole};
use crate::config::{ContainerNames, KelvinConfig};
use crate::directory::dn;

/// A group DN recognised as managed by the school models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagedGroup {
    /// `cn=schueler-ou1`, `cn=lehrer-ou1`, ...
    Role { group: RoleGroup, school: String },
    /// `cn=Domain Users OU1`
    DomainUsers { school: String },
    /// A school class; `name` is the full `OU1-1a` form
    SchoolClass { school: String, name: String },
    /// A workgroup; `name` is the full `OU1-wg` form
    WorkGroup { school: String, name: String },
}

impl ManagedGroup {
    pub fn school(&self) -> &str {
        match self {
            ManagedGroup::Role { school, .. }
            | ManagedGroup::DomainUsers { school }
            | ManagedGroup::SchoolClass { school, .. }
            | ManagedGroup::WorkGroup { school, .. } => school,
        }
    }
}

/// Container naming for a given LDAP base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryLayout {
    base: String,
    names: ContainerNames,
}

impl DirectoryLayout {
    pub fn new(base: impl Into<String>, names: ContainerNames) -> Self {
        Self {
            base: base.into(),
            names,
        }
    }

    pub fn from_config(config: &KelvinConfig) -> Self {
        Self::new(config.ldap_base.clone(), config.containers.clone())
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn names(&self) -> &ContainerNames {
        &self.names
    }

    fn cn(&self, name: &str, parent: &str) -> String {
        dn::build("cn", name, parent)
    }

    pub fn school_dn(&self, school: &str) -> String {
        dn::build("ou", school, &self.base)
    }

    pub fn users_container(&self, school: &str) -> String {
        self.cn(&self.names.users, &self.school_dn(school))
    }

    /// Container holding users of `role` in `school`.
    pub fn role_container(&self, role: UserRole, school: &str) -> String {
        let name = match role {
            UserRole::Student => &self.names.students,
            UserRole::Teacher => &self.names.teachers,
            UserRole::Staff => &self.names.staff,
            UserRole::TeachersAndStaff => &self.names.teachers_and_staff,
            UserRole::SchoolAdmin => &self.names.admins,
            UserRole::ExamStudent => {
                return self.cn(&self.names.exam_users, &self.school_dn(school));
            }
        };
        self.cn(name, &self.users_container(school))
    }

    pub fn groups_container(&self, school: &str) -> String {
        self.cn(&self.names.groups, &self.school_dn(school))
    }

    /// Container of workgroups; parent of the classes container.
    pub fn student_groups_container(&self, school: &str) -> String {
        self.cn(&self.names.students, &self.groups_container(school))
    }

    pub fn classes_container(&self, school: &str) -> String {
        self.cn(&self.names.classes, &self.student_groups_container(school))
    }

    pub fn shares_container(&self, school: &str) -> String {
        self.cn(&self.names.shares, &self.school_dn(school))
    }

    pub fn class_shares_container(&self, school: &str) -> String {
        self.cn(&self.names.classes, &self.shares_container(school))
    }

    /// `cn=groups` directly below the base.
    pub fn global_groups_container(&self) -> String {
        self.cn(&self.names.groups, &self.base)
    }

    pub fn ou_admins_container(&self) -> String {
        self.cn(&self.names.ou_admins, &self.global_groups_container())
    }

    pub fn role_group_name(&self, group: RoleGroup, school: &str) -> String {
        let prefix = match group {
            RoleGroup::Students => &self.names.students,
            RoleGroup::Teachers => &self.names.teachers,
            RoleGroup::Staff => &self.names.staff,
            RoleGroup::Admins => &self.names.admins,
        };
        format!("{}-{}", prefix, school.to_lowercase())
    }

    pub fn role_group_dn(&self, group: RoleGroup, school: &str) -> String {
        let parent = match group {
            RoleGroup::Admins => self.ou_admins_container(),
            _ => self.groups_container(school),
        };
        self.cn(&self.role_group_name(group, school), &parent)
    }

    pub fn domain_users_name(&self, school: &str) -> String {
        format!("{} {}", self.names.domain_users_prefix, school)
    }

    pub fn domain_users_dn(&self, school: &str) -> String {
        self.cn(&self.domain_users_name(school), &self.groups_container(school))
    }

    pub fn class_dn(&self, school: &str, name: &str) -> String {
        self.cn(name, &self.classes_container(school))
    }

    pub fn workgroup_dn(&self, school: &str, name: &str) -> String {
        self.cn(name, &self.student_groups_container(school))
    }

    /// The school whose OU contains `object_dn`.
    pub fn school_of(&self, object_dn: &str) -> Option<String> {
        let parts = dn::explode(object_dn);
        let depth = dn::explode(&self.base).len();
        if !dn::is_below(object_dn, &self.base) || parts.len() <= depth {
            return None;
        }
        let (attribute, value) = dn::split_rdn(&parts[parts.len() - depth - 1])?;
        (attribute == "ou").then_some(value)
    }

    /// Recognise a school-managed group from its DN.
    pub fn classify_group(&self, group_dn: &str) -> Option<ManagedGroup> {
        let name = dn::rdn_value(group_dn)?;
        let parent = dn::parent(group_dn)?;

        if dn::same(&parent, &self.ou_admins_container()) {
            let prefix = format!("{}-", self.names.admins);
            let school = strip_prefix_ignore_case(&name, &prefix)?;
            return Some(ManagedGroup::Role {
                group: RoleGroup::Admins,
                school: school.to_string(),
            });
        }

        let school = self.school_of(group_dn)?;
        if dn::same(&parent, &self.classes_container(&school)) {
            return Some(ManagedGroup::SchoolClass { school, name });
        }
        if dn::same(&parent, &self.student_groups_container(&school)) {
            return Some(ManagedGroup::WorkGroup { school, name });
        }
        if dn::same(&parent, &self.groups_container(&school)) {
            if name.eq_ignore_ascii_case(&self.domain_users_name(&school)) {
                return Some(ManagedGroup::DomainUsers { school });
            }
            for group in [RoleGroup::Students, RoleGroup::Teachers, RoleGroup::Staff] {
                if name.eq_ignore_ascii_case(&self.role_group_name(group, &school)) {
                    return Some(ManagedGroup::Role { group, school });
                }
            }
        }
        None
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
        .filter(|rest| !rest.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> DirectoryLayout {
        DirectoryLayout::new("dc=example,dc=com", ContainerNames::default())
    }

    #[test]
    fn test_user_containers() {
        let layout = layout();
        assert_eq!(
            layout.role_container(UserRole::Student, "OU1"),
            "cn=schueler,cn=users,ou=OU1,dc=example,dc=com"
        );
        assert_eq!(
            layout.role_container(UserRole::TeachersAndStaff, "OU1"),
            "cn=lehrer und mitarbeiter,cn=users,ou=OU1,dc=example,dc=com"
        );
        assert_eq!(
            layout.role_container(UserRole::ExamStudent, "OU1"),
            "cn=examusers,ou=OU1,dc=example,dc=com"
        );
    }

    #[test]
    fn test_group_dns() {
        let layout = layout();
        assert_eq!(
            layout.class_dn("OU1", "OU1-1a"),
            "cn=OU1-1a,cn=klassen,cn=schueler,cn=groups,ou=OU1,dc=example,dc=com"
        );
        assert_eq!(
            layout.role_group_dn(RoleGroup::Teachers, "OU1"),
            "cn=lehrer-ou1,cn=groups,ou=OU1,dc=example,dc=com"
        );
        assert_eq!(
            layout.role_group_dn(RoleGroup::Admins, "OU1"),
            "cn=admins-ou1,cn=ouadmins,cn=groups,dc=example,dc=com"
        );
        assert_eq!(
            layout.domain_users_dn("OU1"),
            "cn=Domain Users OU1,cn=groups,ou=OU1,dc=example,dc=com"
        );
    }

    #[test]
    fn test_classify_group() {
        let layout = layout();
        assert_eq!(
            layout.classify_group(&layout.class_dn("OU1", "OU1-1a")),
            Some(ManagedGroup::SchoolClass {
                school: "OU1".to_string(),
                name: "OU1-1a".to_string()
            })
        );
        assert_eq!(
            layout.classify_group(&layout.workgroup_dn("OU2", "OU2-chess")),
            Some(ManagedGroup::WorkGroup {
                school: "OU2".to_string(),
                name: "OU2-chess".to_string()
            })
        );
        assert_eq!(
            layout.classify_group(&layout.role_group_dn(RoleGroup::Admins, "OU1")),
            Some(ManagedGroup::Role {
                group: RoleGroup::Admins,
                school: "ou1".to_string()
            })
        );
        assert_eq!(
            layout.classify_group(&layout.domain_users_dn("OU1")),
            Some(ManagedGroup::DomainUsers {
                school: "OU1".to_string()
            })
        );
        assert_eq!(
            layout.classify_group("cn=Domain Users,cn=groups,dc=example,dc=com"),
            None
        );
    }

    #[test]
    fn test_school_of() {
        let layout = layout();
        assert_eq!(
            layout.school_of("uid=a,cn=schueler,cn=users,ou=OU1,dc=example,dc=com"),
            Some("OU1".to_string())
        );
        assert_eq!(layout.school_of("ou=OU1,dc=example,dc=com"), Some("OU1".to_string()));
        assert_eq!(layout.school_of("cn=groups,dc=example,dc=com"), None);
        assert_eq!(layout.school_of("dc=example,dc=com"), None);
    }
}
