//! User roles, capability flags and role strings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub const ROLE_STUDENT: &str = "student";
pub const ROLE_TEACHER: &str = "teacher";
pub const ROLE_STAFF: &str = "staff";
pub const ROLE_SCHOOL_ADMIN: &str = "school_admin";
pub const ROLE_EXAM_USER: &str = "exam_user";

pub const OPTION_STUDENT: &str = "ucsschoolStudent";
pub const OPTION_TEACHER: &str = "ucsschoolTeacher";
pub const OPTION_STAFF: &str = "ucsschoolStaff";
pub const OPTION_ADMINISTRATOR: &str = "ucsschoolAdministrator";
pub const OPTION_EXAM: &str = "ucsschoolExam";

/// Every capability flag that selects a user role.
pub const ROLE_OPTIONS: [&str; 5] = [
    OPTION_ADMINISTRATOR,
    OPTION_EXAM,
    OPTION_STAFF,
    OPTION_STUDENT,
    OPTION_TEACHER,
];

/// Context type of role strings scoped to a school.
pub const CONTEXT_SCHOOL: &str = "school";

/// The closed set of user models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UserRole {
    Student,
    Teacher,
    Staff,
    TeachersAndStaff,
    SchoolAdmin,
    ExamStudent,
}

/// Groups granted to every member of a role in a school.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RoleGroup {
    Students,
    Teachers,
    Staff,
    Admins,
}

impl UserRole {
    pub const ALL: [UserRole; 6] = [
        UserRole::Student,
        UserRole::Teacher,
        UserRole::Staff,
        UserRole::TeachersAndStaff,
        UserRole::SchoolAdmin,
        UserRole::ExamStudent,
    ];

    /// Canonical role tokens.
    pub fn roles(self) -> &'static [&'static str] {
        match self {
            UserRole::Student => &[ROLE_STUDENT],
            UserRole::Teacher => &[ROLE_TEACHER],
            UserRole::Staff => &[ROLE_STAFF],
            UserRole::TeachersAndStaff => &[ROLE_TEACHER, ROLE_STAFF],
            UserRole::SchoolAdmin => &[ROLE_SCHOOL_ADMIN],
            UserRole::ExamStudent => &[ROLE_EXAM_USER],
        }
    }

    /// Capability flags set on the directory object.
    pub fn default_options(self) -> &'static [&'static str] {
        match self {
            UserRole::Student => &[OPTION_STUDENT],
            UserRole::Teacher => &[OPTION_TEACHER],
            UserRole::Staff => &[OPTION_STAFF],
            UserRole::TeachersAndStaff => &[OPTION_STAFF, OPTION_TEACHER],
            UserRole::SchoolAdmin => &[OPTION_ADMINISTRATOR],
            UserRole::ExamStudent => &[OPTION_EXAM],
        }
    }

    /// Role strings granted in `school`.
    pub fn default_role_strings(self, school: &str) -> Vec<RoleString> {
        self.roles()
            .iter()
            .map(|role| RoleString::school(*role, school))
            .collect()
    }

    pub fn role_groups(self) -> &'static [RoleGroup] {
        match self {
            UserRole::Student => &[RoleGroup::Students],
            UserRole::Teacher => &[RoleGroup::Teachers],
            UserRole::Staff => &[RoleGroup::Staff],
            UserRole::TeachersAndStaff => &[RoleGroup::Teachers, RoleGroup::Staff],
            UserRole::SchoolAdmin => &[RoleGroup::Admins],
            UserRole::ExamStudent => &[],
        }
    }

    /// School-scoped role tokens dropped when converting away from this role.
    pub fn removal_roles(self) -> &'static [&'static str] {
        match self {
            UserRole::Student => &[ROLE_STUDENT],
            UserRole::Teacher => &[ROLE_TEACHER],
            UserRole::Staff => &[ROLE_STAFF],
            UserRole::TeachersAndStaff => &[ROLE_TEACHER, ROLE_STAFF],
            UserRole::SchoolAdmin => &[ROLE_SCHOOL_ADMIN],
            UserRole::ExamStudent => &[ROLE_EXAM_USER, ROLE_STUDENT],
        }
    }

    /// Whether users of this role can be members of school classes.
    pub fn can_hold_classes(self) -> bool {
        !matches!(self, UserRole::Staff | UserRole::SchoolAdmin)
    }

    pub fn is_student(self) -> bool {
        matches!(self, UserRole::Student | UserRole::ExamStudent)
    }

    /// Determine the role from a directory object's options.
    ///
    /// Only the role-selecting flags are considered; any combination other
    /// than the known ones yields `None`.
    pub fn from_options<'a>(options: impl IntoIterator<Item = &'a String>) -> Option<Self> {
        let flags: BTreeSet<&str> = options
            .into_iter()
            .map(String::as_str)
            .filter(|o| ROLE_OPTIONS.contains(o))
            .collect();
        let flags: Vec<&str> = flags.into_iter().collect();
        match flags.as_slice() {
            [OPTION_STUDENT] => Some(UserRole::Student),
            [OPTION_TEACHER] => Some(UserRole::Teacher),
            [OPTION_STAFF] => Some(UserRole::Staff),
            [OPTION_STAFF, OPTION_TEACHER] => Some(UserRole::TeachersAndStaff),
            [OPTION_ADMINISTRATOR] => Some(UserRole::SchoolAdmin),
            [OPTION_EXAM] => Some(UserRole::ExamStudent),
            _ => None,
        }
    }

    /// Determine the role from a set of role tokens such as `["teacher", "staff"]`.
    pub fn from_role_tokens<S: AsRef<str>>(tokens: &[S]) -> Option<Self> {
        let tokens: BTreeSet<&str> = tokens.iter().map(AsRef::as_ref).collect();
        Self::ALL
            .into_iter()
            .find(|role| role.roles().iter().copied().collect::<BTreeSet<_>>() == tokens)
    }

    /// Whether both roles grant the same set of role tokens.
    pub fn same_roles(self, other: UserRole) -> bool {
        let mine: BTreeSet<&str> = self.roles().iter().copied().collect();
        let theirs: BTreeSet<&str> = other.roles().iter().copied().collect();
        mine == theirs
    }

    /// Model name used in messages and hook registrations.
    pub fn model_name(self) -> &'static str {
        match self {
            UserRole::Student => "Student",
            UserRole::Teacher => "Teacher",
            UserRole::Staff => "Staff",
            UserRole::TeachersAndStaff => "TeachersAndStaff",
            UserRole::SchoolAdmin => "SchoolAdmin",
            UserRole::ExamStudent => "ExamStudent",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.model_name())
    }
}

/// A `role:context_type:context` grant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoleString {
    pub role: String,
    pub context_type: String,
    pub context: String,
}

impl RoleString {
    pub fn new(
        role: impl Into<String>,
        context_type: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            context_type: context_type.into(),
            context: context.into(),
        }
    }

    /// A role string scoped to a school.
    pub fn school(role: impl Into<String>, school: impl Into<String>) -> Self {
        Self::new(role, CONTEXT_SCHOOL, school)
    }

    pub fn is_school_context(&self) -> bool {
        self.context_type == CONTEXT_SCHOOL
    }

    /// Case-insensitive comparison of the whole tuple.
    pub fn matches(&self, other: &RoleString) -> bool {
        self.role.eq_ignore_ascii_case(&other.role)
            && self.context_type.eq_ignore_ascii_case(&other.context_type)
            && self.context.eq_ignore_ascii_case(&other.context)
    }
}

impl fmt::Display for RoleString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.role, self.context_type, self.context)
    }
}

/// Error returned for malformed role strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid role string {0:?}")]
pub struct RoleStringParseError(pub String);

impl FromStr for RoleString {
    type Err = RoleStringParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(role), Some(context_type), Some(context))
                if !role.is_empty() && !context_type.is_empty() && !context.is_empty() =>
            {
                Ok(Self::new(role, context_type, context))
            }
            _ => Err(RoleStringParseError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(flags: &[&str]) -> Vec<String> {
        flags.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_options_select_exactly_one_role() {
        assert_eq!(
            UserRole::from_options(&options(&["ucsschoolStudent", "default"])),
            Some(UserRole::Student)
        );
        assert_eq!(
            UserRole::from_options(&options(&["ucsschoolTeacher", "ucsschoolStaff"])),
            Some(UserRole::TeachersAndStaff)
        );
        assert_eq!(
            UserRole::from_options(&options(&["ucsschoolExam"])),
            Some(UserRole::ExamStudent)
        );
        assert_eq!(
            UserRole::from_options(&options(&["ucsschoolStudent", "ucsschoolTeacher"])),
            None
        );
        assert_eq!(UserRole::from_options(&options(&["default"])), None);
    }

    #[test]
    fn test_default_options_round_trip() {
        for role in UserRole::ALL {
            let flags = options(role.default_options());
            assert_eq!(UserRole::from_options(&flags), Some(role));
        }
    }

    #[test]
    fn test_role_tokens() {
        assert_eq!(
            UserRole::from_role_tokens(&["staff", "teacher"]),
            Some(UserRole::TeachersAndStaff)
        );
        assert_eq!(UserRole::from_role_tokens(&["student"]), Some(UserRole::Student));
        assert_eq!(UserRole::from_role_tokens(&["student", "teacher"]), None);
        assert!(UserRole::Teacher.same_roles(UserRole::Teacher));
        assert!(!UserRole::Teacher.same_roles(UserRole::TeachersAndStaff));
    }

    #[test]
    fn test_role_string_parsing() {
        let role: RoleString = "teacher:school:OU1".parse().unwrap();
        assert_eq!(role, RoleString::school("teacher", "OU1"));
        assert!(role.is_school_context());
        assert_eq!(role.to_string(), "teacher:school:OU1");
        assert!(role.matches(&RoleString::school("Teacher", "ou1")));

        let custom: RoleString = "custom:foo:bar:baz".parse().unwrap();
        assert_eq!(custom.context, "bar:baz");
        assert!("teacher:school".parse::<RoleString>().is_err());
        assert!("::".parse::<RoleString>().is_err());
    }
}
