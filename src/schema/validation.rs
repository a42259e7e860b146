//! Syntax checks and whole-model attribute validation.

use super::attributes::Attributes;
use super::types::{AttributeDescriptor, Syntax};
use crate::error::{ValidationError, ValidationResult};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeSet;

/// Validate every descriptor and collect all problems.
///
/// Returns `Err` carrying the complete attribute → messages map if any
/// attribute is invalid.
pub fn validate_attributes(
    descriptors: &[AttributeDescriptor],
    attributes: &Attributes,
) -> ValidationResult<()> {
    let mut errors = ValidationError::default();
    for descriptor in descriptors {
        if let Err(messages) = descriptor.validate(attributes.get(descriptor.name)) {
            for message in messages {
                errors.add(descriptor.name, message);
            }
        }
    }
    errors.into_result()
}

/// Check a non-empty value against a syntax.
pub fn check_syntax(syntax: Syntax, value: &Value) -> Vec<String> {
    match syntax {
        Syntax::Text => expect_string(value).err().into_iter().collect(),
        Syntax::UserName => with_string(value, check_username),
        Syntax::SchoolName => with_string(value, check_school_name),
        Syntax::GroupName => with_string(value, check_group_name),
        Syntax::Email => with_string(value, check_email),
        Syntax::Date => with_string(value, check_date),
        Syntax::Boolean => {
            if value.is_boolean() {
                Vec::new()
            } else {
                vec!["Must be true or false.".to_string()]
            }
        }
        Syntax::StringList => with_string_list(value, |_| None),
        Syntax::DnList => with_string_list(value, |item| {
            if item.contains('=') {
                None
            } else {
                Some(format!("{:?} is not a distinguished name.", item))
            }
        }),
        Syntax::RoleStrings => check_role_strings(value),
        Syntax::SchoolMembership => check_school_membership(value),
    }
}

fn expect_string(value: &Value) -> Result<&str, String> {
    value
        .as_str()
        .ok_or_else(|| "Must be a string.".to_string())
}

fn with_string(value: &Value, check: impl Fn(&str) -> Option<String>) -> Vec<String> {
    match expect_string(value) {
        Ok(s) => check(s).into_iter().collect(),
        Err(message) => vec![message],
    }
}

fn with_string_list(value: &Value, check: impl Fn(&str) -> Option<String>) -> Vec<String> {
    let Some(items) = value.as_array() else {
        return vec!["Must be a list.".to_string()];
    };
    let mut problems = Vec::new();
    for item in items {
        match item.as_str() {
            Some(s) => problems.extend(check(s)),
            None => problems.push(format!("{} is not a string.", item)),
        }
    }
    problems
}

fn check_username(name: &str) -> Option<String> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    let valid_ends = name.starts_with(|c: char| c.is_ascii_alphanumeric())
        && name.ends_with(|c: char| c.is_ascii_alphanumeric());
    if valid_chars && valid_ends {
        None
    } else {
        Some(format!(
            "Username {:?} may only contain letters, digits, '.', '-' and '_' and must begin and end with a letter or digit.",
            name
        ))
    }
}

fn check_school_name(name: &str) -> Option<String> {
    let valid_chars = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid_chars && !name.starts_with('_') && !name.ends_with('_') {
        None
    } else {
        Some(format!(
            "School name {:?} may only contain letters, digits and inner underscores.",
            name
        ))
    }
}

fn check_group_name(name: &str) -> Option<String> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '.' | '-' | '_'));
    if valid_chars && !name.starts_with(' ') && !name.ends_with(' ') {
        None
    } else {
        Some(format!("Invalid group name {:?}.", name))
    }
}

fn check_email(address: &str) -> Option<String> {
    let invalid = || Some(format!("{:?} is not a valid email address.", address));
    if address.chars().any(char::is_whitespace) {
        return invalid();
    }
    let Some((local, domain)) = address.split_once('@') else {
        return invalid();
    };
    let domain_ok = domain.contains('.')
        && !domain.contains('@')
        && domain.split('.').all(|label| !label.is_empty());
    if local.is_empty() || !domain_ok {
        return invalid();
    }
    None
}

fn check_date(date: &str) -> Option<String> {
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(_) => None,
        Err(_) => Some(format!("{:?} is not a date in the format YYYY-MM-DD.", date)),
    }
}

fn check_role_strings(value: &Value) -> Vec<String> {
    let mut problems = with_string_list(value, |item| {
        let parts: Vec<&str> = item.split(':').collect();
        if parts.len() == 3 && parts.iter().all(|p| !p.is_empty()) {
            None
        } else {
            Some(format!(
                "{:?} is not a role string of the form role:context_type:context.",
                item
            ))
        }
    });
    if let Some(items) = value.as_array() {
        let mut seen = BTreeSet::new();
        for item in items.iter().filter_map(Value::as_str) {
            if !seen.insert(item.to_lowercase()) {
                problems.push(format!("Role string {:?} is listed more than once.", item));
            }
        }
    }
    problems
}

fn check_school_membership(value: &Value) -> Vec<String> {
    let Some(map) = value.as_object() else {
        return vec!["Must be a mapping of school to group names.".to_string()];
    };
    let mut problems = Vec::new();
    for (school, groups) in map {
        if let Some(problem) = check_school_name(school) {
            problems.push(problem);
        }
        problems.extend(with_string_list(groups, check_group_name));
    }
    problems
}
