//! Attribute descriptor definitions.
//!
//! Every school model declares a static table of [`AttributeDescriptor`]s.
//! The table drives validation, marshaling to directory objects and reading
//! values back.

use serde::Serialize;
use serde_json::Value;

/// Value syntax checked by an attribute's validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Syntax {
    /// Any string
    Text,
    /// Login name: letters, digits, `.`, `-` and `_`, starting and ending
    /// with a letter or digit
    UserName,
    /// OU name: letters, digits and inner `_`
    SchoolName,
    /// Group name: letters, digits, space, `.`, `-` and `_`
    GroupName,
    /// `local@domain.tld`
    Email,
    /// ISO date `YYYY-MM-DD`
    Date,
    /// JSON boolean
    Boolean,
    /// List of strings
    StringList,
    /// List of distinguished names
    DnList,
    /// List of `role:context_type:context` strings, unique per tuple
    RoleStrings,
    /// Map of school name to a list of group names
    SchoolMembership,
}

/// Declarative metadata for one attribute of a school model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttributeDescriptor {
    /// Field name in the model
    pub name: &'static str,
    /// Human readable label
    pub label: &'static str,
    /// Property name on the directory object
    pub udm_name: &'static str,
    /// Value syntax
    pub syntax: Syntax,
    /// Whether an empty value is rejected
    pub required: bool,
    /// Whether the value must be unique directory-wide
    pub unique: bool,
    /// Write-only; never read back from the directory
    pub hidden: bool,
    /// Changes are reported as warnings
    pub unlikely_to_change: bool,
    /// Whether the value is written to the directory object at all
    pub map_to_udm: bool,
}

impl AttributeDescriptor {
    /// A mapped, optional attribute whose directory property has the same name.
    pub const fn new(name: &'static str, label: &'static str, syntax: Syntax) -> Self {
        Self {
            name,
            label,
            udm_name: name,
            syntax,
            required: false,
            unique: false,
            hidden: false,
            unlikely_to_change: false,
            map_to_udm: true,
        }
    }

    pub const fn udm(mut self, udm_name: &'static str) -> Self {
        self.udm_name = udm_name;
        self
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub const fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub const fn unlikely_to_change(mut self) -> Self {
        self.unlikely_to_change = true;
        self
    }

    /// Keep the attribute in the model only.
    pub const fn transient(mut self) -> Self {
        self.map_to_udm = false;
        self
    }

    /// Validate a value, returning every problem found.
    pub fn validate(&self, value: Option<&Value>) -> Result<(), Vec<String>> {
        let value = match value {
            Some(value) if !is_empty(value) => value,
            _ if self.required => return Err(vec![format!("{} is required.", self.label)]),
            _ => return Ok(()),
        };
        let problems = super::validation::check_syntax(self.syntax, value);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

/// Whether a value counts as empty: null, `""`, `[]` or `{}`.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Find a descriptor by field name.
pub fn find<'a>(
    descriptors: &'a [AttributeDescriptor],
    name: &str,
) -> Option<&'a AttributeDescriptor> {
    descriptors.iter().find(|d| d.name == name)
}
