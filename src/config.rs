//! Configuration for the school directory core.
//!
//! A [`KelvinConfig`] is built once at startup, usually from a JSON document,
//! and passed explicitly to every component that needs it.
//!
//! ```rust
//! use kelvin_school::config::KelvinConfig;
//!
//! let config = KelvinConfig::from_json_str(r#"{
//!     "ldap_base": "dc=school,dc=test",
//!     "import": { "scheme": { "username": { "default": "<firstname>.<lastname>" } } }
//! }"#).unwrap();
//! assert_eq!(config.ldap_base, "dc=school,dc=test");
//! assert_eq!(config.containers.students, "schueler");
//! ```

use crate::error::{KelvinError, KelvinResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KelvinConfig {
    /// LDAP base DN all school objects live below.
    pub ldap_base: String,
    /// Base URL used to build resource hyperlinks.
    pub base_url: String,
    /// Names of the well-known containers.
    pub containers: ContainerNames,
    /// Settings for user imports.
    pub import: ImportConfig,
    /// Record warnings when attributes marked as unlikely to change are modified.
    pub validate_unlikely_changes: bool,
}

impl Default for KelvinConfig {
    fn default() -> Self {
        Self {
            ldap_base: "dc=example,dc=com".to_string(),
            base_url: "https://localhost/ucsschool/kelvin/v1".to_string(),
            containers: ContainerNames::default(),
            import: ImportConfig::default(),
            validate_unlikely_changes: false,
        }
    }
}

impl KelvinConfig {
    /// Parse a configuration from JSON. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> KelvinResult<Self> {
        serde_json::from_str(json).map_err(|e| KelvinError::config(e.to_string()))
    }

    /// Read a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> KelvinResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| KelvinError::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&content)
    }

    /// Configuration with a different LDAP base.
    pub fn with_ldap_base(mut self, ldap_base: impl Into<String>) -> Self {
        self.ldap_base = ldap_base.into();
        self
    }
}

/// Names of the containers making up a school's subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerNames {
    pub users: String,
    pub groups: String,
    pub shares: String,
    pub students: String,
    pub teachers: String,
    pub staff: String,
    pub teachers_and_staff: String,
    pub admins: String,
    pub exam_users: String,
    pub classes: String,
    pub ou_admins: String,
    /// Prefix of the per-school domain users group (`Domain Users OU1`).
    pub domain_users_prefix: String,
}

impl Default for ContainerNames {
    fn default() -> Self {
        Self {
            users: "users".to_string(),
            groups: "groups".to_string(),
            shares: "shares".to_string(),
            students: "schueler".to_string(),
            teachers: "lehrer".to_string(),
            staff: "mitarbeiter".to_string(),
            teachers_and_staff: "lehrer und mitarbeiter".to_string(),
            admins: "admins".to_string(),
            exam_users: "examusers".to_string(),
            classes: "klassen".to_string(),
            ou_admins: "ouadmins".to_string(),
            domain_users_prefix: "Domain Users".to_string(),
        }
    }
}

/// A scheme template, either for every role or per role token.
///
/// Per-role maps fall back to their `default` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemeEntry {
    Single(String),
    PerRole(BTreeMap<String, String>),
}

impl SchemeEntry {
    /// The template to use for a user with the given role tokens.
    pub fn for_roles(&self, roles: &[&str]) -> Option<&str> {
        match self {
            SchemeEntry::Single(template) => Some(template),
            SchemeEntry::PerRole(templates) => roles
                .iter()
                .find_map(|role| templates.get(*role))
                .or_else(|| templates.get("default"))
                .map(String::as_str),
        }
    }
}

/// Settings for user imports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Attribute name → scheme template.
    pub scheme: BTreeMap<String, SchemeEntry>,
    /// Maximum username length per role token; `default` applies to the rest.
    pub username_max_length: BTreeMap<String, usize>,
    /// Source UID assigned when the input does not carry one.
    pub source_uid: Option<String>,
    /// Mail domain available to schemes as `<maildomain>`.
    pub maildomain: Option<String>,
    /// Attributes every imported user must have after scheme evaluation.
    pub mandatory_attributes: Vec<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        let mut scheme = BTreeMap::new();
        scheme.insert(
            "username".to_string(),
            SchemeEntry::PerRole(BTreeMap::from([(
                "default".to_string(),
                "<:umlauts><firstname>[0].<lastname>[COUNTER2]".to_string(),
            )])),
        );
        scheme.insert(
            "record_uid".to_string(),
            SchemeEntry::Single("<firstname>.<lastname>".to_string()),
        );
        Self {
            scheme,
            username_max_length: BTreeMap::from([
                ("default".to_string(), 20),
                ("student".to_string(), 15),
            ]),
            source_uid: None,
            maildomain: None,
            mandatory_attributes: vec![
                "firstname".to_string(),
                "lastname".to_string(),
                "name".to_string(),
                "school".to_string(),
                "record_uid".to_string(),
                "source_uid".to_string(),
            ],
        }
    }
}

impl ImportConfig {
    /// Scheme template for `attribute`, chosen by the user's role tokens.
    pub fn scheme_for(&self, attribute: &str, roles: &[&str]) -> Option<&str> {
        self.scheme.get(attribute)?.for_roles(roles)
    }

    /// The strictest username length limit among the role tokens.
    pub fn max_username_length(&self, roles: &[&str]) -> usize {
        let default = self.username_max_length.get("default").copied().unwrap_or(20);
        roles
            .iter()
            .filter_map(|role| self.username_max_length.get(*role).copied())
            .min()
            .unwrap_or(default)
    }
}
