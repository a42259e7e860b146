//! Tests for descriptor tables and attribute marshaling.

use super::*;
use crate::directory::DirectoryObject;
use serde_json::json;

static FIELDS: &[AttributeDescriptor] = &[
    AttributeDescriptor::new("name", "Username", Syntax::UserName)
        .udm("username")
        .required()
        .unique(),
    AttributeDescriptor::new("firstname", "First name", Syntax::Text).required(),
    AttributeDescriptor::new("email", "Email", Syntax::Email).udm("mailPrimaryAddress"),
    AttributeDescriptor::new("birthday", "Birthday", Syntax::Date),
    AttributeDescriptor::new("disabled", "Disabled", Syntax::Boolean),
    AttributeDescriptor::new("password", "Password", Syntax::Text).hidden(),
    AttributeDescriptor::new("school_classes", "Classes", Syntax::SchoolMembership).transient(),
];

fn object() -> DirectoryObject {
    DirectoryObject::new("users/user", "cn=users,ou=OU1,dc=example,dc=com")
}

#[test]
fn test_all_errors_are_collected() {
    let mut attributes = Attributes::new();
    attributes.set("name", json!("-bad"));
    attributes.set("email", json!("nope"));
    attributes.set("birthday", json!("yesterday"));
    attributes.set("disabled", json!("no"));

    let error = validate_attributes(FIELDS, &attributes).unwrap_err();
    let fields: Vec<&str> = error.errors().keys().map(String::as_str).collect();
    assert_eq!(fields, vec!["birthday", "disabled", "email", "firstname", "name"]);
}

#[test]
fn test_optional_empty_values_pass() {
    let mut attributes = Attributes::new();
    attributes.set_str("name", "anna");
    attributes.set_str("firstname", "Anna");
    attributes.set("email", json!(""));
    attributes.set("birthday", json!(null));
    assert!(validate_attributes(FIELDS, &attributes).is_ok());
}

#[test]
fn test_write_skips_transient_and_clears_empty_values() {
    let mut attributes = Attributes::new();
    attributes.set_str("name", "anna");
    attributes.set_str("firstname", "Anna");
    attributes.set("school_classes", json!({"OU1": ["1a"]}));
    attributes.set("email", json!(""));

    let mut object = object();
    object.set("mailPrimaryAddress", json!("old@school.test"));
    write_attributes(FIELDS, &attributes, &mut object);

    assert_eq!(object.get_str("username"), Some("anna"));
    assert!(object.get("mailPrimaryAddress").is_none());
    assert!(object.get("school_classes").is_none());
    assert!(object.get("password").is_none());
}

#[test]
fn test_hidden_values_are_written_but_not_read() {
    let mut attributes = Attributes::new();
    attributes.set_str("name", "anna");
    attributes.set_str("password", "s3cr3t");

    let mut object = object();
    write_attributes(FIELDS, &attributes, &mut object);
    assert_eq!(object.get_str("password"), Some("s3cr3t"));

    let read = read_attributes(FIELDS, &object);
    assert!(read.get("password").is_none());
    assert_eq!(read.get_str("name"), Some("anna"));
}

#[test]
fn test_membership_accessors() {
    let mut attributes = Attributes::new();
    let membership = [("OU1".to_string(), vec!["1a".to_string()])].into_iter().collect();
    attributes.set_membership("school_classes", &membership);
    assert_eq!(attributes.get_membership("school_classes"), membership);
    assert!(attributes.get_membership("workgroups").is_empty());
    assert!(attributes.contains("school_classes"));
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn username() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9.]{0,10}[a-z0-9]"
    }

    proptest! {
        #[test]
        fn mapped_attributes_survive_a_round_trip(
            name in username(),
            firstname in "[A-Za-z]{1,12}",
            local in "[a-z]{1,8}",
            disabled in any::<bool>(),
            year in 1950i32..2020,
            month in 1u32..=12,
            day in 1u32..=28,
        ) {
            let mut attributes = Attributes::new();
            attributes.set_str("name", name);
            attributes.set_str("firstname", firstname);
            attributes.set_str("email", format!("{}@school.test", local));
            attributes.set_str("birthday", format!("{:04}-{:02}-{:02}", year, month, day));
            attributes.set("disabled", json!(disabled));
            prop_assert!(validate_attributes(FIELDS, &attributes).is_ok());

            let mut object = object();
            write_attributes(FIELDS, &attributes, &mut object);
            let read = read_attributes(FIELDS, &object);
            for descriptor in FIELDS.iter().filter(|d| d.map_to_udm && !d.hidden) {
                prop_assert_eq!(read.get(descriptor.name), attributes.get(descriptor.name));
            }
        }
    }
}
