//! Resource handler tests: payloads in, status codes and bodies out.

mod common;

use common::setup;
use kelvin_school::directory::InMemoryDirectory;
use kelvin_school::resource::{
    KelvinHandler, ResourceKind, ResourceOperation, ResourceQuery, ResourceRequest,
};
use serde_json::{Value, json};

async fn handler() -> KelvinHandler<InMemoryDirectory> {
    KelvinHandler::new(setup().await)
}

fn alice() -> Value {
    json!({
        "name": "alice",
        "school": "https://localhost/ucsschool/kelvin/v1/schools/OU1",
        "firstname": "Alice",
        "lastname": "Smith",
        "password": "s3cr3t-pass",
        "roles": ["https://localhost/ucsschool/kelvin/v1/roles/student"],
        "school_classes": {"OU1": ["1a"]},
        "ucsschool_roles": ["custom:foo:bar"],
    })
}

fn request(operation: ResourceOperation, resource: ResourceKind) -> ResourceRequest {
    ResourceRequest::new(operation, resource)
}

#[tokio::test]
async fn test_user_crud() {
    let handler = handler().await;

    let created = handler
        .handle(request(ResourceOperation::Create, ResourceKind::Users).with_data(alice()))
        .await;
    assert_eq!(created.status, 201, "{}", created.body);
    assert_eq!(
        created.body["url"],
        "https://localhost/ucsschool/kelvin/v1/users/alice"
    );
    assert_eq!(created.body["school_classes"], json!({"OU1": ["1a"]}));
    assert!(created.body.get("password").is_none());

    let duplicate = handler
        .handle(request(ResourceOperation::Create, ResourceKind::Users).with_data(alice()))
        .await;
    assert_eq!(duplicate.status, 409);

    let fetched = handler
        .handle(request(ResourceOperation::Get, ResourceKind::Users).with_id("alice"))
        .await;
    assert_eq!(fetched.status, 200);
    assert_eq!(fetched.body["firstname"], "Alice");

    let patched = handler
        .handle(
            request(ResourceOperation::Patch, ResourceKind::Users)
                .with_id("alice")
                .with_data(json!({"lastname": "Jones"})),
        )
        .await;
    assert_eq!(patched.status, 200, "{}", patched.body);
    assert_eq!(patched.body["lastname"], "Jones");
    assert_eq!(patched.body["firstname"], "Alice");

    let deleted = handler
        .handle(request(ResourceOperation::Delete, ResourceKind::Users).with_id("alice"))
        .await;
    assert_eq!(deleted.status, 204);
    assert_eq!(deleted.body, Value::Null);

    let missing = handler
        .handle(request(ResourceOperation::Get, ResourceKind::Users).with_id("alice"))
        .await;
    assert_eq!(missing.status, 404);
    assert_eq!(missing.body["request_id"], missing.request_id.as_str());
}

#[tokio::test]
async fn test_invalid_payloads() {
    let handler = handler().await;

    let mut unknown_school = alice();
    unknown_school["school"] = json!("OU9");
    let response = handler
        .handle(request(ResourceOperation::Create, ResourceKind::Users).with_data(unknown_school))
        .await;
    assert_eq!(response.status, 400);
    assert!(response.body["errors"]["school"].is_array());

    let mut exam_user = alice();
    exam_user["roles"] = json!(["exam_user"]);
    let response = handler
        .handle(request(ResourceOperation::Create, ResourceKind::Users).with_data(exam_user))
        .await;
    assert_eq!(response.status, 422);

    let response = handler
        .handle(
            request(ResourceOperation::Create, ResourceKind::Users)
                .with_data(json!({"name": ["not", "a", "string"]})),
        )
        .await;
    assert_eq!(response.status, 422);

    let response = handler
        .handle(request(ResourceOperation::Create, ResourceKind::Users))
        .await;
    assert_eq!(response.status, 422);
}

#[tokio::test]
async fn test_role_change_through_put() {
    let handler = handler().await;
    handler
        .handle(request(ResourceOperation::Create, ResourceKind::Users).with_data(alice()))
        .await;

    let mut staff = alice();
    staff["roles"] = json!(["staff"]);
    staff["school_classes"] = json!({});
    let response = handler
        .handle(
            request(ResourceOperation::Replace, ResourceKind::Users)
                .with_id("alice")
                .with_data(staff),
        )
        .await;
    assert_eq!(response.status, 200, "{}", response.body);
    assert_eq!(
        response.body["roles"],
        json!(["https://localhost/ucsschool/kelvin/v1/roles/staff"])
    );
    let roles = response.body["ucsschool_roles"].as_array().unwrap();
    assert!(roles.contains(&json!("custom:foo:bar")));
    assert!(roles.contains(&json!("staff:school:OU1")));
    assert!(!roles.contains(&json!("student:school:OU1")));
    assert!(
        response.body["dn"]
            .as_str()
            .unwrap()
            .contains("cn=mitarbeiter")
    );
}

#[tokio::test]
async fn test_rejected_role_change_keeps_the_user() {
    let handler = handler().await;
    handler
        .handle(request(ResourceOperation::Create, ResourceKind::Users).with_data(alice()))
        .await;

    let mut staff = alice();
    staff["roles"] = json!(["staff"]);
    staff["school_classes"] = json!({});
    staff["school"] = json!("NOPE");
    let response = handler
        .handle(
            request(ResourceOperation::Replace, ResourceKind::Users)
                .with_id("alice")
                .with_data(staff),
        )
        .await;
    assert_eq!(response.status, 400, "{}", response.body);
    assert!(response.body["errors"]["school"].is_array());

    let fetched = handler
        .handle(request(ResourceOperation::Get, ResourceKind::Users).with_id("alice"))
        .await;
    assert_eq!(fetched.status, 200);
    assert_eq!(
        fetched.body["roles"],
        json!(["https://localhost/ucsschool/kelvin/v1/roles/student"])
    );
    assert!(fetched.body["dn"].as_str().unwrap().contains("cn=schueler"));
    assert_eq!(fetched.body["school_classes"], json!({"OU1": ["1a"]}));
    let roles = fetched.body["ucsschool_roles"].as_array().unwrap();
    assert!(roles.contains(&json!("student:school:OU1")));
    assert!(!roles.contains(&json!("staff:school:OU1")));
}

#[tokio::test]
async fn test_list_users_with_filters() {
    let handler = handler().await;
    handler
        .handle(request(ResourceOperation::Create, ResourceKind::Users).with_data(alice()))
        .await;
    let mut tom = alice();
    tom["name"] = json!("tom");
    tom["roles"] = json!(["teacher"]);
    tom["ucsschool_roles"] = json!([]);
    let created = handler
        .handle(request(ResourceOperation::Create, ResourceKind::Users).with_data(tom))
        .await;
    assert_eq!(created.status, 201, "{}", created.body);

    let all = handler
        .handle(request(ResourceOperation::List, ResourceKind::Users).with_school("OU1"))
        .await;
    assert_eq!(all.body.as_array().unwrap().len(), 2);

    let teachers = handler
        .handle(request(ResourceOperation::List, ResourceKind::Users).with_query(ResourceQuery {
            role: Some("teacher".to_string()),
            ..ResourceQuery::default()
        }))
        .await;
    let teachers = teachers.body.as_array().unwrap();
    assert_eq!(teachers.len(), 1);
    assert_eq!(teachers[0]["name"], "tom");

    let by_name = handler
        .handle(request(ResourceOperation::List, ResourceKind::Users).with_query(ResourceQuery {
            name: Some("al*".to_string()),
            ..ResourceQuery::default()
        }))
        .await;
    assert_eq!(by_name.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_schools() {
    let handler = handler().await;

    let created = handler
        .handle(
            request(ResourceOperation::Create, ResourceKind::Schools)
                .with_data(json!({"name": "OU4", "display_name": "Fourth"})),
        )
        .await;
    assert_eq!(created.status, 201, "{}", created.body);
    assert_eq!(created.body["display_name"], "Fourth");

    let listed = handler
        .handle(request(ResourceOperation::List, ResourceKind::Schools))
        .await;
    assert_eq!(listed.body.as_array().unwrap().len(), 4);

    let renamed = handler
        .handle(
            request(ResourceOperation::Patch, ResourceKind::Schools)
                .with_id("OU4")
                .with_data(json!({"name": "OU5"})),
        )
        .await;
    assert_eq!(renamed.status, 400);

    let patched = handler
        .handle(
            request(ResourceOperation::Patch, ResourceKind::Schools)
                .with_id("OU4")
                .with_data(json!({"display_name": "Fourth school"})),
        )
        .await;
    assert_eq!(patched.status, 200, "{}", patched.body);
    assert_eq!(patched.body["display_name"], "Fourth school");

    let missing = handler
        .handle(request(ResourceOperation::Get, ResourceKind::Schools).with_id("OU9"))
        .await;
    assert_eq!(missing.status, 404);
}

#[tokio::test]
async fn test_classes_and_members() {
    let handler = handler().await;
    handler
        .handle(request(ResourceOperation::Create, ResourceKind::Users).with_data(alice()))
        .await;

    let created = handler
        .handle(
            request(ResourceOperation::Create, ResourceKind::Classes).with_data(json!({
                "name": "2b",
                "school": "https://localhost/ucsschool/kelvin/v1/schools/OU1",
                "description": "Second grade",
                "users": ["https://localhost/ucsschool/kelvin/v1/users/alice"],
            })),
        )
        .await;
    assert_eq!(created.status, 201, "{}", created.body);
    assert_eq!(created.body["name"], "2b");
    assert_eq!(
        created.body["users"],
        json!(["https://localhost/ucsschool/kelvin/v1/users/alice"])
    );

    let user = handler
        .handle(request(ResourceOperation::Get, ResourceKind::Users).with_id("alice"))
        .await;
    assert_eq!(user.body["school_classes"], json!({"OU1": ["1a", "2b"]}));

    let unknown_member = handler
        .handle(
            request(ResourceOperation::Patch, ResourceKind::Classes)
                .with_school("OU1")
                .with_id("2b")
                .with_data(json!({"users": ["nobody"]})),
        )
        .await;
    assert_eq!(unknown_member.status, 400);

    let listed = handler
        .handle(request(ResourceOperation::List, ResourceKind::Classes).with_school("OU1"))
        .await;
    assert_eq!(listed.body.as_array().unwrap().len(), 2);

    let workgroups = handler
        .handle(request(ResourceOperation::List, ResourceKind::Workgroups).with_school("OU1"))
        .await;
    assert_eq!(workgroups.status, 200);
    assert!(workgroups.body.as_array().unwrap().is_empty());

    let deleted = handler
        .handle(
            request(ResourceOperation::Delete, ResourceKind::Classes)
                .with_school("OU1")
                .with_id("2b"),
        )
        .await;
    assert_eq!(deleted.status, 204);
}

#[tokio::test]
async fn test_roles_are_read_only() {
    let handler = handler().await;

    let listed = handler
        .handle(request(ResourceOperation::List, ResourceKind::Roles))
        .await;
    assert_eq!(listed.status, 200);
    assert_eq!(listed.body.as_array().unwrap().len(), 4);

    let staff = handler
        .handle(request(ResourceOperation::Get, ResourceKind::Roles).with_id("staff"))
        .await;
    assert_eq!(staff.body["url"], "https://localhost/ucsschool/kelvin/v1/roles/staff");

    let exam = handler
        .handle(request(ResourceOperation::Get, ResourceKind::Roles).with_id("exam_user"))
        .await;
    assert_eq!(exam.status, 404);

    let create = handler
        .handle(
            request(ResourceOperation::Create, ResourceKind::Roles).with_data(json!({"name": "x"})),
        )
        .await;
    assert_eq!(create.status, 405);
}
