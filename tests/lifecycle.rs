//! Lifecycle tests: create, modify, move and remove against the in-memory
//! directory.

mod common;

use common::{create_class, create_user, membership, setup, setup_with, user};
use kelvin_school::directory::{DirectoryClient, dn};
use kelvin_school::model::{
    CreateOptions, GroupKind, HookContext, HookError, HookPhase, HookTarget, LifecycleHook,
    ModifyOptions, School, SchoolGroup, SchoolModel, User, UserRole,
};
use kelvin_school::{Filter, KelvinConfig, KelvinError};
use std::sync::Arc;

#[tokio::test]
async fn test_create_student_with_class() {
    let directory = setup().await;
    let mut alice = user(UserRole::Student, "alice", "OU1");
    alice.set_school_classes(membership(&[("OU1", &["1a"])]));
    let alice = create_user(&directory, alice).await;

    let alice_dn = "uid=alice,cn=schueler,cn=users,ou=OU1,dc=example,dc=com";
    assert_eq!(alice.state().old_dn.as_deref(), Some(alice_dn));

    let loaded = directory.get_user(alice_dn, None).await.unwrap();
    assert_eq!(loaded.role(), UserRole::Student);
    assert_eq!(loaded.roles(), &["student"]);
    assert_eq!(loaded.school(), Some("OU1"));
    assert_eq!(loaded.school_classes(), membership(&[("OU1", &["1a"])]));
    assert_eq!(loaded.role_strings(), vec!["student:school:OU1".to_string()]);

    // The missing class was created together with its share.
    let class_dn = directory.layout().class_dn("OU1", "OU1-1a");
    let class: SchoolGroup = directory.from_dn(&class_dn).await.unwrap();
    assert_eq!(class.kind(), GroupKind::SchoolClass);
    assert_eq!(class.relative_name(), Some("1a"));
    assert!(class.users().iter().any(|member| dn::same(member, alice_dn)));
    assert!(
        directory
            .client()
            .exists(&dn::build("cn", "OU1-1a", &directory.layout().class_shares_container("OU1")))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_create_existing_returns_false() {
    let directory = setup().await;
    create_user(&directory, user(UserRole::Teacher, "tom", "OU1")).await;
    let writes = directory.client().write_count();

    let mut again = user(UserRole::Teacher, "tom", "OU1");
    assert!(!directory.create(&mut again, CreateOptions::default()).await.unwrap());
    assert_eq!(directory.client().write_count(), writes);

    let mut school = School::new("OU1");
    assert!(!directory.create(&mut school, CreateOptions::default()).await.unwrap());
}

#[tokio::test]
async fn test_validation_collects_every_error() {
    let directory = setup().await;
    let mut bob = User::new(UserRole::Student, "bob", "OU9");
    bob.set_school_classes(membership(&[("OU2", &["1a"])]));

    let error = directory
        .create(&mut bob, CreateOptions::default())
        .await
        .unwrap_err();
    let KelvinError::Validation(errors) = error else {
        panic!("expected a validation error, got {:?}", error);
    };
    assert!(!errors.messages("firstname").is_empty());
    assert!(!errors.messages("lastname").is_empty());
    assert!(!errors.messages("school").is_empty());
    assert!(!errors.messages("school_classes").is_empty());
    assert!(!directory.exists(&bob).await.unwrap());
}

#[tokio::test]
async fn test_usernames_are_unique_across_schools() {
    let directory = setup().await;
    create_user(&directory, user(UserRole::Staff, "carl", "OU1")).await;

    let mut twin = user(UserRole::Teacher, "carl", "OU2");
    let error = directory
        .create(&mut twin, CreateOptions::default())
        .await
        .unwrap_err();
    let KelvinError::Validation(errors) = error else {
        panic!("expected a validation error, got {:?}", error);
    };
    assert_eq!(errors.messages("name").len(), 1);
}

#[tokio::test]
async fn test_modify_without_changes_does_not_write() {
    let directory = setup().await;
    let mut alice = user(UserRole::Student, "alice", "OU1");
    alice.set_school_classes(membership(&[("OU1", &["1a"])]));
    create_user(&directory, alice).await;

    let mut loaded = directory.find_user("alice").await.unwrap().unwrap();
    let writes = directory.client().write_count();
    assert!(directory.modify(&mut loaded, ModifyOptions::default()).await.unwrap());
    assert_eq!(directory.client().write_count(), writes);
}

#[tokio::test]
async fn test_unlikely_changes_are_reported_as_warnings() {
    let mut config = KelvinConfig::default();
    config.validate_unlikely_changes = true;
    let directory = setup_with(config).await;
    let mut tom = user(UserRole::Teacher, "tom", "OU1");
    tom.attributes_mut().set_str("record_uid", "R-1");
    create_user(&directory, tom).await;

    let mut loaded = directory.find_user("tom").await.unwrap().unwrap();
    loaded.attributes_mut().set_str("record_uid", "R-2");
    loaded.attributes_mut().set_str("lastname", "Other");
    assert!(directory.modify(&mut loaded, ModifyOptions::default()).await.unwrap());

    let warnings = loaded.state().warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings["record_uid"].contains("R-1"));
    assert!(warnings["record_uid"].contains("R-2"));
    let stored = directory.find_user("tom").await.unwrap().unwrap();
    assert_eq!(stored.record_uid(), Some("R-2"));

    // Without the setting nothing is reported.
    let directory = setup().await;
    let mut tom = user(UserRole::Teacher, "tom", "OU1");
    tom.attributes_mut().set_str("record_uid", "R-1");
    create_user(&directory, tom).await;
    let mut loaded = directory.find_user("tom").await.unwrap().unwrap();
    loaded.attributes_mut().set_str("record_uid", "R-2");
    assert!(directory.modify(&mut loaded, ModifyOptions::default()).await.unwrap());
    assert!(loaded.state().warnings().is_empty());
}

#[tokio::test]
async fn test_modify_missing_object_returns_false() {
    let directory = setup().await;
    let mut ghost = user(UserRole::Teacher, "ghost", "OU1");
    assert!(!directory.modify(&mut ghost, ModifyOptions::default()).await.unwrap());
}

#[tokio::test]
async fn test_modify_moves_user_to_new_primary_school() {
    let directory = setup().await;
    let mut tom = user(UserRole::Teacher, "tom", "OU1");
    tom.set_school_classes(membership(&[("OU1", &["1a"])]));
    let mut tom = create_user(&directory, tom).await;

    tom.set_schools(vec!["OU2".to_string()]);
    assert_eq!(tom.school(), Some("OU2"));
    assert!(directory.modify(&mut tom, ModifyOptions::default()).await.unwrap());

    let new_dn = "uid=tom,cn=lehrer,cn=users,ou=OU2,dc=example,dc=com";
    assert_eq!(tom.state().old_dn.as_deref(), Some(new_dn));
    assert!(
        directory
            .client()
            .get("uid=tom,cn=lehrer,cn=users,ou=OU1,dc=example,dc=com")
            .await
            .unwrap()
            .is_none()
    );

    let loaded = directory.get_user(new_dn, Some(UserRole::Teacher)).await.unwrap();
    assert_eq!(loaded.schools(), vec!["OU2".to_string()]);
    assert!(loaded.school_classes().is_empty());
    assert_eq!(loaded.role_strings(), vec!["teacher:school:OU2".to_string()]);

    let class: SchoolGroup = directory
        .from_dn(&directory.layout().class_dn("OU1", "OU1-1a"))
        .await
        .unwrap();
    assert!(class.users().is_empty());
}

#[tokio::test]
async fn test_modify_without_moves_keeps_position() {
    let directory = setup().await;
    let mut sam = create_user(&directory, user(UserRole::Staff, "sam", "OU1")).await;
    let old_dn = sam.state().old_dn.clone().unwrap();

    sam.set_schools(vec!["OU1".to_string(), "OU2".to_string()]);
    sam.set_school("OU2");
    let options = ModifyOptions {
        move_if_necessary: Some(false),
        ..ModifyOptions::default()
    };
    assert!(directory.modify(&mut sam, options).await.unwrap());
    assert_eq!(sam.state().old_dn.as_deref(), Some(old_dn.as_str()));

    let stored = directory.client().get(&old_dn).await.unwrap().unwrap();
    assert_eq!(stored.get_list("school"), vec!["OU1".to_string(), "OU2".to_string()]);
}

#[tokio::test]
async fn test_schools_cannot_move() {
    let directory = setup().await;
    let mut school: School = directory
        .from_dn(&directory.layout().school_dn("OU3"))
        .await
        .unwrap();
    assert!(!directory.move_entity(&mut school, HookPhase::Idle).await.unwrap());
}

#[tokio::test]
async fn test_remove_user_and_class() {
    let directory = setup().await;
    let mut class = create_class(&directory, "OU1", "2b").await;
    let mut alice = user(UserRole::Student, "alice", "OU1");
    alice.set_school_classes(membership(&[("OU1", &["2b"])]));
    let mut alice = create_user(&directory, alice).await;

    assert!(directory.remove(&mut alice, HookPhase::Idle).await.unwrap());
    assert!(alice.state().old_dn.is_none());
    assert!(directory.find_user("alice").await.unwrap().is_none());
    assert!(!directory.remove(&mut alice, HookPhase::Idle).await.unwrap());

    let share_dn = dn::build("cn", "OU1-2b", &directory.layout().class_shares_container("OU1"));
    assert!(directory.client().exists(&share_dn).await.unwrap());
    assert!(directory.remove(&mut class, HookPhase::Idle).await.unwrap());
    assert!(!directory.client().exists(&share_dn).await.unwrap());
}

#[tokio::test]
async fn test_renamed_class_takes_its_share_along() {
    let directory = setup().await;
    create_class(&directory, "OU1", "2b").await;
    let mut alice = user(UserRole::Student, "alice", "OU1");
    alice.set_school_classes(membership(&[("OU1", &["2b"])]));
    create_user(&directory, alice).await;

    let mut class: SchoolGroup = directory
        .from_dn(&directory.layout().class_dn("OU1", "OU1-2b"))
        .await
        .unwrap();
    class.set_name("2c");
    assert!(directory.modify(&mut class, ModifyOptions::default()).await.unwrap());

    let shares = directory.layout().class_shares_container("OU1");
    assert!(!directory.client().exists(&dn::build("cn", "OU1-2b", &shares)).await.unwrap());
    assert!(directory.client().exists(&dn::build("cn", "OU1-2c", &shares)).await.unwrap());
    let renamed: SchoolGroup = directory
        .from_dn(&directory.layout().class_dn("OU1", "OU1-2c"))
        .await
        .unwrap();
    assert_eq!(renamed.relative_name(), Some("2c"));
    let alice = directory.find_user("alice").await.unwrap().unwrap();
    assert_eq!(alice.school_classes(), membership(&[("OU1", &["2c"])]));
}

#[tokio::test]
async fn test_list_groups_and_users_by_school() {
    let directory = setup().await;
    create_class(&directory, "OU1", "1a").await;
    create_class(&directory, "OU2", "1a").await;
    let mut club = SchoolGroup::workgroup("OU1", "chess");
    directory.create(&mut club, CreateOptions::default()).await.unwrap();
    create_user(&directory, user(UserRole::Teacher, "tom", "OU1")).await;
    create_user(&directory, user(UserRole::Teacher, "tina", "OU2")).await;

    let classes = directory
        .groups(GroupKind::SchoolClass, "OU1", &Filter::everything())
        .await
        .unwrap();
    assert_eq!(classes.len(), 1);
    let workgroups = directory
        .groups(GroupKind::WorkGroup, "OU1", &Filter::everything())
        .await
        .unwrap();
    assert_eq!(workgroups.len(), 1);
    assert_eq!(workgroups[0].relative_name(), Some("chess"));

    let users = directory.users(Some("OU2"), &Filter::everything()).await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name(), Some("tina"));
    assert_eq!(directory.schools().await.unwrap().len(), 3);
}

struct DefaultMail;

impl LifecycleHook for DefaultMail {
    fn name(&self) -> &str {
        "default-mail"
    }

    fn model(&self) -> HookTarget {
        HookTarget::Users
    }

    fn pre(&self, context: &mut HookContext<'_>) -> Result<(), HookError> {
        let name = context
            .attributes
            .get_str("name")
            .ok_or("user without a name")?
            .to_string();
        context
            .attributes
            .set_str("email", format!("{}@school.example.com", name));
        Ok(())
    }
}

struct Veto;

impl LifecycleHook for Veto {
    fn name(&self) -> &str {
        "veto"
    }

    fn model(&self) -> HookTarget {
        HookTarget::Users
    }

    fn pre(&self, _context: &mut HookContext<'_>) -> Result<(), HookError> {
        Err("not today".into())
    }
}

#[tokio::test]
async fn test_pre_hooks_can_change_attributes() {
    let mut directory = setup().await;
    directory.register_hook(Arc::new(DefaultMail));
    let tom = create_user(&directory, user(UserRole::Teacher, "tom", "OU1")).await;

    let stored = directory
        .client()
        .get(tom.state().old_dn.as_deref().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.get_str("mailPrimaryAddress"), Some("tom@school.example.com"));
}

#[tokio::test]
async fn test_failing_pre_hook_aborts_and_nested_calls_skip_hooks() {
    let mut directory = setup().await;
    directory.register_hook(Arc::new(Veto));
    let writes = directory.client().write_count();

    let mut tom = user(UserRole::Teacher, "tom", "OU1");
    let error = directory
        .create(&mut tom, CreateOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(error, KelvinError::Hook { .. }));
    assert_eq!(directory.client().write_count(), writes);

    let nested = CreateOptions {
        phase: HookPhase::Running,
        ..CreateOptions::default()
    };
    assert!(directory.create(&mut tom, nested).await.unwrap());
}
