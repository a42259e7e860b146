//! Shared helpers for the integration tests.
//!
//! Every test starts from an in-memory directory below `dc=example,dc=com`
//! with the schools `OU1`, `OU2` and `OU3` and their container structure.

#![allow(dead_code)]

use kelvin_school::directory::InMemoryDirectory;
use kelvin_school::model::{CreateOptions, School, SchoolDirectory, SchoolGroup, User, UserRole};
use std::collections::BTreeMap;

pub const BASE: &str = "dc=example,dc=com";
pub const SCHOOLS: [&str; 3] = ["OU1", "OU2", "OU3"];

/// Initialise logging once; repeated calls are ignored.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

/// A directory with the three test schools.
pub async fn setup() -> SchoolDirectory<InMemoryDirectory> {
    setup_with(kelvin_school::KelvinConfig::default()).await
}

pub async fn setup_with(config: kelvin_school::KelvinConfig) -> SchoolDirectory<InMemoryDirectory> {
    init_logging();
    let directory = SchoolDirectory::new(InMemoryDirectory::new(BASE), config);
    for name in SCHOOLS {
        let mut school = School::new(name).with_display_name(format!("School {}", name));
        assert!(
            directory
                .create(&mut school, CreateOptions::default())
                .await
                .unwrap()
        );
    }
    directory
}

/// Relative class or workgroup membership from literal pairs.
pub fn membership(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    entries
        .iter()
        .map(|(school, names)| {
            (
                school.to_string(),
                names.iter().map(|n| n.to_string()).collect(),
            )
        })
        .collect()
}

/// An unsaved user with first and last name set.
pub fn user(role: UserRole, name: &str, school: &str) -> User {
    User::new(role, name, school).with_names("Test", name)
}

/// Create `user` and return it with its DN recorded.
pub async fn create_user(directory: &SchoolDirectory<InMemoryDirectory>, mut user: User) -> User {
    assert!(
        directory
            .create(&mut user, CreateOptions::default())
            .await
            .unwrap()
    );
    user
}

/// Create a school class directly.
pub async fn create_class(
    directory: &SchoolDirectory<InMemoryDirectory>,
    school: &str,
    name: &str,
) -> SchoolGroup {
    let mut class = SchoolGroup::school_class(school, name);
    assert!(
        directory
            .create(&mut class, CreateOptions::default())
            .await
            .unwrap()
    );
    class
}
