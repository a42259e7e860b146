//! In-memory directory implementation.
//!
//! This module provides a thread-safe in-memory implementation of the
//! [`DirectoryClient`] trait. It emulates the parts of the directory product
//! the school models rely on:
//!
//! * DN allocation from the naming property and position
//! * Moves and renames (including whole subtrees) in a single save
//! * Two-sided group membership: a user's `groups` and a group's `users`
//!   are kept consistent, and references follow moves and deletes
//! * Passwords are never stored in clear text; `password` is replaced by a
//!   salted `userPassword` hash on save
//! * Recursive deletion
//!
//! It is designed for tests and development. Every mutating call is counted
//! so tests can assert that an operation performed no writes.

use super::{
    DirectoryClient, DirectoryError, DirectoryObject, DirectoryResult, Filter, GROUP_TYPE,
    USER_TYPE, dn,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, trace};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Property of a user object listing its group DNs.
const USER_GROUPS: &str = "groups";
/// Property of a group object listing its member DNs.
const GROUP_MEMBERS: &str = "users";

/// Thread-safe in-memory directory.
///
/// Objects are keyed by normalised DN. The base DN always exists implicitly.
#[derive(Clone)]
pub struct InMemoryDirectory {
    base: String,
    objects: Arc<RwLock<BTreeMap<String, DirectoryObject>>>,
    writes: Arc<AtomicUsize>,
}

impl InMemoryDirectory {
    /// Create an empty directory below `base`.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            objects: Arc::new(RwLock::new(BTreeMap::new())),
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The LDAP base DN.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Number of successful write operations since creation.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the directory holds no objects.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// All stored objects in DN order (useful for before/after comparisons).
    pub async fn snapshot(&self) -> Vec<DirectoryObject> {
        self.objects.read().await.values().cloned().collect()
    }

    /// Clear all data (useful for testing).
    pub async fn clear(&self) {
        self.objects.write().await.clear();
    }

    fn hash_password(password: &str, salt: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(password.as_bytes());
        hasher.update(salt.as_bytes());
        let mut digest = hasher.finalize().to_vec();
        digest.extend_from_slice(salt.as_bytes());
        format!("{{SSHA256}}{}", STANDARD.encode(digest))
    }

    fn position_exists(&self, objects: &BTreeMap<String, DirectoryObject>, position: &str) -> bool {
        dn::same(position, &self.base) || objects.contains_key(&dn::normalize(position))
    }

    fn membership_property(object_type: &str) -> Option<(&'static str, &'static str, &'static str)> {
        match object_type {
            USER_TYPE => Some((USER_GROUPS, GROUP_TYPE, GROUP_MEMBERS)),
            GROUP_TYPE => Some((GROUP_MEMBERS, USER_TYPE, USER_GROUPS)),
            _ => None,
        }
    }

    /// Check that every DN in the object's membership property refers to an
    /// existing object of the right type.
    fn check_references(
        objects: &BTreeMap<String, DirectoryObject>,
        object: &DirectoryObject,
        own_dn: &str,
    ) -> DirectoryResult<()> {
        let Some((property, other_type, _)) = Self::membership_property(object.object_type())
        else {
            return Ok(());
        };
        for reference in object.get_list(property) {
            match objects.get(&dn::normalize(&reference)) {
                Some(other) if other.object_type() == other_type => {}
                Some(other) => {
                    return Err(DirectoryError::invalid_property(
                        own_dn,
                        property,
                        format!("{} is a {}, not a {}", reference, other.object_type(), other_type),
                    ));
                }
                None => {
                    return Err(DirectoryError::invalid_property(
                        own_dn,
                        property,
                        format!("{} does not exist", reference),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Mirror membership changes of `own_dn` onto the referenced objects.
    fn reflect_membership(
        objects: &mut BTreeMap<String, DirectoryObject>,
        object_type: &str,
        own_dn: &str,
        old: &[String],
        new: &[String],
    ) {
        let Some((_, _, back_property)) = Self::membership_property(object_type) else {
            return;
        };
        let contains = |list: &[String], item: &str| list.iter().any(|x| dn::same(x, item));

        for removed in old.iter().filter(|dn| !contains(new, dn)) {
            if let Some(other) = objects.get_mut(&dn::normalize(removed)) {
                let remaining: Vec<Value> = other
                    .get_list(back_property)
                    .into_iter()
                    .filter(|member| !dn::same(member, own_dn))
                    .map(Value::String)
                    .collect();
                other.set(back_property, Value::Array(remaining));
            }
        }
        for added in new.iter().filter(|dn| !contains(old, dn)) {
            if let Some(other) = objects.get_mut(&dn::normalize(added)) {
                let mut members = other.get_list(back_property);
                if !contains(&members, own_dn) {
                    members.push(own_dn.to_string());
                    other.set(
                        back_property,
                        Value::Array(members.into_iter().map(Value::String).collect()),
                    );
                }
            }
        }
    }

    /// Rewrite membership references after `old_dn` moved to `new_dn`.
    fn rename_references(
        objects: &mut BTreeMap<String, DirectoryObject>,
        old_dn: &str,
        new_dn: &str,
    ) {
        for object in objects.values_mut() {
            let Some((property, _, _)) = Self::membership_property(object.object_type()) else {
                continue;
            };
            let list = object.get_list(property);
            if list.iter().any(|reference| dn::same(reference, old_dn)) {
                let rewritten: Vec<Value> = list
                    .into_iter()
                    .map(|reference| {
                        if dn::same(&reference, old_dn) {
                            new_dn.to_string()
                        } else {
                            reference
                        }
                    })
                    .map(Value::String)
                    .collect();
                object.set(property, Value::Array(rewritten));
            }
        }
    }

    /// Drop all membership references to `removed_dn`.
    fn drop_references(objects: &mut BTreeMap<String, DirectoryObject>, removed_dn: &str) {
        for object in objects.values_mut() {
            let Some((property, _, _)) = Self::membership_property(object.object_type()) else {
                continue;
            };
            let list = object.get_list(property);
            if list.iter().any(|reference| dn::same(reference, removed_dn)) {
                let remaining: Vec<Value> = list
                    .into_iter()
                    .filter(|reference| !dn::same(reference, removed_dn))
                    .map(Value::String)
                    .collect();
                object.set(property, Value::Array(remaining));
            }
        }
    }

    fn prepare_properties(object: &mut DirectoryObject, dn: &str) {
        if let Some(Value::String(password)) = object.remove("password") {
            if !password.is_empty() {
                let hash = Self::hash_password(&password, &dn::normalize(dn));
                object.set("userPassword", Value::String(hash));
            }
        }
    }

    fn move_subtree(
        objects: &mut BTreeMap<String, DirectoryObject>,
        old_dn: &str,
        new_dn: &str,
    ) {
        let old_key = dn::normalize(old_dn);
        let suffix = format!(",{}", old_key);
        let children: Vec<String> = objects
            .keys()
            .filter(|key| key.ends_with(&suffix))
            .cloned()
            .collect();
        for key in children {
            if let Some(mut child) = objects.remove(&key) {
                let Some(child_old_dn) = child.dn().map(str::to_string) else {
                    continue;
                };
                let parts = dn::explode(&child_old_dn);
                let depth = parts.len() - dn::explode(old_dn).len();
                let child_new_dn = format!("{},{}", parts[..depth].join(","), new_dn);
                if let Some(parent) = dn::parent(&child_new_dn) {
                    child.set_position(parent);
                }
                child.set_dn(Some(child_new_dn.clone()));
                objects.insert(dn::normalize(&child_new_dn), child);
                Self::rename_references(objects, &child_old_dn, &child_new_dn);
            }
        }
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new("dc=example,dc=com")
    }
}

impl DirectoryClient for InMemoryDirectory {
    async fn get(&self, dn: &str) -> DirectoryResult<Option<DirectoryObject>> {
        let objects = self.objects.read().await;
        Ok(objects.get(&dn::normalize(dn)).cloned())
    }

    async fn save(&self, mut object: DirectoryObject) -> DirectoryResult<DirectoryObject> {
        let target = object.target_dn()?;
        let target_key = dn::normalize(&target);
        let mut objects = self.objects.write().await;

        if !self.position_exists(&objects, object.position()) {
            return Err(DirectoryError::NoSuperordinate {
                position: object.position().to_string(),
            });
        }

        let previous = match object.dn().map(str::to_string) {
            None => {
                if objects.contains_key(&target_key) {
                    return Err(DirectoryError::already_exists(target));
                }
                None
            }
            Some(current) => {
                let current_key = dn::normalize(&current);
                let Some(previous) = objects.get(&current_key).cloned() else {
                    return Err(DirectoryError::no_object(current));
                };
                if current_key != target_key {
                    if objects.contains_key(&target_key) {
                        return Err(DirectoryError::already_exists(target));
                    }
                    if dn::is_below(&target, &current) {
                        return Err(DirectoryError::InvalidMove {
                            dn: current,
                            target,
                        });
                    }
                }
                Some(previous)
            }
        };

        Self::check_references(&objects, &object, &target)?;
        Self::prepare_properties(&mut object, &target);

        if let Some(previous) = &previous {
            let old_dn = previous.dn().unwrap_or_default().to_string();
            if !dn::same(&old_dn, &target) {
                debug!("Moving {} to {}", old_dn, target);
                objects.remove(&dn::normalize(&old_dn));
                Self::move_subtree(&mut objects, &old_dn, &target);
                Self::rename_references(&mut objects, &old_dn, &target);
            }
        }

        if let Some((property, _, _)) = Self::membership_property(object.object_type()) {
            // Back references already point at `target` after a move.
            let old_members = previous
                .as_ref()
                .map(|p| p.get_list(property))
                .unwrap_or_default();
            let new_members = object.get_list(property);
            Self::reflect_membership(
                &mut objects,
                object.object_type(),
                &target,
                &old_members,
                &new_members,
            );
        }

        object.set_dn(Some(target.clone()));
        objects.insert(target_key, object.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        trace!("Saved {}", target);
        Ok(object)
    }

    async fn delete(&self, dn: &str) -> DirectoryResult<bool> {
        let key = dn::normalize(dn);
        let mut objects = self.objects.write().await;
        if !objects.contains_key(&key) {
            return Ok(false);
        }
        let suffix = format!(",{}", key);
        let doomed: Vec<String> = objects
            .keys()
            .filter(|k| **k == key || k.ends_with(&suffix))
            .cloned()
            .collect();
        for doomed_key in doomed {
            if let Some(removed) = objects.remove(&doomed_key) {
                if let Some(removed_dn) = removed.dn() {
                    Self::drop_references(&mut objects, removed_dn);
                }
            }
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        debug!("Deleted {}", dn);
        Ok(true)
    }

    async fn search(
        &self,
        object_type: &str,
        base: &str,
        filter: &Filter,
    ) -> DirectoryResult<Vec<DirectoryObject>> {
        let objects = self.objects.read().await;
        Ok(objects
            .values()
            .filter(|object| object_type.is_empty() || object.object_type() == object_type)
            .filter(|object| {
                object
                    .dn()
                    .map(|object_dn| dn::is_at_or_below(object_dn, base))
                    .unwrap_or(false)
            })
            .filter(|object| filter.matches(object))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{CONTAINER_TYPE, OU_TYPE};
    use serde_json::json;

    const BASE: &str = "dc=example,dc=com";

    async fn seed(directory: &InMemoryDirectory) {
        let mut ou = directory.new_object(OU_TYPE, BASE);
        ou.set("name", json!("OU1"));
        directory.save(ou).await.unwrap();
        let mut users = directory.new_object(CONTAINER_TYPE, "ou=OU1,dc=example,dc=com");
        users.set("name", json!("users"));
        directory.save(users).await.unwrap();
        let mut group = directory.new_object(GROUP_TYPE, "ou=OU1,dc=example,dc=com");
        group.set("name", json!("OU1-1a"));
        directory.save(group).await.unwrap();
    }

    fn user(name: &str, groups: &[&str]) -> DirectoryObject {
        let mut user = DirectoryObject::new(USER_TYPE, "cn=users,ou=OU1,dc=example,dc=com");
        user.set("username", json!(name));
        user.set("groups", json!(groups));
        user
    }

    #[tokio::test]
    async fn test_membership_is_reflected_on_groups() {
        let directory = InMemoryDirectory::new(BASE);
        seed(&directory).await;
        let group_dn = "cn=OU1-1a,ou=OU1,dc=example,dc=com";

        let saved = directory.save(user("alice", &[group_dn])).await.unwrap();
        let group = directory.get(group_dn).await.unwrap().unwrap();
        assert_eq!(group.get_list("users"), vec![saved.dn().unwrap().to_string()]);

        let mut saved = saved;
        saved.set("groups", json!([]));
        directory.save(saved).await.unwrap();
        let group = directory.get(group_dn).await.unwrap().unwrap();
        assert!(group.get_list("users").is_empty());
    }

    #[tokio::test]
    async fn test_dangling_group_reference_is_rejected() {
        let directory = InMemoryDirectory::new(BASE);
        seed(&directory).await;
        let result = directory
            .save(user("alice", &["cn=missing,ou=OU1,dc=example,dc=com"]))
            .await;
        assert!(matches!(result, Err(DirectoryError::InvalidProperty { .. })));
        assert!(directory
            .get("uid=alice,cn=users,ou=OU1,dc=example,dc=com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_rename_updates_references() {
        let directory = InMemoryDirectory::new(BASE);
        seed(&directory).await;
        let group_dn = "cn=OU1-1a,ou=OU1,dc=example,dc=com";
        let saved = directory.save(user("alice", &[group_dn])).await.unwrap();

        let mut renamed = saved;
        renamed.set("username", json!("alice2"));
        let renamed = directory.save(renamed).await.unwrap();
        assert_eq!(renamed.dn(), Some("uid=alice2,cn=users,ou=OU1,dc=example,dc=com"));
        assert!(directory
            .get("uid=alice,cn=users,ou=OU1,dc=example,dc=com")
            .await
            .unwrap()
            .is_none());

        let group = directory.get(group_dn).await.unwrap().unwrap();
        assert_eq!(
            group.get_list("users"),
            vec!["uid=alice2,cn=users,ou=OU1,dc=example,dc=com".to_string()]
        );
    }

    #[tokio::test]
    async fn test_password_is_hashed() {
        let directory = InMemoryDirectory::new(BASE);
        seed(&directory).await;
        let mut object = user("alice", &[]);
        object.set("password", json!("s3cr3t!"));
        let saved = directory.save(object).await.unwrap();
        assert!(saved.get("password").is_none());
        assert!(saved.get_str("userPassword").unwrap().starts_with("{SSHA256}"));
    }

    #[tokio::test]
    async fn test_delete_is_recursive_and_drops_references() {
        let directory = InMemoryDirectory::new(BASE);
        seed(&directory).await;
        let group_dn = "cn=OU1-1a,ou=OU1,dc=example,dc=com";
        directory.save(user("alice", &[group_dn])).await.unwrap();

        assert!(directory.delete(group_dn).await.unwrap());
        let alice = directory
            .get("uid=alice,cn=users,ou=OU1,dc=example,dc=com")
            .await
            .unwrap()
            .unwrap();
        assert!(alice.get_list("groups").is_empty());

        assert!(directory.delete("ou=OU1,dc=example,dc=com").await.unwrap());
        assert!(directory.is_empty().await);
        assert!(!directory.delete("ou=OU1,dc=example,dc=com").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_superordinate() {
        let directory = InMemoryDirectory::new(BASE);
        let result = directory.save(user("alice", &[])).await;
        assert!(matches!(result, Err(DirectoryError::NoSuperordinate { .. })));
        assert_eq!(directory.write_count(), 0);
    }
}
