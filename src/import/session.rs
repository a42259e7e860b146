//! State shared by all users of one import run.

use crate::directory::{DirectoryClient, Filter, USER_TYPE, dn};
use crate::error::{KelvinError, KelvinResult};
use crate::model::SchoolDirectory;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Identifiers that must map to at most one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyspace {
    RecordUid,
    Name,
    Email,
}

impl Keyspace {
    pub const ALL: [Keyspace; 3] = [Keyspace::RecordUid, Keyspace::Name, Keyspace::Email];

    /// Attribute name used in errors.
    pub fn attribute(self) -> &'static str {
        match self {
            Keyspace::RecordUid => "record_uid",
            Keyspace::Name => "name",
            Keyspace::Email => "email",
        }
    }

    fn directory_property(self) -> &'static str {
        match self {
            Keyspace::RecordUid => "ucsschoolRecordUID",
            Keyspace::Name => "username",
            Keyspace::Email => "mailPrimaryAddress",
        }
    }
}

impl fmt::Display for Keyspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute())
    }
}

/// Uniqueness keyspaces and username counters of one import run.
///
/// Keyspaces are filled from the directory on first use; values are
/// compared case-insensitively.
#[derive(Debug, Default)]
pub struct ImportSession {
    keyspaces: HashMap<Keyspace, HashMap<String, String>>,
    loaded: bool,
    counters: HashMap<String, u32>,
    reserved: HashSet<String>,
}

impl ImportSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything; the next use reloads from the directory.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Fill the keyspaces from all users in the directory.
    pub async fn load<D: DirectoryClient>(&mut self, directory: &SchoolDirectory<D>) -> KelvinResult<()> {
        if self.loaded {
            return Ok(());
        }
        let users = directory
            .client()
            .search(USER_TYPE, directory.layout().base(), &Filter::everything())
            .await?;
        for user in &users {
            let Some(user_dn) = user.dn() else { continue };
            for keyspace in Keyspace::ALL {
                if let Some(value) = user.get_str(keyspace.directory_property()) {
                    self.keyspaces
                        .entry(keyspace)
                        .or_default()
                        .insert(value.to_lowercase(), user_dn.to_string());
                }
            }
        }
        debug!("Loaded import keyspaces from {} users", users.len());
        self.loaded = true;
        Ok(())
    }

    /// DN that holds `value` in `keyspace`, if any.
    pub fn holder(&self, keyspace: Keyspace, value: &str) -> Option<&str> {
        self.keyspaces
            .get(&keyspace)?
            .get(&value.to_lowercase())
            .map(String::as_str)
    }

    /// Record that `value` belongs to `owner`.
    ///
    /// Claiming a value held by a different DN is a `UniqueId` error.
    pub fn claim(&mut self, keyspace: Keyspace, value: &str, owner: &str) -> KelvinResult<()> {
        let entries = self.keyspaces.entry(keyspace).or_default();
        let key = value.to_lowercase();
        match entries.get(&key) {
            Some(existing) if !dn::same(existing, owner) => Err(KelvinError::UniqueId {
                attribute: keyspace.attribute().to_string(),
                value: value.to_string(),
                existing_dn: existing.clone(),
            }),
            Some(_) => Ok(()),
            None => {
                entries.insert(key, owner.to_string());
                Ok(())
            }
        }
    }

    /// Claim several values for `owner` at once.
    ///
    /// Either every value is recorded or, on the first conflict, none is.
    pub fn claim_all(&mut self, claims: &[(Keyspace, &str)], owner: &str) -> KelvinResult<()> {
        for (keyspace, value) in claims {
            if let Some(existing) = self.holder(*keyspace, value) {
                if !dn::same(existing, owner) {
                    return Err(KelvinError::UniqueId {
                        attribute: keyspace.attribute().to_string(),
                        value: value.to_string(),
                        existing_dn: existing.to_string(),
                    });
                }
            }
        }
        for (keyspace, value) in claims {
            self.claim(*keyspace, value, owner)?;
        }
        Ok(())
    }

    /// Drop every value held by `owner`.
    pub fn release(&mut self, owner: &str) {
        for entries in self.keyspaces.values_mut() {
            entries.retain(|_, holder| !dn::same(holder, owner));
        }
    }

    /// Last counter used for a username base.
    pub fn last_counter(&self, base: &str) -> Option<u32> {
        self.counters.get(&base.to_lowercase()).copied()
    }

    pub fn remember_counter(&mut self, base: &str, counter: u32) {
        self.counters.insert(base.to_lowercase(), counter);
    }

    /// Keep a generated username from being handed out twice.
    pub fn reserve_username(&mut self, name: &str) {
        self.reserved.insert(name.to_lowercase());
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved.contains(&name.to_lowercase()) || self.holder(Keyspace::Name, name).is_some()
    }
}
