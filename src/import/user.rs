//! Users read from an import source.

use super::scheme::Scheme;
use super::session::{ImportSession, Keyspace};
use super::username::make_username;
use crate::config::ImportConfig;
use crate::directory::{DirectoryClient, Filter};
use crate::error::{KelvinError, KelvinResult};
use crate::model::user::user_descriptors;
use crate::model::{CreateOptions, HookPhase, ModifyOptions, SchoolDirectory, SchoolModel, User};
use crate::schema::is_empty;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Scheme key of the username; the user attribute is `name`.
const USERNAME_KEY: &str = "username";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportAction {
    Add,
    Modify,
    Delete,
}

/// Makers already run, or running, for one user.
#[derive(Debug, Default)]
struct MakeJob {
    running: BTreeSet<String>,
    done: BTreeSet<String>,
}

/// A user together with its import bookkeeping.
#[derive(Debug, Clone)]
pub struct ImportUser {
    pub user: User,
    pub action: ImportAction,
    /// Line or record number in the input.
    pub entry_count: usize,
    /// Raw input fields, for reports.
    pub input_data: Vec<String>,
}

fn target_attribute(key: &str) -> &str {
    if key == USERNAME_KEY { "name" } else { key }
}

fn is_user_field(attribute: &str) -> bool {
    user_descriptors().iter().any(|d| d.name == attribute)
}

impl ImportUser {
    pub fn new(user: User, action: ImportAction) -> Self {
        Self {
            user,
            action,
            entry_count: 0,
            input_data: Vec::new(),
        }
    }

    /// Find an existing user by its import identity, ready to be modified.
    pub async fn find_by_import_ids<D: DirectoryClient>(
        directory: &SchoolDirectory<D>,
        source_uid: &str,
        record_uid: &str,
    ) -> KelvinResult<Option<Self>> {
        let filter = Filter::equal("ucsschoolSourceUID", source_uid)
            .and(Filter::equal("ucsschoolRecordUID", record_uid));
        let mut users = directory.users(None, &filter).await?;
        Ok(users.pop().map(|user| Self::new(user, ImportAction::Modify)))
    }

    fn value(&self, attribute: &str) -> Option<&Value> {
        self.user
            .attributes()
            .get(attribute)
            .or_else(|| self.user.udm_properties().get(attribute))
            .filter(|v| !is_empty(v))
    }

    /// Value of `attribute` as scheme input.
    fn lookup(&self, attribute: &str, config: &ImportConfig) -> Option<String> {
        if attribute == "maildomain" {
            return config.maildomain.clone();
        }
        match self.value(target_attribute(attribute))? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn set_value(&mut self, attribute: &str, value: String) {
        if is_user_field(attribute) {
            self.user.attributes_mut().set_str(attribute, value);
        } else {
            self.user
                .udm_properties_mut()
                .insert(attribute.to_string(), Value::String(value));
        }
    }

    /// Run the maker for scheme key `key` after the makers it depends on.
    fn make(&mut self, key: &str, config: &ImportConfig, job: &mut MakeJob) -> KelvinResult<()> {
        if job.done.contains(key) {
            return Ok(());
        }
        if !job.running.insert(key.to_string()) {
            return Err(KelvinError::initialisation(format!(
                "Scheme for {:?} depends on itself.",
                key
            )));
        }
        let attribute = target_attribute(key);
        let missing = self.value(attribute).is_none();
        if let Some(template) = config.scheme_for(key, self.user.roles()).filter(|_| missing) {
            let scheme = Scheme::parse(template)?;
            for dependency in scheme.placeholders() {
                if dependency != key && config.scheme.contains_key(dependency) {
                    self.make(dependency, config, job)?;
                }
            }
            let value = scheme.render(|a| self.lookup(a, config))?.to_string();
            debug!("Made {} = {:?} from {:?}", attribute, value, template);
            self.set_value(attribute, value);
        }
        job.running.remove(key);
        job.done.insert(key.to_string());
        Ok(())
    }

    /// Fill in generated attributes.
    ///
    /// The username is made first (it needs the directory to find a free
    /// counter); the other scheme keys follow in dependency order.
    pub async fn prepare_all<D: DirectoryClient>(
        &mut self,
        directory: &SchoolDirectory<D>,
        session: &mut ImportSession,
    ) -> KelvinResult<()> {
        let config = &directory.config().import;
        if self.value("source_uid").is_none() {
            if let Some(source_uid) = &config.source_uid {
                self.user.attributes_mut().set_str("source_uid", source_uid.clone());
            }
        }

        let mut job = MakeJob::default();
        job.running.insert(USERNAME_KEY.to_string());
        if self.value("name").is_none() {
            if let Some(template) = config.scheme_for(USERNAME_KEY, self.user.roles()) {
                let scheme = Scheme::parse(template)?;
                for dependency in scheme.placeholders() {
                    if dependency != USERNAME_KEY && config.scheme.contains_key(dependency) {
                        self.make(dependency, config, &mut job)?;
                    }
                }
                let max_length = config.max_username_length(self.user.roles());
                let this = &*self;
                let name = make_username(
                    directory,
                    session,
                    &scheme,
                    |a| this.lookup(a, config),
                    max_length,
                )
                .await?;
                self.user.attributes_mut().set_str("name", name);
            }
        }
        job.running.remove(USERNAME_KEY);
        job.done.insert(USERNAME_KEY.to_string());

        let keys: Vec<String> = config.scheme.keys().cloned().collect();
        for key in keys {
            self.make(&key, config, &mut job)?;
        }
        self.user.prepare();
        Ok(())
    }

    /// Validate for import and claim the user's identifiers in the session.
    pub async fn validate<D: DirectoryClient>(
        &mut self,
        directory: &SchoolDirectory<D>,
        session: &mut ImportSession,
    ) -> KelvinResult<()> {
        session.load(directory).await?;
        let config = &directory.config().import;
        let mut errors = directory.collect_errors(&mut self.user).await?;

        let mut required = vec!["record_uid", "source_uid"];
        for attribute in &config.mandatory_attributes {
            if !required.contains(&attribute.as_str()) {
                required.push(attribute.as_str());
            }
        }
        for attribute in required {
            if self.value(attribute).is_none() && errors.messages(attribute).is_empty() {
                errors.add(attribute, "A value is required.");
            }
        }

        if let Some(name) = self.user.name() {
            let max_length = config.max_username_length(self.user.roles());
            if name.chars().count() > max_length {
                errors.add(
                    "name",
                    format!("Username {:?} is longer than {} characters.", name, max_length),
                );
            }
        }
        if !errors.is_empty() {
            return Err(KelvinError::Validation(errors));
        }
        self.claim(directory, session)
    }

    fn claim<D: DirectoryClient>(
        &self,
        directory: &SchoolDirectory<D>,
        session: &mut ImportSession,
    ) -> KelvinResult<()> {
        let owner = directory.current_dn(&self.user);
        let identifiers: Vec<(Keyspace, &str)> = [
            (Keyspace::RecordUid, self.user.record_uid()),
            (Keyspace::Name, self.user.name()),
            (Keyspace::Email, self.user.email()),
        ]
        .into_iter()
        .filter_map(|(keyspace, value)| value.map(|v| (keyspace, v)))
        .collect();
        session.claim_all(&identifiers, &owner)
    }

    /// Validate and write the user according to its action.
    pub async fn commit<D: DirectoryClient>(
        &mut self,
        directory: &SchoolDirectory<D>,
        session: &mut ImportSession,
    ) -> KelvinResult<bool> {
        match self.action {
            ImportAction::Add => {
                self.validate(directory, session).await?;
                let options = CreateOptions {
                    validate: false,
                    ..CreateOptions::default()
                };
                let created = directory.create(&mut self.user, options).await?;
                info!("Import #{}: added {:?}: {}", self.entry_count, self.user.name(), created);
                Ok(created)
            }
            ImportAction::Modify => {
                self.validate(directory, session).await?;
                let old_dn = directory.current_dn(&self.user);
                let options = ModifyOptions {
                    validate: false,
                    ..ModifyOptions::default()
                };
                let modified = directory.modify(&mut self.user, options).await?;
                if directory.current_dn(&self.user) != old_dn {
                    session.release(&old_dn);
                    self.claim(directory, session)?;
                }
                info!("Import #{}: modified {:?}: {}", self.entry_count, self.user.name(), modified);
                Ok(modified)
            }
            ImportAction::Delete => {
                let user_dn = directory.current_dn(&self.user);
                let removed = directory.remove(&mut self.user, HookPhase::Idle).await?;
                if removed {
                    session.release(&user_dn);
                }
                info!("Import #{}: deleted {}: {}", self.entry_count, user_dn, removed);
                Ok(removed)
            }
        }
    }
}
