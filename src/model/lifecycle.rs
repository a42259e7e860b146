//! Create, modify, move and remove school models.
//!
//! [`SchoolDirectory`] ties a [`DirectoryClient`] to the directory layout,
//! the configuration and the registered hooks. All lifecycle operations go
//! through it.
//!
//! # Validation order
//!
//! 1. attribute descriptors, collecting every error
//! 2. directory-wide name uniqueness for models with unique names
//! 3. existence of every referenced school
//! 4. school role strings refer to member schools
//! 5. model-specific consistency
//! 6. optional warnings for changed attributes that are unlikely to change
//!
//! Errors from steps 1 to 5 are reported together in one
//! [`ValidationError`].

use super::base::{Dependent, SchoolModel, parse_role_strings};
use super::group::{GroupKind, SchoolGroup};
use super::hooks::{HookContext, HookEvent, HookPhase, HookRegistry, LifecycleHook};
use super::layout::DirectoryLayout;
use super::role::UserRole;
use super::school::School;
use super::user::User;
use crate::config::KelvinConfig;
use crate::directory::{
    DirectoryClient, DirectoryObject, Filter, GROUP_TYPE, OU_TYPE, USER_TYPE, dn,
    naming_attribute,
};
use crate::error::{KelvinError, KelvinResult, ValidationError};
use crate::schema::is_empty;
use log::{debug, info, warn};
use std::sync::Arc;

/// Options for [`SchoolDirectory::create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateOptions {
    pub validate: bool,
    pub phase: HookPhase,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            validate: true,
            phase: HookPhase::Idle,
        }
    }
}

/// Options for [`SchoolDirectory::modify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifyOptions {
    pub validate: bool,
    /// `None` uses the model's `allow_move` policy.
    pub move_if_necessary: Option<bool>,
    pub phase: HookPhase,
}

impl Default for ModifyOptions {
    fn default() -> Self {
        Self {
            validate: true,
            move_if_necessary: None,
            phase: HookPhase::Idle,
        }
    }
}

/// Lifecycle engine for school models.
pub struct SchoolDirectory<D: DirectoryClient> {
    client: D,
    layout: DirectoryLayout,
    config: Arc<KelvinConfig>,
    hooks: HookRegistry,
}

impl<D: DirectoryClient> SchoolDirectory<D> {
    pub fn new(client: D, config: KelvinConfig) -> Self {
        Self::with_shared_config(client, Arc::new(config))
    }

    pub fn with_shared_config(client: D, config: Arc<KelvinConfig>) -> Self {
        Self {
            client,
            layout: DirectoryLayout::from_config(&config),
            config,
            hooks: HookRegistry::new(),
        }
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn register_hook(&mut self, hook: Arc<dyn LifecycleHook>) {
        self.hooks.register(hook);
    }

    pub fn client(&self) -> &D {
        &self.client
    }

    pub fn layout(&self) -> &DirectoryLayout {
        &self.layout
    }

    pub fn config(&self) -> &KelvinConfig {
        &self.config
    }

    /// The stored DN if the entity was loaded, the computed one otherwise.
    pub fn current_dn<M: SchoolModel>(&self, entity: &M) -> String {
        entity
            .state()
            .old_dn
            .clone()
            .unwrap_or_else(|| entity.dn(&self.layout))
    }

    pub async fn exists<M: SchoolModel>(&self, entity: &M) -> KelvinResult<bool> {
        Ok(self.client.exists(&self.current_dn(entity)).await?)
    }

    /// The backing directory object, from the cache if present.
    pub async fn load_object<M: SchoolModel>(
        &self,
        entity: &mut M,
    ) -> KelvinResult<Option<DirectoryObject>> {
        if let Some(cached) = entity.state().cached() {
            return Ok(Some(cached.clone()));
        }
        let object = self.client.get(&self.current_dn(entity)).await?;
        if let Some(object) = &object {
            entity.state_mut().cache(object.clone());
        }
        Ok(object)
    }

    /// Load a model from the object at `dn`.
    pub async fn from_dn<M: SchoolModel>(&self, object_dn: &str) -> KelvinResult<M> {
        let object = self
            .client
            .get(object_dn)
            .await?
            .ok_or_else(|| KelvinError::no_object(object_dn))?;
        M::from_directory_object(&object, &self.layout)
    }

    /// Load a user, optionally requiring a role.
    pub async fn get_user(&self, object_dn: &str, expected: Option<UserRole>) -> KelvinResult<User> {
        let object = self
            .client
            .get(object_dn)
            .await?
            .ok_or_else(|| KelvinError::no_object(object_dn))?;
        match expected {
            Some(role) => User::from_directory_object_as(&object, &self.layout, role),
            None => User::from_directory_object(&object, &self.layout),
        }
    }

    /// Find models of one directory type; objects that do not load as `M`
    /// are skipped.
    pub async fn search<M: SchoolModel>(
        &self,
        object_type: &str,
        base: &str,
        filter: &Filter,
    ) -> KelvinResult<Vec<M>> {
        let objects = self.client.search(object_type, base, filter).await?;
        let mut models = Vec::with_capacity(objects.len());
        for object in objects {
            match M::from_directory_object(&object, &self.layout) {
                Ok(model) => models.push(model),
                Err(e) => debug!("Skipping {:?}: {}", object.dn(), e),
            }
        }
        Ok(models)
    }

    pub async fn schools(&self) -> KelvinResult<Vec<School>> {
        self.search(OU_TYPE, self.layout.base(), &Filter::everything())
            .await
    }

    pub async fn users(&self, school: Option<&str>, filter: &Filter) -> KelvinResult<Vec<User>> {
        let base = match school {
            Some(school) => self.layout.school_dn(school),
            None => self.layout.base().to_string(),
        };
        self.search(USER_TYPE, &base, filter).await
    }

    /// Look up a user by username anywhere in the directory.
    pub async fn find_user(&self, name: &str) -> KelvinResult<Option<User>> {
        let (property, _) = naming_attribute(USER_TYPE);
        let mut users: Vec<User> = self
            .search(USER_TYPE, self.layout.base(), &Filter::equal(property, name))
            .await?;
        Ok(users.pop())
    }

    pub async fn groups(
        &self,
        kind: GroupKind,
        school: &str,
        filter: &Filter,
    ) -> KelvinResult<Vec<SchoolGroup>> {
        let base = match kind {
            GroupKind::SchoolClass => self.layout.classes_container(school),
            GroupKind::WorkGroup => self.layout.student_groups_container(school),
        };
        let groups: Vec<SchoolGroup> = self.search(GROUP_TYPE, &base, filter).await?;
        Ok(groups.into_iter().filter(|g| g.kind() == kind).collect())
    }

    /// Run all validation steps and return the collected errors.
    ///
    /// Warnings about unlikely changes are recorded on the entity.
    pub async fn collect_errors<M: SchoolModel>(
        &self,
        entity: &mut M,
    ) -> KelvinResult<ValidationError> {
        let mut errors = match crate::schema::validate_attributes(
            entity.descriptors(),
            entity.attributes(),
        ) {
            Ok(()) => ValidationError::default(),
            Err(errors) => errors,
        };

        let own_dn = self.current_dn(entity);
        if entity.meta().name_is_unique {
            if let Some(name) = entity.name() {
                let (property, _) = naming_attribute(entity.object_type());
                let conflicts = self
                    .client
                    .search(
                        entity.object_type(),
                        self.layout.base(),
                        &Filter::equal(property, name),
                    )
                    .await?;
                if conflicts
                    .iter()
                    .any(|o| !o.dn().is_some_and(|d| dn::same(d, &own_dn)))
                {
                    errors.add("name", format!("The name {:?} is already in use.", name));
                }
            }
        }

        for school in entity.referenced_schools() {
            if !self.client.exists(&self.layout.school_dn(&school)).await? {
                errors.add("school", format!("School {:?} does not exist.", school));
            }
        }

        let members = entity.member_schools();
        for role in parse_role_strings(&entity.role_strings()) {
            if role.is_school_context()
                && !members.iter().any(|s| s.eq_ignore_ascii_case(&role.context))
            {
                errors.add(
                    "ucsschool_roles",
                    format!(
                        "Role {} refers to school {:?}, which is not one of the object's schools.",
                        role, role.context
                    ),
                );
            }
        }

        entity.validate_model(&self.layout, &mut errors);

        if self.config.validate_unlikely_changes && entity.state().old_dn.is_some() {
            self.check_unlikely_changes(entity).await?;
        }
        Ok(errors)
    }

    /// Validate and fail with the complete error map.
    pub async fn validate<M: SchoolModel>(&self, entity: &mut M) -> KelvinResult<()> {
        let errors = self.collect_errors(entity).await?;
        if errors.is_empty() {
            Ok(())
        } else {
            debug!("Validation of {} failed: {}", entity.kind(), errors);
            Err(KelvinError::Validation(errors))
        }
    }

    async fn check_unlikely_changes<M: SchoolModel>(&self, entity: &mut M) -> KelvinResult<()> {
        let Some(stored) = self.load_object(entity).await? else {
            return Ok(());
        };
        entity.state_mut().clear_warnings();
        let descriptors = entity
            .descriptors()
            .iter()
            .filter(|d| d.unlikely_to_change && d.map_to_udm);
        let mut warnings = Vec::new();
        for descriptor in descriptors {
            let old = stored.get(descriptor.udm_name).filter(|v| !is_empty(v));
            let new = entity.attributes().get(descriptor.name).filter(|v| !is_empty(v));
            if let (Some(old), Some(new)) = (old, new) {
                if old != new {
                    warnings.push((
                        descriptor.name,
                        format!("{} changed from {} to {}.", descriptor.label, old, new),
                    ));
                }
            }
        }
        for (attribute, message) in warnings {
            warn!("{}: {}", self.current_dn(entity), message);
            entity.state_mut().add_warning(attribute, message);
        }
        Ok(())
    }

    fn run_pre<M: SchoolModel>(
        &self,
        event: HookEvent,
        phase: HookPhase,
        entity: &mut M,
    ) -> KelvinResult<()> {
        let dn = entity.state().old_dn.clone();
        let kind = entity.kind();
        let mut context = HookContext {
            event,
            kind,
            dn: dn.as_deref(),
            attributes: entity.attributes_mut(),
        };
        self.hooks.run_pre(phase, &mut context)
    }

    fn run_post<M: SchoolModel>(&self, event: HookEvent, phase: HookPhase, entity: &mut M) {
        let dn = entity.state().old_dn.clone();
        let kind = entity.kind();
        let mut context = HookContext {
            event,
            kind,
            dn: dn.as_deref(),
            attributes: entity.attributes_mut(),
        };
        self.hooks.run_post(phase, &mut context);
    }

    /// Create missing classes and workgroups together with their shares.
    async fn ensure_groups(&self, groups: Vec<SchoolGroup>) -> KelvinResult<()> {
        for mut group in groups {
            let group_dn = group.dn(&self.layout);
            if self.client.exists(&group_dn).await? {
                continue;
            }
            group.prepare();
            let object = group.to_directory_object(&self.layout)?;
            self.client.save(object).await?;
            info!("Created missing {} {}", group.kind(), group_dn);
            self.create_dependents(group.dependents(&self.layout)).await?;
        }
        Ok(())
    }

    async fn create_dependents(&self, dependents: Vec<Dependent>) -> KelvinResult<()> {
        for dependent in dependents {
            let target = dependent.object.target_dn()?;
            if self.client.exists(&target).await? {
                continue;
            }
            self.client.save(dependent.object).await?;
            debug!("Created {}", target);
        }
        Ok(())
    }

    async fn move_dependents(&self, old: Vec<Dependent>, new: Vec<Dependent>) -> KelvinResult<()> {
        for (old, new) in old.into_iter().zip(new).filter(|(o, _)| o.owned) {
            let old_target = old.object.target_dn()?;
            let new_target = new.object.target_dn()?;
            match self.client.get(&old_target).await? {
                Some(existing) => {
                    let mut updated = existing.clone();
                    updated.set_position(new.object.position());
                    for (property, value) in new.object.properties {
                        updated.set(property, value);
                    }
                    if updated != existing {
                        self.client.save(updated).await?;
                        debug!("Moved {} to {}", old_target, new_target);
                    }
                }
                None => {
                    if !self.client.exists(&new_target).await? {
                        self.client.save(new.object).await?;
                        debug!("Created {}", new_target);
                    }
                }
            }
        }
        Ok(())
    }

    /// Create the entity.
    ///
    /// Returns `Ok(false)` if an object already exists at its DN.
    pub async fn create<M: SchoolModel>(
        &self,
        entity: &mut M,
        options: CreateOptions,
    ) -> KelvinResult<bool> {
        self.run_pre(HookEvent::Create, options.phase, entity)?;
        entity.prepare();

        let target = entity.dn(&self.layout);
        if self.client.exists(&target).await? {
            info!("{} {} exists already", entity.kind(), target);
            return Ok(false);
        }
        if options.validate {
            self.validate(entity).await?;
        }
        self.ensure_groups(entity.implied_groups()).await?;

        let mut object = self
            .client
            .new_object(entity.object_type(), &entity.position(&self.layout));
        entity.write_to(&mut object, &self.layout)?;
        let saved = self.client.save(object).await?;
        self.create_dependents(entity.dependents(&self.layout)).await?;
        info!("Created {} {}", entity.kind(), target);

        let state = entity.state_mut();
        state.old_dn = saved.dn().map(str::to_string);
        state.invalidate();
        self.run_post(HookEvent::Create, options.phase, entity);
        Ok(true)
    }

    /// Write changed attributes, moving the object if its DN changed.
    ///
    /// Returns `Ok(false)` if the object does not exist, `Ok(true)` once the
    /// modification completed, whether or not anything changed.
    pub async fn modify<M: SchoolModel>(
        &self,
        entity: &mut M,
        options: ModifyOptions,
    ) -> KelvinResult<bool> {
        self.run_pre(HookEvent::Modify, options.phase, entity)?;
        entity.prepare();

        let old_dn = self.current_dn(entity);
        let Some(current) = self.client.get(&old_dn).await? else {
            info!("Cannot modify {}: no such object", old_dn);
            return Ok(false);
        };
        let state = entity.state_mut();
        state.old_dn = current.dn().map(str::to_string);
        state.cache(current.clone());

        if options.validate {
            self.validate(entity).await?;
        }
        self.ensure_groups(entity.implied_groups()).await?;

        let new_dn = entity.dn(&self.layout);
        let move_allowed = options
            .move_if_necessary
            .unwrap_or(entity.meta().allow_move);
        let needs_move = !dn::same(&new_dn, &old_dn);

        let mut object = if needs_move && move_allowed {
            self.do_move(entity, current).await?
        } else {
            if needs_move {
                info!("Not moving {} to {}: moves are disabled", old_dn, new_dn);
            }
            current
        };

        let before = object.clone();
        entity.write_to(&mut object, &self.layout)?;
        if needs_move && !move_allowed {
            let (property, _) = naming_attribute(entity.object_type());
            match before.get(property) {
                Some(value) => object.set(property, value.clone()),
                None => {
                    object.remove(property);
                }
            }
            object.set_position(before.position());
        }

        let final_dn = if object != before {
            let saved = self.client.save(object).await?;
            info!("Modified {} {}", entity.kind(), saved.dn().unwrap_or_default());
            saved.dn().map(str::to_string)
        } else {
            debug!("No changes for {}", before.dn().unwrap_or_default());
            before.dn().map(str::to_string)
        };

        let state = entity.state_mut();
        state.old_dn = final_dn;
        state.invalidate();
        self.run_post(HookEvent::Modify, options.phase, entity);
        Ok(true)
    }

    /// Move the entity to the DN computed from its current attributes.
    ///
    /// Models that do not allow moves are left in place and `Ok(false)` is
    /// returned.
    pub async fn move_entity<M: SchoolModel>(
        &self,
        entity: &mut M,
        phase: HookPhase,
    ) -> KelvinResult<bool> {
        if !entity.meta().allow_move {
            warn!("{} objects cannot be moved", entity.kind());
            return Ok(false);
        }
        self.run_pre(HookEvent::Move, phase, entity)?;
        entity.prepare();

        let old_dn = self.current_dn(entity);
        let Some(current) = self.client.get(&old_dn).await? else {
            info!("Cannot move {}: no such object", old_dn);
            return Ok(false);
        };
        if dn::same(&entity.dn(&self.layout), &old_dn) {
            debug!("{} is already in place", old_dn);
        } else {
            self.ensure_groups(entity.implied_groups()).await?;
            self.do_move(entity, current).await?;
        }
        entity.state_mut().invalidate();
        self.run_post(HookEvent::Move, phase, entity);
        Ok(true)
    }

    async fn do_move<M: SchoolModel>(
        &self,
        entity: &mut M,
        current: DirectoryObject,
    ) -> KelvinResult<DirectoryObject> {
        let old_dn = current.dn().unwrap_or_default().to_string();
        let stored = M::from_directory_object(&current, &self.layout)?;
        let old_school = stored.school().map(str::to_string);
        let new_school = entity.school().map(str::to_string);
        if let (Some(old_school), Some(new_school)) = (&old_school, &new_school) {
            if !old_school.eq_ignore_ascii_case(new_school) {
                debug!("School of {} changes from {} to {}", old_dn, old_school, new_school);
                entity.on_school_change(old_school, new_school);
                entity.prepare();
            }
        }

        let mut object = current;
        entity.write_to(&mut object, &self.layout)?;
        object.set_position(entity.position(&self.layout));
        let moved = self.client.save(object).await?;
        info!("Moved {} to {}", old_dn, moved.dn().unwrap_or_default());

        self.move_dependents(stored.dependents(&self.layout), entity.dependents(&self.layout))
            .await?;

        let state = entity.state_mut();
        state.old_dn = moved.dn().map(str::to_string);
        state.cache(moved.clone());
        Ok(moved)
    }

    /// Delete the entity and the objects it owns.
    ///
    /// Returns `Ok(false)` if nothing existed.
    pub async fn remove<M: SchoolModel>(
        &self,
        entity: &mut M,
        phase: HookPhase,
    ) -> KelvinResult<bool> {
        self.run_pre(HookEvent::Remove, phase, entity)?;
        let object_dn = self.current_dn(entity);
        let Some(current) = self.client.get(&object_dn).await? else {
            info!("Cannot remove {}: no such object", object_dn);
            return Ok(false);
        };

        let stored = M::from_directory_object(&current, &self.layout)?;
        for dependent in stored
            .dependents(&self.layout)
            .into_iter()
            .filter(|d| d.owned)
            .rev()
        {
            let target = dependent.object.target_dn()?;
            if self.client.delete(&target).await? {
                debug!("Removed {}", target);
            }
        }
        self.client.delete(&object_dn).await?;
        info!("Removed {} {}", entity.kind(), object_dn);

        let state = entity.state_mut();
        state.old_dn = None;
        state.invalidate();
        self.run_post(HookEvent::Remove, phase, entity);
        Ok(true)
    }
}
