//! Change the role of an existing user in place.
//!
//! The conversion is a single directory write: capability flags, container,
//! group memberships and role strings change together. All preconditions are
//! checked before that write, so a failed conversion leaves the directory
//! untouched.

use super::base::{SchoolModel, parse_role_strings};
use super::group::full_name;
use super::lifecycle::SchoolDirectory;
use super::role::{RoleString, UserRole};
use super::user::User;
use crate::directory::DirectoryClient;
use crate::error::{KelvinError, KelvinResult};
use log::{debug, info};
use std::collections::BTreeMap;

/// Convert `user` to `target`, returning the reloaded user.
///
/// `additional_classes` (school → relative class names) are added to the
/// user's classes; they must exist already.
pub async fn convert<D: DirectoryClient>(
    directory: &SchoolDirectory<D>,
    user: &User,
    target: UserRole,
    additional_classes: &BTreeMap<String, Vec<String>>,
) -> KelvinResult<User> {
    let Some(user_dn) = user.state().old_dn.clone() else {
        return Err(KelvinError::role_conversion(format!(
            "User {:?} must be saved before its role can change.",
            user.name().unwrap_or_default()
        )));
    };
    if user.role() == UserRole::ExamStudent {
        return Err(KelvinError::role_conversion(format!(
            "Exam users cannot be converted ({}).",
            user_dn
        )));
    }
    if target == UserRole::ExamStudent {
        return Err(KelvinError::role_conversion(
            "Users cannot be converted to exam users.",
        ));
    }
    if user.role().same_roles(target) {
        debug!("{} already has the roles of {}", user_dn, target);
        return Ok(user.clone());
    }

    let schools = user.schools();
    let foreign: Vec<&String> = additional_classes
        .keys()
        .filter(|school| !schools.iter().any(|s| s.eq_ignore_ascii_case(school)))
        .collect();
    if !foreign.is_empty() {
        return Err(KelvinError::role_conversion(format!(
            "Classes can only be added in schools of {}; {:?} are not among {:?}.",
            user_dn, foreign, schools
        )));
    }

    let mut classes = user.school_classes();
    for (school, names) in additional_classes {
        let merged = classes.entry(school.clone()).or_default();
        for name in names {
            if !merged.iter().any(|n| full_name(school, n) == full_name(school, name)) {
                merged.push(name.clone());
            }
        }
    }

    if target.is_student() {
        let missing: Vec<&String> = schools
            .iter()
            .filter(|school| {
                !classes
                    .iter()
                    .any(|(s, names)| s.eq_ignore_ascii_case(school) && !names.is_empty())
            })
            .collect();
        if !missing.is_empty() {
            return Err(KelvinError::role_conversion(format!(
                "Students need a school class in every school; none given for {:?}.",
                missing
            )));
        }
    }

    let layout = directory.layout();
    for (school, names) in additional_classes {
        for name in names {
            let class_dn = layout.class_dn(school, &full_name(school, name));
            if !directory.client().exists(&class_dn).await? {
                return Err(KelvinError::role_conversion(format!(
                    "School class {:?} does not exist in school {:?}.",
                    name, school
                )));
            }
        }
    }

    let mut object = directory
        .client()
        .get(&user_dn)
        .await?
        .ok_or_else(|| KelvinError::no_object(&user_dn))?;

    let mut converted = user.clone().with_role(target);
    if target.can_hold_classes() {
        converted.set_school_classes(classes);
    } else {
        converted.set_school_classes(BTreeMap::new());
    }

    let removal = user.role().removal_roles();
    let mut roles: Vec<String> = user
        .role_strings()
        .into_iter()
        .filter(|raw| match raw.parse::<RoleString>() {
            Ok(role) => {
                !(role.is_school_context() && removal.iter().any(|r| *r == role.role))
            }
            Err(_) => true,
        })
        .collect();
    let kept = parse_role_strings(&roles);
    for school in &schools {
        for default in target.default_role_strings(school) {
            if !kept.iter().any(|r| r.matches(&default)) {
                roles.push(default.to_string());
            }
        }
    }
    converted.set_role_strings(roles);

    converted.write_to(&mut object, layout)?;
    object.set_position(converted.position(layout));
    let saved = directory.client().save(object).await?;
    let new_dn = saved.dn().unwrap_or_default().to_string();
    info!("Converted {} from {} to {} ({})", user_dn, user.role(), target, new_dn);

    directory.get_user(&new_dn, Some(target)).await
}
