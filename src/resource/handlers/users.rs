//! User handlers.
//!
//! Users are addressed by username. A role change in PUT or PATCH goes
//! through the role converter first, with the payload's classes as
//! additional classes; all other changes, including school changes, are
//! written by `modify` with moves enabled.

use super::{required_id, to_body};
use crate::directory::{DirectoryClient, DirectoryError, Filter};
use crate::error::{KelvinError, KelvinResult};
use crate::model::{
    CreateOptions, HookPhase, ModifyOptions, SchoolDirectory, SchoolModel, User, convert,
};
use crate::resource::context::RequestContext;
use crate::resource::core::{
    KelvinHandler, ResourceOperation, ResourceQuery, ResourceRequest, ResourceResponse,
};
use crate::resource::errors::{CREATED, NO_CONTENT, OK};
use crate::resource::payload::{UserPayload, parse};
use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;

pub async fn handle<D: DirectoryClient>(
    handler: &KelvinHandler<D>,
    request: ResourceRequest,
    context: &RequestContext,
) -> KelvinResult<ResourceResponse> {
    let directory = handler.directory();
    match request.operation {
        ResourceOperation::Create => create(directory, request, context).await,
        ResourceOperation::Get => {
            let user = load(directory, required_id(&request)?).await?;
            respond(OK, &user, context)
        }
        ResourceOperation::List => list(directory, request, context).await,
        ResourceOperation::Replace => update(directory, request, context, true).await,
        ResourceOperation::Patch => update(directory, request, context, false).await,
        ResourceOperation::Delete => {
            let mut user = load(directory, required_id(&request)?).await?;
            directory.remove(&mut user, HookPhase::Idle).await?;
            Ok(ResourceResponse::new(NO_CONTENT, Value::Null, &context.request_id))
        }
    }
}

async fn load<D: DirectoryClient>(directory: &SchoolDirectory<D>, name: &str) -> KelvinResult<User> {
    directory
        .find_user(name)
        .await?
        .ok_or_else(|| KelvinError::no_object(format!("uid={}", name)))
}

/// Reload the stored state, keeping the extra properties that were written.
async fn reload<D: DirectoryClient>(directory: &SchoolDirectory<D>, user: &User) -> KelvinResult<User> {
    let mut stored = directory.get_user(&directory.current_dn(user), None).await?;
    *stored.udm_properties_mut() = user.udm_properties().clone();
    Ok(stored)
}

fn respond(status: u16, user: &User, context: &RequestContext) -> KelvinResult<ResourceResponse> {
    let body = to_body(&UserPayload::from_user(user, context))?;
    Ok(ResourceResponse::new(status, body, &context.request_id))
}

async fn create<D: DirectoryClient>(
    directory: &SchoolDirectory<D>,
    request: ResourceRequest,
    context: &RequestContext,
) -> KelvinResult<ResourceResponse> {
    let payload: UserPayload = parse(request.data)?;
    let mut user = payload.to_user()?;
    if let Some(name) = user.name() {
        if let Some(existing) = directory.find_user(name).await? {
            return Err(KelvinError::Directory(DirectoryError::already_exists(
                directory.current_dn(&existing),
            )));
        }
    }
    if !directory.create(&mut user, CreateOptions::default()).await? {
        return Err(KelvinError::Directory(DirectoryError::already_exists(
            directory.current_dn(&user),
        )));
    }
    let stored = reload(directory, &user).await?;
    respond(CREATED, &stored, context)
}

async fn list<D: DirectoryClient>(
    directory: &SchoolDirectory<D>,
    request: ResourceRequest,
    context: &RequestContext,
) -> KelvinResult<ResourceResponse> {
    let query = request.query.unwrap_or_default();
    let mut filter = Filter::everything();
    let ResourceQuery {
        name,
        record_uid,
        source_uid,
        role,
    } = query;
    if let Some(name) = name {
        filter = filter.and(Filter::wildcard("username", &name));
    }
    if let Some(record_uid) = record_uid {
        filter = filter.and(Filter::equal("ucsschoolRecordUID", record_uid));
    }
    if let Some(source_uid) = source_uid {
        filter = filter.and(Filter::equal("ucsschoolSourceUID", source_uid));
    }

    let mut users = directory.users(request.school.as_deref(), &filter).await?;
    if let Some(role) = role {
        users.retain(|user| user.roles().contains(&role.as_str()));
    }
    debug!("Listing {} users", users.len());

    let body = users
        .iter()
        .map(|user| to_body(&UserPayload::from_user(user, context)))
        .collect::<KelvinResult<Vec<Value>>>()?;
    Ok(ResourceResponse::new(OK, Value::Array(body), &context.request_id))
}

async fn update<D: DirectoryClient>(
    directory: &SchoolDirectory<D>,
    request: ResourceRequest,
    context: &RequestContext,
    replace: bool,
) -> KelvinResult<ResourceResponse> {
    let name = required_id(&request)?.to_string();
    let payload: UserPayload = parse(request.data)?;
    let mut user = load(directory, &name).await?;

    if let Some(target) = payload.role()? {
        if !target.same_roles(user.role()) {
            // The conversion is written at once; reject the request before that.
            let mut candidate = user.clone().with_role(target);
            if !target.can_hold_classes() {
                candidate.set_school_classes(BTreeMap::new());
            }
            payload.apply(&mut candidate, replace);
            candidate.prepare();
            directory.validate(&mut candidate).await?;

            let classes = payload.school_classes.clone().unwrap_or_default();
            user = convert(directory, &user, target, &classes).await?;
        }
    }

    payload.apply(&mut user, replace);
    if !directory.modify(&mut user, ModifyOptions::default()).await? {
        return Err(KelvinError::no_object(directory.current_dn(&user)));
    }
    let stored = reload(directory, &user).await?;
    respond(OK, &stored, context)
}
