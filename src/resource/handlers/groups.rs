//! Class and workgroup handlers.
//!
//! Groups are addressed by school and relative name (`OU1`, `1a`). Members
//! are given as user URLs or usernames and stored as user DNs.

use super::{required_id, to_body};
use crate::directory::{DirectoryClient, DirectoryError, Filter};
use crate::error::{KelvinError, KelvinResult, ValidationError};
use crate::model::group::full_name;
use crate::model::{
    CreateOptions, GroupKind, HookPhase, ModifyOptions, SchoolDirectory, SchoolGroup,
};
use crate::resource::context::RequestContext;
use crate::resource::core::{
    KelvinHandler, ResourceKind, ResourceOperation, ResourceRequest, ResourceResponse,
};
use crate::resource::errors::{CREATED, NO_CONTENT, OK};
use crate::resource::payload::{GroupPayload, parse};
use serde_json::Value;

/// Group kind and URL collection of a resource.
fn collection(resource: ResourceKind) -> (GroupKind, &'static str) {
    match resource {
        ResourceKind::Workgroups => (GroupKind::WorkGroup, "workgroups"),
        _ => (GroupKind::SchoolClass, "classes"),
    }
}

pub async fn handle<D: DirectoryClient>(
    handler: &KelvinHandler<D>,
    request: ResourceRequest,
    context: &RequestContext,
) -> KelvinResult<ResourceResponse> {
    let directory = handler.directory();
    let (kind, name) = collection(request.resource);
    match request.operation {
        ResourceOperation::Create => create(directory, kind, name, request, context).await,
        ResourceOperation::Get => {
            let school = required_school(&request)?;
            let group = load(directory, kind, school, required_id(&request)?).await?;
            respond(OK, &group, name, context)
        }
        ResourceOperation::List => {
            let school = required_school(&request)?;
            let filter = match request.query.as_ref().and_then(|q| q.name.as_deref()) {
                Some(pattern) => Filter::wildcard("name", &full_name(school, pattern)),
                None => Filter::everything(),
            };
            let groups = directory.groups(kind, school, &filter).await?;
            let body = groups
                .iter()
                .map(|group| to_body(&GroupPayload::from_group(group, name, context)))
                .collect::<KelvinResult<Vec<Value>>>()?;
            Ok(ResourceResponse::new(OK, Value::Array(body), &context.request_id))
        }
        ResourceOperation::Replace => update(directory, kind, name, request, context, true).await,
        ResourceOperation::Patch => update(directory, kind, name, request, context, false).await,
        ResourceOperation::Delete => {
            let school = required_school(&request)?;
            let mut group = load(directory, kind, school, required_id(&request)?).await?;
            directory.remove(&mut group, HookPhase::Idle).await?;
            Ok(ResourceResponse::new(NO_CONTENT, Value::Null, &context.request_id))
        }
    }
}

fn required_school(request: &ResourceRequest) -> KelvinResult<&str> {
    request.school.as_deref().ok_or_else(|| {
        KelvinError::invalid_request(format!("Missing school for {}", request.resource))
    })
}

fn group_dn<D: DirectoryClient>(
    directory: &SchoolDirectory<D>,
    kind: GroupKind,
    school: &str,
    name: &str,
) -> String {
    let name = full_name(school, name);
    match kind {
        GroupKind::SchoolClass => directory.layout().class_dn(school, &name),
        GroupKind::WorkGroup => directory.layout().workgroup_dn(school, &name),
    }
}

async fn load<D: DirectoryClient>(
    directory: &SchoolDirectory<D>,
    kind: GroupKind,
    school: &str,
    name: &str,
) -> KelvinResult<SchoolGroup> {
    let object_dn = group_dn(directory, kind, school, name);
    let group: SchoolGroup = directory.from_dn(&object_dn).await?;
    if group.kind() != kind {
        return Err(KelvinError::no_object(object_dn));
    }
    Ok(group)
}

fn respond(
    status: u16,
    group: &SchoolGroup,
    collection: &str,
    context: &RequestContext,
) -> KelvinResult<ResourceResponse> {
    let body = to_body(&GroupPayload::from_group(group, collection, context))?;
    Ok(ResourceResponse::new(status, body, &context.request_id))
}

/// DNs of the listed users; unknown usernames are a validation error.
async fn resolve_members<D: DirectoryClient>(
    directory: &SchoolDirectory<D>,
    usernames: &[String],
) -> KelvinResult<Vec<String>> {
    let mut members = Vec::with_capacity(usernames.len());
    let mut errors = ValidationError::default();
    for username in usernames {
        match directory.find_user(username).await? {
            Some(user) => members.push(directory.current_dn(&user)),
            None => errors.add("users", format!("User {:?} does not exist.", username)),
        }
    }
    errors.into_result()?;
    Ok(members)
}

async fn create<D: DirectoryClient>(
    directory: &SchoolDirectory<D>,
    kind: GroupKind,
    collection: &str,
    request: ResourceRequest,
    context: &RequestContext,
) -> KelvinResult<ResourceResponse> {
    let payload: GroupPayload = parse(request.data)?;
    let school = request
        .school
        .clone()
        .or_else(|| payload.school_name().map(str::to_string))
        .ok_or_else(|| KelvinError::invalid_request("Field 'school' is required"))?;
    let name = payload
        .name
        .as_deref()
        .ok_or_else(|| KelvinError::invalid_request("Field 'name' is required"))?;

    let mut group = SchoolGroup::new(kind, school.as_str(), name);
    payload.apply(&mut group, true);
    if let Some(usernames) = payload.usernames() {
        group.set_users(resolve_members(directory, &usernames).await?);
    }
    if !directory.create(&mut group, CreateOptions::default()).await? {
        return Err(KelvinError::Directory(DirectoryError::already_exists(
            directory.current_dn(&group),
        )));
    }
    let stored: SchoolGroup = directory.from_dn(&directory.current_dn(&group)).await?;
    respond(CREATED, &stored, collection, context)
}

async fn update<D: DirectoryClient>(
    directory: &SchoolDirectory<D>,
    kind: GroupKind,
    collection: &str,
    request: ResourceRequest,
    context: &RequestContext,
    replace: bool,
) -> KelvinResult<ResourceResponse> {
    let school = required_school(&request)?.to_string();
    let name = required_id(&request)?.to_string();
    let payload: GroupPayload = parse(request.data)?;
    let mut group = load(directory, kind, &school, &name).await?;

    payload.apply(&mut group, replace);
    match payload.usernames() {
        Some(usernames) => group.set_users(resolve_members(directory, &usernames).await?),
        None if replace => group.set_users(Vec::new()),
        None => {}
    }
    if !directory.modify(&mut group, ModifyOptions::default()).await? {
        return Err(KelvinError::no_object(directory.current_dn(&group)));
    }
    let stored: SchoolGroup = directory.from_dn(&directory.current_dn(&group)).await?;
    respond(OK, &stored, collection, context)
}
