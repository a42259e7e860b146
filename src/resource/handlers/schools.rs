//! School handlers.

use super::{required_id, to_body};
use crate::directory::{DirectoryClient, DirectoryError, Filter, OU_TYPE};
use crate::error::{KelvinError, KelvinResult, ValidationError};
use crate::model::{CreateOptions, HookPhase, ModifyOptions, School, SchoolDirectory, SchoolModel};
use crate::resource::context::RequestContext;
use crate::resource::core::{KelvinHandler, ResourceOperation, ResourceRequest, ResourceResponse};
use crate::resource::errors::{CREATED, NO_CONTENT, OK};
use crate::resource::payload::{SchoolPayload, parse};
use serde_json::Value;

pub async fn handle<D: DirectoryClient>(
    handler: &KelvinHandler<D>,
    request: ResourceRequest,
    context: &RequestContext,
) -> KelvinResult<ResourceResponse> {
    let directory = handler.directory();
    match request.operation {
        ResourceOperation::Create => {
            let payload: SchoolPayload = parse(request.data)?;
            let mut school = payload.to_school()?;
            if !directory.create(&mut school, CreateOptions::default()).await? {
                return Err(KelvinError::Directory(DirectoryError::already_exists(
                    directory.current_dn(&school),
                )));
            }
            let stored = load(directory, school.name().unwrap_or_default()).await?;
            respond(CREATED, &stored, context)
        }
        ResourceOperation::Get => {
            let school = load(directory, required_id(&request)?).await?;
            respond(OK, &school, context)
        }
        ResourceOperation::List => {
            let filter = match request.query.and_then(|q| q.name) {
                Some(name) => Filter::wildcard("name", &name),
                None => Filter::everything(),
            };
            let schools: Vec<School> = directory
                .search(OU_TYPE, directory.layout().base(), &filter)
                .await?;
            let body = schools
                .iter()
                .map(|school| to_body(&SchoolPayload::from_school(school, context)))
                .collect::<KelvinResult<Vec<Value>>>()?;
            Ok(ResourceResponse::new(OK, Value::Array(body), &context.request_id))
        }
        ResourceOperation::Replace | ResourceOperation::Patch => {
            let replace = request.operation == ResourceOperation::Replace;
            let name = required_id(&request)?.to_string();
            let payload: SchoolPayload = parse(request.data)?;
            if let Some(new_name) = &payload.name {
                if !new_name.eq_ignore_ascii_case(&name) {
                    return Err(ValidationError::single("name", "Schools cannot be renamed.").into());
                }
            }
            let mut school = load(directory, &name).await?;
            payload.apply(&mut school, replace);
            directory.modify(&mut school, ModifyOptions::default()).await?;
            let stored = load(directory, &name).await?;
            respond(OK, &stored, context)
        }
        ResourceOperation::Delete => {
            let mut school = load(directory, required_id(&request)?).await?;
            directory.remove(&mut school, HookPhase::Idle).await?;
            Ok(ResourceResponse::new(NO_CONTENT, Value::Null, &context.request_id))
        }
    }
}

async fn load<D: DirectoryClient>(directory: &SchoolDirectory<D>, name: &str) -> KelvinResult<School> {
    directory.from_dn(&directory.layout().school_dn(name)).await
}

fn respond(status: u16, school: &School, context: &RequestContext) -> KelvinResult<ResourceResponse> {
    let body = to_body(&SchoolPayload::from_school(school, context))?;
    Ok(ResourceResponse::new(status, body, &context.request_id))
}
