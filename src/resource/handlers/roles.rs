//! The read-only roles collection.

use super::{required_id, to_body};
use crate::error::{KelvinError, KelvinResult};
use crate::resource::context::RequestContext;
use crate::resource::core::{ResourceOperation, ResourceRequest, ResourceResponse};
use crate::resource::errors::{OK, method_not_allowed};
use crate::resource::payload::RolePayload;

pub fn handle(request: ResourceRequest, context: &RequestContext) -> KelvinResult<ResourceResponse> {
    match request.operation {
        ResourceOperation::List => {
            let body = to_body(&RolePayload::all(context))?;
            Ok(ResourceResponse::new(OK, body, &context.request_id))
        }
        ResourceOperation::Get => {
            let name = required_id(&request)?;
            let role = RolePayload::all(context)
                .into_iter()
                .find(|role| role.name == name)
                .ok_or_else(|| KelvinError::no_object(format!("role {}", name)))?;
            Ok(ResourceResponse::new(OK, to_body(&role)?, &context.request_id))
        }
        other => Ok(method_not_allowed(
            &format!("{:?}", other),
            &request.resource.to_string(),
            &context.request_id,
        )),
    }
}
