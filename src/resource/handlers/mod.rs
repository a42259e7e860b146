//! Handlers per resource collection.
//!
//! Each handler takes the request, performs the operation through the
//! [`SchoolDirectory`](crate::model::SchoolDirectory) and builds the success
//! response. Errors are returned to the dispatcher, which maps them to
//! status codes.

pub mod groups;
pub mod roles;
pub mod schools;
pub mod users;

use super::core::ResourceRequest;
use crate::error::{KelvinError, KelvinResult};
use serde::Serialize;
use serde_json::Value;

/// The resource id, required for single-resource operations.
pub(super) fn required_id(request: &ResourceRequest) -> KelvinResult<&str> {
    request.id.as_deref().ok_or_else(|| {
        KelvinError::invalid_request(format!(
            "Missing id for {:?} on {}",
            request.operation, request.resource
        ))
    })
}

pub(super) fn to_body<T: Serialize>(value: &T) -> KelvinResult<Value> {
    Ok(serde_json::to_value(value)?)
}
