//! Error responses.
//!
//! Every [`KelvinError`] maps to a fixed status code:
//!
//! | error | status |
//! |---|---|
//! | missing object | 404 |
//! | existing object, unique id taken, wrong model | 409 |
//! | validation, conversion precondition, rejected properties, hook | 400 |
//! | malformed payload | 422 |
//! | anything else | 500 |

use super::core::ResourceResponse;
use crate::directory::DirectoryError;
use crate::error::KelvinError;
use serde_json::{Value, json};

pub const OK: u16 = 200;
pub const CREATED: u16 = 201;
pub const NO_CONTENT: u16 = 204;
pub const BAD_REQUEST: u16 = 400;
pub const NOT_FOUND: u16 = 404;
pub const METHOD_NOT_ALLOWED: u16 = 405;
pub const CONFLICT: u16 = 409;
pub const UNPROCESSABLE_ENTITY: u16 = 422;
pub const INTERNAL_SERVER_ERROR: u16 = 500;

/// Status code for an error.
pub fn status_for(error: &KelvinError) -> u16 {
    match error {
        KelvinError::NoObject { .. } => NOT_FOUND,
        KelvinError::Directory(DirectoryError::NoObject { .. }) => NOT_FOUND,
        KelvinError::Directory(DirectoryError::AlreadyExists { .. })
        | KelvinError::UniqueId { .. }
        | KelvinError::WrongModel { .. } => CONFLICT,
        KelvinError::Validation(_)
        | KelvinError::RoleConversion { .. }
        | KelvinError::UdmProperties { .. }
        | KelvinError::Hook { .. } => BAD_REQUEST,
        KelvinError::Json(_) | KelvinError::InvalidRequest { .. } => UNPROCESSABLE_ENTITY,
        _ => INTERNAL_SERVER_ERROR,
    }
}

/// Create an error response from a KelvinError.
pub fn create_error_response(error: &KelvinError, request_id: &str) -> ResourceResponse {
    let status = status_for(error);
    let mut body = match error {
        KelvinError::Validation(errors) => json!({
            "detail": "Validation error",
            "errors": errors.errors(),
        }),
        _ if status == INTERNAL_SERVER_ERROR => json!({
            "detail": format!("Internal error (request {})", request_id),
        }),
        other => json!({ "detail": other.to_string() }),
    };
    if let Value::Object(map) = &mut body {
        map.insert("request_id".to_string(), Value::String(request_id.to_string()));
    }
    ResourceResponse::new(status, body, request_id)
}

/// Response for an operation the resource does not support.
pub fn method_not_allowed(operation: &str, resource: &str, request_id: &str) -> ResourceResponse {
    ResourceResponse::new(
        METHOD_NOT_ALLOWED,
        json!({
            "detail": format!("{} is not supported on {}", operation, resource),
            "request_id": request_id,
        }),
        request_id,
    )
}
