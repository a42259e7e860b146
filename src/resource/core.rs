//! Core handler infrastructure
//!
//! This module contains the request and response types and the dispatcher
//! that routes a request to the handler of its resource.

use super::context::RequestContext;
use crate::directory::DirectoryClient;
use crate::error::KelvinResult;
use crate::model::SchoolDirectory;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Transport-agnostic handler for resource operations.
///
/// The handler turns [`ResourceRequest`]s into [`ResourceResponse`]s without
/// knowing about HTTP. Routing and framing are left to the caller.
pub struct KelvinHandler<D: DirectoryClient> {
    pub(super) directory: SchoolDirectory<D>,
}

/// Operations on resources, with the HTTP method they correspond to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceOperation {
    /// POST on the collection
    Create,
    /// GET on one resource
    Get,
    /// GET on the collection
    List,
    /// PUT on one resource
    Replace,
    /// PATCH on one resource
    Patch,
    /// DELETE on one resource
    Delete,
}

/// Resource collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Users,
    Schools,
    Classes,
    Workgroups,
    Roles,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Users => "users",
            ResourceKind::Schools => "schools",
            ResourceKind::Classes => "classes",
            ResourceKind::Workgroups => "workgroups",
            ResourceKind::Roles => "roles",
        };
        f.write_str(name)
    }
}

/// Filters for list operations.
///
/// `name` may contain `*` wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceQuery {
    pub name: Option<String>,
    pub record_uid: Option<String>,
    pub source_uid: Option<String>,
    /// Role token; only users holding it are listed.
    pub role: Option<String>,
}

/// Structured request for resource operations.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRequest {
    pub operation: ResourceOperation,
    pub resource: ResourceKind,
    /// Name of the targeted resource (username, school name, class name)
    pub id: Option<String>,
    /// School scope for classes, workgroups and user lists
    pub school: Option<String>,
    /// Payload for create, replace and patch
    pub data: Option<Value>,
    pub query: Option<ResourceQuery>,
    /// Request ID for tracing and correlation; generated when absent
    pub request_id: Option<String>,
}

impl ResourceRequest {
    pub fn new(operation: ResourceOperation, resource: ResourceKind) -> Self {
        Self {
            operation,
            resource,
            id: None,
            school: None,
            data: None,
            query: None,
            request_id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_school(mut self, school: impl Into<String>) -> Self {
        self.school = Some(school.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_query(mut self, query: ResourceQuery) -> Self {
        self.query = Some(query);
        self
    }
}

/// Structured response from resource operations.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceResponse {
    /// HTTP status code
    pub status: u16,
    /// JSON body; `Null` for 204
    pub body: Value,
    pub request_id: String,
}

impl ResourceResponse {
    pub fn new(status: u16, body: Value, request_id: impl Into<String>) -> Self {
        Self {
            status,
            body,
            request_id: request_id.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl<D: DirectoryClient> KelvinHandler<D> {
    pub fn new(directory: SchoolDirectory<D>) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &SchoolDirectory<D> {
        &self.directory
    }

    /// Handle a structured request.
    ///
    /// This is the main entry point that dispatches to the handler of the
    /// requested resource. Errors are turned into error responses.
    pub async fn handle(&self, request: ResourceRequest) -> ResourceResponse {
        let request_id = request
            .request_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        info!(
            "Handling {:?} on {} (request: '{}')",
            request.operation, request.resource, request_id
        );

        let context = RequestContext::new(request_id.clone(), &self.directory.config().base_url);
        let result = self.dispatch(request, &context).await;

        match &result {
            Ok(response) => {
                debug!(
                    "Request completed with status {} (request: '{}')",
                    response.status, request_id
                );
            }
            Err(e) => {
                warn!("Request failed: {} (request: '{}')", e, request_id);
            }
        }

        result.unwrap_or_else(|e| super::errors::create_error_response(&e, &request_id))
    }

    async fn dispatch(
        &self,
        request: ResourceRequest,
        context: &RequestContext,
    ) -> KelvinResult<ResourceResponse> {
        match request.resource {
            ResourceKind::Users => super::handlers::users::handle(self, request, context).await,
            ResourceKind::Schools => super::handlers::schools::handle(self, request, context).await,
            ResourceKind::Classes | ResourceKind::Workgroups => {
                super::handlers::groups::handle(self, request, context).await
            }
            ResourceKind::Roles => super::handlers::roles::handle(request, context),
        }
    }
}
