//! REST resource layer.
//!
//! Maps structured requests on the `users`, `schools`, `classes`,
//! `workgroups` and `roles` collections onto the school model lifecycle.
//! HTTP routing, authentication and framing are left to the embedding
//! server; [`KelvinHandler::handle`] takes a [`ResourceRequest`] and always
//! produces a [`ResourceResponse`], turning errors into status codes.
//!
//! ```rust,no_run
//! use kelvin_school::directory::InMemoryDirectory;
//! use kelvin_school::model::SchoolDirectory;
//! use kelvin_school::resource::{KelvinHandler, ResourceKind, ResourceOperation, ResourceRequest};
//! use kelvin_school::KelvinConfig;
//!
//! # async fn example() {
//! let directory = SchoolDirectory::new(InMemoryDirectory::default(), KelvinConfig::default());
//! let handler = KelvinHandler::new(directory);
//! let response = handler
//!     .handle(ResourceRequest::new(ResourceOperation::List, ResourceKind::Roles))
//!     .await;
//! assert_eq!(response.status, 200);
//! # }
//! ```

pub mod context;
pub mod core;
pub mod errors;
pub mod handlers;
pub mod payload;

pub use context::{RequestContext, url_tail};
pub use core::{
    KelvinHandler, ResourceKind, ResourceOperation, ResourceQuery, ResourceRequest,
    ResourceResponse,
};
pub use errors::{create_error_response, status_for};
pub use payload::{GroupPayload, RolePayload, SchoolPayload, UserPayload};
