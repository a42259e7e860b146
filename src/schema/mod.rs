//! Attribute descriptors, validation and marshaling.
//!
//! Each school model declares its fields once as a static table of
//! [`AttributeDescriptor`]s. The table is used to:
//!
//! - validate a model's [`Attributes`], collecting every error
//! - write mapped attributes onto a [`DirectoryObject`](crate::directory::DirectoryObject)
//! - read them back when a model is loaded
//!
//! # Examples
//!
//! ```rust
//! use kelvin_school::schema::{AttributeDescriptor, Attributes, Syntax, validate_attributes};
//! use serde_json::json;
//!
//! static FIELDS: &[AttributeDescriptor] = &[
//!     AttributeDescriptor::new("name", "Username", Syntax::UserName).udm("username").required(),
//!     AttributeDescriptor::new("email", "Email", Syntax::Email).udm("mailPrimaryAddress"),
//! ];
//!
//! let mut attributes = Attributes::new();
//! attributes.set("email", json!("not-an-address"));
//! let error = validate_attributes(FIELDS, &attributes).unwrap_err();
//! assert_eq!(error.errors().len(), 2);
//! ```

pub mod attributes;
pub mod types;
pub mod validation;

#[cfg(test)]
mod tests;

pub use attributes::{Attributes, read_attributes, write_attributes};
pub use types::{AttributeDescriptor, Syntax, is_empty};
pub use validation::{check_syntax, validate_attributes};
