//! Declarative documents.
//!
//! Templates and construction calls can be written as YAML documents and
//! loaded against a [`Registry`](crate::Registry) of named components.
//!
//! # File Format
//!
//! ```yaml
//! apiVersion: blockwright/v1
//! kind: Template
//!
//! metadata:
//!   name: Stage
//!
//! # Repeat the declared components three times, two per weight group
//! repeat_count: {var: {name: depth, context: kwargs, default: 3}}
//! repeat_tied: 2
//!
//! components:
//!   body:
//!     template: Bottleneck
//!   head:
//!     var: {name: head, context: kwargs, default: {component: Identity}}
//! ```
//!
//! A `kind: Build` document names a registered template together with the
//! keyword arguments, defaults and connection/repeat descriptions of one
//! construction call.

mod convert;
mod document;

#[cfg(test)]
mod tests;

pub use convert::{to_activation, to_arg, to_map, to_value, to_var};
pub use document::*;
