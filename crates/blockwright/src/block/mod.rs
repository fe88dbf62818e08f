//! Block templates, their derived tables and constructed instances.
//!
//! - [`Template`] / [`TemplateBuilder`]: declaration and composition
//! - [`Tables`]: global, per-sub-component and translation views
//! - [`Call`] / [`Instance`]: construction and the resulting tree
//! - [`Connection`] / [`Repeat`]: resolved block metadata

mod description;
mod forward;
mod instance;
mod repr;
mod spec;
mod tables;
mod template;

pub use description::{Connection, ConnectionKind, FieldSpec, Group, Reduction, Repeat};
pub use forward::reduce;
pub use instance::{Call, Instance, Node};
pub use spec::{ArgValue, ComponentSpec, SubComponent};
pub use tables::{SubTable, Tables, Translation};
pub use template::{Template, TemplateBuilder};
