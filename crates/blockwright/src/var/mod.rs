//! Deferred variables and argument descriptors.
//!
//! - [`Var`]: a value resolved per construction call from a [`Scope`](crate::Scope)
//! - [`Decorator`]: transforms applied to a resolved value
//! - [`ArgDescriptor`]: normalized metadata of one sub-component parameter

mod decorator;
mod description;
mod variable;

pub use decorator::{Decorator, DecoratorFn};
pub use description::{describe_var, ArgDescriptor, ArgKind};
pub use variable::{Activation, Context, Lookup, LookupFn, Request, Var};
