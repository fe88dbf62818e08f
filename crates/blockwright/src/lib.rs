//! Blockwright
//!
//! Declarative block templates for neural-network architectures.
//!
//! A [`Template`] is a named tree of sub-components (leaf factories, nested
//! templates, or variables that resolve to either). Arguments may be literal
//! values or deferred [`Var`]s, resolved per construction call against the
//! keyword arguments and defaults of the enclosing [`Scope`]. Instantiating
//! a template with a [`Call`] yields an [`Instance`] tree.
//!
//! ```
//! use blockwright::{Call, Registry, Template, Value, Var};
//!
//! let registry = Registry::with_builtin_layers();
//! let conv = registry.leaf("Conv2d").unwrap().clone();
//! let act = registry.leaf("ReLU").unwrap().clone();
//!
//! let unit = Template::builder("Unit")
//!     .component("conv", conv)
//!     .component("act", act)
//!     .arg("out_channels", Var::kw("width"))
//!     .default("in_channels", 3)
//!     .build()
//!     .unwrap();
//!
//! let instance = unit.build(&Call::new().kwarg("width", 32)).unwrap();
//! let args = instance.child("conv").and_then(|c| c.arguments()).unwrap();
//! assert_eq!(args.get("out_channels"), Some(&Value::Int(32)));
//! ```

pub mod block;
pub mod config;
pub mod error;
pub mod factory;
pub mod lookup;
pub mod registry;
pub mod scope;
pub mod value;
pub mod var;

pub use block::{ArgValue, Call, ComponentSpec, Instance, Node, SubComponent, Template, TemplateBuilder};
pub use error::{Error, Result};
pub use factory::{bind_arguments, Layer, LayerFactory, LeafFactory, Module, ParamKind, Parameter};
pub use registry::Registry;
pub use scope::Scope;
pub use value::{Component, Object, Value, ValueMap};
pub use var::{describe_var, Activation, ArgDescriptor, ArgKind, Context, Decorator, Lookup, Request, Var};
