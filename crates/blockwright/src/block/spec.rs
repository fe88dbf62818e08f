//! Sub-component specifications.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::Template;
use crate::factory::LeafFactory;
use crate::value::{Component, Value, ValueMap};
use crate::var::Var;

/// A literal value or a deferred variable.
#[derive(Debug, Clone)]
pub enum ArgValue {
    Literal(Value),
    Var(Var),
}

impl ArgValue {
    pub fn as_var(&self) -> Option<&Var> {
        match self {
            ArgValue::Var(var) => Some(var),
            ArgValue::Literal(_) => None,
        }
    }

    pub fn is_var(&self) -> bool {
        matches!(self, ArgValue::Var(_))
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Literal(value) => write!(f, "{value}"),
            ArgValue::Var(var) => write!(f, "{var}"),
        }
    }
}

impl From<Var> for ArgValue {
    fn from(var: Var) -> Self {
        ArgValue::Var(var)
    }
}

impl From<Value> for ArgValue {
    fn from(value: Value) -> Self {
        ArgValue::Literal(value)
    }
}

macro_rules! literal_arg {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ArgValue {
                fn from(v: $ty) -> Self {
                    ArgValue::Literal(Value::from(v))
                }
            }
        )*
    };
}

literal_arg!(bool, i64, i32, usize, f64, &str, String, ValueMap, Vec<Value>, Component);

/// One named slot of a template.
#[derive(Clone)]
pub enum SubComponent {
    /// Nested template.
    Template(Arc<Template>),
    /// Leaf factory.
    Leaf(Arc<dyn LeafFactory>),
    /// Variable resolving to a component at construction time.
    Var(Var),
}

impl SubComponent {
    /// Short description used in logs and errors.
    pub fn describe(&self) -> String {
        match self {
            SubComponent::Template(template) => format!("template {}", template.name()),
            SubComponent::Leaf(factory) => format!("leaf {}", factory.name()),
            SubComponent::Var(var) => format!("{var}"),
        }
    }
}

impl fmt::Debug for SubComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

impl From<Arc<Template>> for SubComponent {
    fn from(template: Arc<Template>) -> Self {
        SubComponent::Template(template)
    }
}

impl From<Arc<dyn LeafFactory>> for SubComponent {
    fn from(factory: Arc<dyn LeafFactory>) -> Self {
        SubComponent::Leaf(factory)
    }
}

impl From<Var> for SubComponent {
    fn from(var: Var) -> Self {
        SubComponent::Var(var)
    }
}

impl From<Component> for SubComponent {
    fn from(component: Component) -> Self {
        match component {
            Component::Leaf(factory) => SubComponent::Leaf(factory),
            Component::Template(template) => SubComponent::Template(template),
        }
    }
}

/// A sub-component together with its per-component overrides.
///
/// `args` replaces individual parameters with a literal default or a
/// variable; `defaults` changes the default of plain parameters.
#[derive(Debug, Clone)]
pub struct ComponentSpec {
    pub kind: SubComponent,
    pub args: IndexMap<String, ArgValue>,
    pub defaults: ValueMap,
}

impl ComponentSpec {
    pub fn new(kind: impl Into<SubComponent>) -> Self {
        Self {
            kind: kind.into(),
            args: IndexMap::new(),
            defaults: ValueMap::new(),
        }
    }

    /// Overrides one parameter.
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    /// Sets the default of one parameter.
    pub fn default(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }
}

impl From<SubComponent> for ComponentSpec {
    fn from(kind: SubComponent) -> Self {
        Self::new(kind)
    }
}

impl From<Arc<Template>> for ComponentSpec {
    fn from(template: Arc<Template>) -> Self {
        Self::new(template)
    }
}

impl From<Arc<dyn LeafFactory>> for ComponentSpec {
    fn from(factory: Arc<dyn LeafFactory>) -> Self {
        Self::new(factory)
    }
}

impl From<Var> for ComponentSpec {
    fn from(var: Var) -> Self {
        Self::new(var)
    }
}

impl From<Component> for ComponentSpec {
    fn from(component: Component) -> Self {
        Self::new(component)
    }
}
