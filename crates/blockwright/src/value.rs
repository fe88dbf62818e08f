//! Dynamic values.
//!
//! Keyword arguments, frame bindings, defaults and the tensor-like payloads
//! passed through a built tree are all [`Value`]s. A value may also carry a
//! component (a leaf factory or a template) so that a variable can resolve to
//! the factory of a sub-component.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::block::Template;
use crate::factory::LeafFactory;

/// Ordered string-keyed map of values.
pub type ValueMap = IndexMap<String, Value>;

/// An attribute-bearing object reachable by dotted-path lookup.
///
/// Lookup on an object checks attribute presence, where lookup on a
/// [`Value::Map`] checks key membership.
pub trait Object: fmt::Debug + Send + Sync {
    /// Returns the attribute called `name`, if present.
    fn attribute(&self, name: &str) -> Option<Value>;
}

/// A constructible component: a leaf factory or a nested template.
#[derive(Clone)]
pub enum Component {
    /// Leaf factory with an introspectable parameter list.
    Leaf(Arc<dyn LeafFactory>),
    /// Composed block template.
    Template(Arc<Template>),
}

impl Component {
    /// Display name of the component.
    pub fn name(&self) -> &str {
        match self {
            Component::Leaf(factory) => factory.name(),
            Component::Template(template) => template.name(),
        }
    }

    fn same(&self, other: &Component) -> bool {
        match (self, other) {
            (Component::Leaf(a), Component::Leaf(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (Component::Template(a), Component::Template(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Leaf(factory) => write!(f, "Leaf({})", factory.name()),
            Component::Template(template) => write!(f, "Template({})", template.name()),
        }
    }
}

impl From<Arc<Template>> for Component {
    fn from(template: Arc<Template>) -> Self {
        Component::Template(template)
    }
}

impl From<Arc<dyn LeafFactory>> for Component {
    fn from(factory: Arc<dyn LeafFactory>) -> Self {
        Component::Leaf(factory)
    }
}

/// Runtime value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Explicit absence; a valid default.
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(ValueMap),
    /// A leaf factory or template.
    Component(Component),
    /// An attribute-bearing object.
    Object(Arc<dyn Object>),
}

impl Value {
    /// Builds a map value from `(key, value)` pairs.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Python-style truthiness.
    ///
    /// `None`, `false`, zero and empty strings/lists/maps are falsy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Map(m) => !m.is_empty(),
            Value::Component(_) | Value::Object(_) => true,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of ints and floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_component(&self) -> Option<&Component> {
        match self {
            Value::Component(c) => Some(c),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Component(_) => "component",
            Value::Object(_) => "object",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Component(a), Value::Component(b)) => a.same(b),
            (Value::Object(a), Value::Object(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, item)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {item}")?;
                }
                write!(f, "}}")
            }
            Value::Component(c) => write!(f, "{}", c.name()),
            Value::Object(_) => write!(f, "<object>"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<ValueMap> for Value {
    fn from(v: ValueMap) -> Self {
        Value::Map(v)
    }
}

impl From<Component> for Value {
    fn from(v: Component) -> Self {
        Value::Component(v)
    }
}

impl From<Arc<Template>> for Value {
    fn from(v: Arc<Template>) -> Self {
        Value::Component(Component::Template(v))
    }
}

impl From<Arc<dyn LeafFactory>> for Value {
    fn from(v: Arc<dyn LeafFactory>) -> Self {
        Value::Component(Component::Leaf(v))
    }
}
