//! Leaf factories and constructed modules.
//!
//! A leaf factory is any component usable as a sub-component that is not a
//! template: it exposes an ordered, introspectable parameter list and builds a
//! [`Module`] from a keyword-argument set matching that list.
//!
//! The numerical behaviour of layers is not this crate's concern. [`Layer`]
//! is a generic leaf that records its arguments and, unless given a forward
//! function, passes its input through unchanged.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::value::{Value, ValueMap};

/// Kind of a leaf parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Normal,
    /// Accepts any extra keyword arguments.
    VariadicKeyword,
    /// Accepts extra positional arguments.
    VariadicPositional,
}

/// One formal parameter of a leaf factory.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<Value>,
}

impl Parameter {
    /// A parameter that must be supplied.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Normal,
            default: None,
        }
    }

    /// A parameter with a default.
    pub fn optional(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Normal,
            default: Some(default.into()),
        }
    }

    /// A catch-all keyword slot.
    pub fn variadic_keyword(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::VariadicKeyword,
            default: None,
        }
    }

    /// A catch-all positional slot.
    pub fn variadic_positional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::VariadicPositional,
            default: None,
        }
    }
}

/// A constructed tree node, invocable on a tensor-like input.
pub trait Module: fmt::Debug + Send + Sync {
    /// Display name of the node's type.
    fn type_name(&self) -> &str;

    /// Invokes the node.
    fn forward(&self, input: Value) -> Result<Value>;

    /// Arguments the node was constructed with, when it records them.
    fn arguments(&self) -> Option<&ValueMap> {
        None
    }
}

/// Factory of leaf modules.
pub trait LeafFactory: Send + Sync {
    /// Display name.
    fn name(&self) -> &str;

    /// Ordered formal parameters.
    fn parameters(&self) -> &[Parameter];

    /// Builds a module from arguments already checked by [`bind_arguments`].
    fn build(&self, args: ValueMap) -> Result<Box<dyn Module>>;

    /// True when the factory declares a variadic-keyword slot.
    fn accepts_any_keyword(&self) -> bool {
        self.parameters()
            .iter()
            .any(|p| p.kind == ParamKind::VariadicKeyword)
    }
}

/// Checks `args` against the parameter list of `factory` and fills in
/// parameter defaults.
///
/// Unknown keywords are rejected unless the factory has a variadic-keyword
/// slot; a normal parameter with neither a value nor a default is missing.
pub fn bind_arguments(factory: &dyn LeafFactory, component: &str, args: ValueMap) -> Result<ValueMap> {
    let parameters = factory.parameters();
    let open = factory.accepts_any_keyword();

    if !open {
        if let Some(unknown) = args
            .keys()
            .find(|key| !parameters.iter().any(|p| &p.name == *key))
        {
            return Err(Error::UnknownArgument {
                component: component.to_string(),
                argument: unknown.clone(),
            });
        }
    }

    let mut bound = ValueMap::new();
    for parameter in parameters.iter().filter(|p| p.kind == ParamKind::Normal) {
        let value = args
            .get(&parameter.name)
            .cloned()
            .or_else(|| parameter.default.clone())
            .ok_or_else(|| Error::MissingArgument {
                component: component.to_string(),
                argument: parameter.name.clone(),
            })?;
        bound.insert(parameter.name.clone(), value);
    }
    for (key, value) in args {
        bound.entry(key).or_insert(value);
    }
    Ok(bound)
}

/// Forward function of a [`Layer`]: `(arguments, input) -> output`.
pub type ForwardFn = Arc<dyn Fn(&ValueMap, Value) -> Result<Value> + Send + Sync>;

/// Generic leaf factory described by a name and a parameter list.
#[derive(Clone)]
pub struct LayerFactory {
    name: String,
    parameters: Vec<Parameter>,
    forward: Option<ForwardFn>,
}

impl LayerFactory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            forward: None,
        }
    }

    /// Appends a parameter.
    pub fn param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Sets the forward function of built layers.
    pub fn forward(
        mut self,
        f: impl Fn(&ValueMap, Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.forward = Some(Arc::new(f));
        self
    }

    /// Shares the factory as a trait object.
    pub fn shared(self) -> Arc<dyn LeafFactory> {
        Arc::new(self)
    }
}

impl LeafFactory for LayerFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn build(&self, args: ValueMap) -> Result<Box<dyn Module>> {
        Ok(Box::new(Layer {
            kind: self.name.clone(),
            args,
            forward: self.forward.clone(),
        }))
    }
}

/// Module built by a [`LayerFactory`].
pub struct Layer {
    kind: String,
    args: ValueMap,
    forward: Option<ForwardFn>,
}

impl Layer {
    /// Looks up a constructor argument.
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.kind)?;
        for (i, (key, value)) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        write!(f, ")")
    }
}

impl Module for Layer {
    fn type_name(&self) -> &str {
        &self.kind
    }

    fn forward(&self, input: Value) -> Result<Value> {
        match &self.forward {
            Some(f) => f(&self.args, input),
            None => Ok(input),
        }
    }

    fn arguments(&self) -> Option<&ValueMap> {
        Some(&self.args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv() -> LayerFactory {
        LayerFactory::new("Conv2d")
            .param(Parameter::required("in_channels"))
            .param(Parameter::required("out_channels"))
            .param(Parameter::optional("kernel_size", 3))
    }

    fn args(entries: &[(&str, Value)]) -> ValueMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_bind_fills_defaults() {
        let bound = bind_arguments(
            &conv(),
            "conv",
            args(&[("in_channels", Value::Int(3)), ("out_channels", Value::Int(8))]),
        )
        .unwrap();
        assert_eq!(bound.get("kernel_size"), Some(&Value::Int(3)));
        assert_eq!(bound.keys().next().map(String::as_str), Some("in_channels"));
    }

    #[test]
    fn test_bind_rejects_unknown() {
        let error = bind_arguments(
            &conv(),
            "conv",
            args(&[
                ("in_channels", Value::Int(3)),
                ("out_channels", Value::Int(8)),
                ("dilation", Value::Int(2)),
            ]),
        )
        .unwrap_err();
        assert_eq!(
            error,
            Error::UnknownArgument {
                component: "conv".into(),
                argument: "dilation".into()
            }
        );
    }

    #[test]
    fn test_bind_reports_missing() {
        let error = bind_arguments(&conv(), "conv", args(&[("in_channels", Value::Int(3))])).unwrap_err();
        assert!(matches!(error, Error::MissingArgument { argument, .. } if argument == "out_channels"));
    }

    #[test]
    fn test_variadic_keyword_accepts_extras() {
        let open = LayerFactory::new("Identity").param(Parameter::variadic_keyword("kwargs"));
        let bound = bind_arguments(&open, "id", args(&[("anything", Value::Bool(true))])).unwrap();
        assert_eq!(bound.get("anything"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_layer_forward() {
        let scale = LayerFactory::new("Scale")
            .param(Parameter::optional("factor", 2.0))
            .forward(|args, input| {
                let factor = args.get("factor").and_then(Value::as_float).unwrap_or(1.0);
                Ok(Value::Float(input.as_float().unwrap_or(0.0) * factor))
            });
        let bound = bind_arguments(&scale, "scale", ValueMap::new()).unwrap();
        let module = scale.build(bound).unwrap();
        assert_eq!(module.forward(Value::Float(1.5)).unwrap(), Value::Float(3.0));
        assert_eq!(module.type_name(), "Scale");
    }
}
