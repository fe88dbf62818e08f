//! Conversion of dynamic YAML values.
//!
//! Plain YAML scalars, sequences and mappings become [`Value`]s. Two
//! single-key mappings are reserved:
//!
//! ```yaml
//! width: {var: {name: width, context: kwargs, default: 64}}
//! block: {component: Conv2d}
//! ```
//!
//! `var` declares a deferred variable and is only meaningful where an
//! argument may be deferred; `component` refers to a registered component.

use serde_yaml::{Mapping, Value as Yaml};

use super::document::{ConfigError, ConfigResult};
use crate::block::ArgValue;
use crate::registry::Registry;
use crate::value::{Value, ValueMap};
use crate::var::{Activation, Context, Lookup, Var};

const VAR_KEY: &str = "var";
const COMPONENT_KEY: &str = "component";

/// Converts a YAML value that may declare a variable.
pub fn to_arg(yaml: &Yaml, registry: &Registry) -> ConfigResult<ArgValue> {
    match reserved(yaml, VAR_KEY) {
        Some(spec) => Ok(ArgValue::Var(to_var(spec, registry)?)),
        None => Ok(ArgValue::Literal(to_value(yaml, registry)?)),
    }
}

/// Converts a literal YAML value.
pub fn to_value(yaml: &Yaml, registry: &Registry) -> ConfigResult<Value> {
    if let Some(name) = reserved(yaml, COMPONENT_KEY) {
        let name = name
            .as_str()
            .ok_or_else(|| ConfigError::Invalid("component reference must be a name".into()))?;
        return registry
            .get(name)
            .cloned()
            .map(Value::Component)
            .ok_or_else(|| ConfigError::UnknownComponent(name.to_string()));
    }
    if reserved(yaml, VAR_KEY).is_some() {
        return Err(ConfigError::Invalid(
            "a variable is not allowed in this position".into(),
        ));
    }

    Ok(match yaml {
        Yaml::Null => Value::None,
        Yaml::Bool(b) => Value::Bool(*b),
        Yaml::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Yaml::String(s) => Value::Str(s.clone()),
        Yaml::Sequence(items) => Value::List(
            items
                .iter()
                .map(|item| to_value(item, registry))
                .collect::<ConfigResult<_>>()?,
        ),
        Yaml::Mapping(mapping) => Value::Map(to_map(mapping, registry)?),
        Yaml::Tagged(tagged) => to_value(&tagged.value, registry)?,
    })
}

/// Converts a YAML mapping with string keys.
pub fn to_map(mapping: &Mapping, registry: &Registry) -> ConfigResult<ValueMap> {
    let mut map = ValueMap::new();
    for (key, value) in mapping {
        map.insert(key_string(key)?, to_value(value, registry)?);
    }
    Ok(map)
}

/// Converts a variable declaration.
///
/// A bare string is shorthand for a local-frame variable of that name. The
/// mapping form accepts:
///
/// | key                    | meaning                                   |
/// |------------------------|-------------------------------------------|
/// | `name` / `names`       | candidate name(s); `null` defers the name |
/// | `context` / `contexts` | `local`, a dotted path, or `{value: ..}`  |
/// | `default`              | static default                            |
/// | `active`               | flag, `exists`/`evaluate`, or a variable  |
/// | `lookup`               | `evaluate` or `exists`                    |
/// | `tee` / `dig`          | decorators, applied in that order         |
pub fn to_var(yaml: &Yaml, registry: &Registry) -> ConfigResult<Var> {
    let mapping = match yaml {
        Yaml::String(name) => return Ok(Var::new(name.clone())),
        Yaml::Null => return Ok(Var::unnamed()),
        Yaml::Mapping(mapping) => mapping,
        other => {
            return Err(ConfigError::Invalid(format!(
                "cannot read a variable from {other:?}"
            )))
        }
    };

    let mut names: Vec<Option<String>> = vec![None];
    let mut contexts: Vec<Context> = vec![Context::Local];
    let mut default = None;
    let mut active = None;
    let mut lookup = None;
    let mut tee = None;
    let mut dig = None;

    for (key, value) in mapping {
        match key_string(key)?.as_str() {
            "name" => names = vec![optional_name(value)?],
            "names" => names = sequence(value)?.iter().map(optional_name).collect::<ConfigResult<_>>()?,
            "context" => contexts = vec![to_context(value, registry)?],
            "contexts" => {
                contexts = sequence(value)?
                    .iter()
                    .map(|c| to_context(c, registry))
                    .collect::<ConfigResult<_>>()?
            }
            "default" => default = Some(to_value(value, registry)?),
            "active" => active = Some(to_activation(value, registry)?),
            "lookup" => lookup = Some(to_lookup(value)?),
            "tee" => tee = Some(value.as_str().unwrap_or_default().to_string()),
            "dig" => dig = Some(to_context(value, registry)?),
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unknown variable field '{other}'"
                )))
            }
        }
    }

    let mut var = Var::with_candidates(names, contexts)?;
    if let Some(default) = default {
        var = var.default(default);
    }
    if let Some(active) = active {
        var = var.active(active);
    }
    if let Some(lookup) = lookup {
        var = var.lookup(lookup);
    }
    if let Some(message) = tee {
        var = var.tee(message);
    }
    if let Some(context) = dig {
        var = var.dig(context);
    }
    Ok(var)
}

/// Converts an activation: a flag, a lookup strategy name, or a variable.
pub fn to_activation(yaml: &Yaml, registry: &Registry) -> ConfigResult<Activation> {
    if let Some(spec) = reserved(yaml, VAR_KEY) {
        return Ok(Activation::from(to_var(spec, registry)?));
    }
    match yaml {
        Yaml::Bool(flag) => Ok(Activation::Flag(*flag)),
        Yaml::String(_) => Ok(Activation::Lookup(to_lookup(yaml)?)),
        other => Err(ConfigError::Invalid(format!(
            "cannot read an activation from {other:?}"
        ))),
    }
}

fn to_lookup(yaml: &Yaml) -> ConfigResult<Lookup> {
    let name = yaml.as_str().unwrap_or_default();
    Lookup::from_name(name)
        .ok_or_else(|| ConfigError::Invalid(format!("unknown lookup strategy '{name}'")))
}

fn to_context(yaml: &Yaml, registry: &Registry) -> ConfigResult<Context> {
    match yaml {
        Yaml::Null => Ok(Context::Local),
        Yaml::String(path) if path == "local" => Ok(Context::Local),
        Yaml::String(path) => Ok(Context::Named(path.clone())),
        Yaml::Mapping(mapping) => match mapping.get("value") {
            Some(value) if mapping.len() == 1 => Ok(Context::Value(to_value(value, registry)?)),
            _ => Err(ConfigError::Invalid(
                "an explicit context is written {value: ...}".into(),
            )),
        },
        other => Err(ConfigError::Invalid(format!(
            "cannot read a context from {other:?}"
        ))),
    }
}

fn optional_name(yaml: &Yaml) -> ConfigResult<Option<String>> {
    match yaml {
        Yaml::Null => Ok(None),
        Yaml::String(name) => Ok(Some(name.clone())),
        other => Err(ConfigError::Invalid(format!(
            "variable names are strings, got {other:?}"
        ))),
    }
}

fn sequence(yaml: &Yaml) -> ConfigResult<&Vec<Yaml>> {
    yaml.as_sequence()
        .ok_or_else(|| ConfigError::Invalid(format!("expected a list, got {yaml:?}")))
}

fn key_string(key: &Yaml) -> ConfigResult<String> {
    key.as_str()
        .map(str::to_string)
        .ok_or_else(|| ConfigError::Invalid(format!("mapping keys must be strings, got {key:?}")))
}

/// The payload of a single-key mapping `{key: payload}`.
fn reserved<'y>(yaml: &'y Yaml, key: &str) -> Option<&'y Yaml> {
    match yaml {
        Yaml::Mapping(mapping) if mapping.len() == 1 => mapping.get(key),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;
    use crate::var::Request;

    fn yaml(text: &str) -> Yaml {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_plain_values() {
        let registry = Registry::new();
        let value = to_value(&yaml("{a: 1, b: [true, 2.5, x], c: null}"), &registry).unwrap();
        assert_eq!(
            value,
            Value::map([
                ("a", Value::Int(1)),
                (
                    "b",
                    Value::List(vec![Value::Bool(true), Value::Float(2.5), Value::from("x")])
                ),
                ("c", Value::None),
            ])
        );
    }

    #[test]
    fn test_component_reference() {
        let registry = Registry::with_builtin_layers();
        let value = to_value(&yaml("{component: ReLU}"), &registry).unwrap();
        assert_eq!(value.as_component().map(|c| c.name()), Some("ReLU"));

        let error = to_value(&yaml("{component: Missing}"), &registry).unwrap_err();
        assert!(matches!(error, ConfigError::UnknownComponent(name) if name == "Missing"));
    }

    #[test]
    fn test_var_declaration() {
        let registry = Registry::new();
        let arg = to_arg(
            &yaml("{var: {names: [width, channels], context: kwargs, default: 8}}"),
            &registry,
        )
        .unwrap();
        let var = arg.as_var().unwrap();
        assert!(var.is_priority());

        let scope = Scope::new(ValueMap::from([(
            "kwargs".to_string(),
            Value::map([("channels", Value::Int(32))]),
        )]));
        assert_eq!(var.value(&scope, &Request::new()).unwrap(), Value::Int(32));
        assert_eq!(
            var.value(&Scope::default(), &Request::new()).unwrap(),
            Value::Int(8)
        );
    }

    #[test]
    fn test_var_rejected_in_literal_position() {
        let registry = Registry::new();
        assert!(to_value(&yaml("{var: width}"), &registry).is_err());
    }

    #[test]
    fn test_unknown_var_field() {
        let registry = Registry::new();
        let error = to_var(&yaml("{name: w, colour: red}"), &registry).unwrap_err();
        assert!(matches!(error, ConfigError::Invalid(_)));
    }
}
