//! Value decorators.
//!
//! A decorator transforms the value a variable resolved to. Decorators are
//! applied in declaration order.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use super::variable::Context;
use crate::error::{Error, Result};
use crate::lookup::{get_in, get_value};
use crate::scope::Scope;
use crate::value::Value;

/// Closure decorator.
pub type DecoratorFn = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// Transform applied to a resolved value.
#[derive(Clone)]
pub enum Decorator {
    /// Logs the value and passes it through.
    Tee(String),
    /// Treats the value as a dotted path and looks it up in the context.
    Dig(Context),
    /// Arbitrary transform.
    Map(DecoratorFn),
}

impl Decorator {
    /// Wraps a closure.
    pub fn map(f: impl Fn(Value) -> Result<Value> + Send + Sync + 'static) -> Self {
        Decorator::Map(Arc::new(f))
    }

    /// Applies the decorator; `scope` materializes [`Decorator::Dig`]
    /// contexts.
    pub fn apply(&self, value: Value, scope: &Scope) -> Result<Value> {
        match self {
            Decorator::Tee(message) => {
                let label = if message.is_empty() { "tee" } else { message };
                info!("{label} - {value}");
                Ok(value)
            }
            Decorator::Dig(context) => {
                let path = value.as_str().ok_or_else(|| {
                    Error::invalid(format!("dig expects a path, got a {}", value.kind_name()))
                })?;
                let target = match context {
                    Context::Local => Value::Map(scope.bindings().clone()),
                    Context::Named(name) => get_in(name, scope.bindings())
                        .ok_or_else(|| Error::LookupFailure {
                            candidates: vec![name.clone()],
                        })?,
                    Context::Value(v) => v.clone(),
                };
                get_value(path, &target).ok_or_else(|| Error::LookupFailure {
                    candidates: vec![path.to_string()],
                })
            }
            Decorator::Map(f) => f(value),
        }
    }
}

impl fmt::Debug for Decorator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decorator::Tee(message) => write!(f, "Tee({message:?})"),
            Decorator::Dig(context) => write!(f, "Dig({context})"),
            Decorator::Map(_) => write!(f, "Map(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::KWARGS;
    use crate::var::{Request, Var};

    #[test]
    fn test_tee_passes_value_through() {
        let value = Decorator::Tee(String::new())
            .apply(Value::Int(3), &Scope::default())
            .unwrap();
        assert_eq!(value, Value::Int(3));
    }

    #[test]
    fn test_dig_into_named_context() {
        let scope = Scope::new(
            [(KWARGS.to_string(), Value::map([("sizes", Value::map([("small", 8)]))]))].into(),
        );
        let var = Var::new("which")
            .context(Value::map([("which", "sizes.small")]))
            .dig(KWARGS);
        assert_eq!(var.value(&scope, &Request::new()).unwrap(), Value::Int(8));
    }

    #[test]
    fn test_dig_rejects_non_path() {
        let error = Decorator::Dig(Context::Local)
            .apply(Value::Int(1), &Scope::default())
            .unwrap_err();
        assert!(matches!(error, Error::InvalidSpec(_)));
    }
}
