//! Forward pass over a constructed tree.
//!
//! Children are applied in construction order; a repeat unit standing for
//! `n` logical repeats is applied `n` times with the same weights. The
//! connection description decides how outputs combine:
//!
//! - sequential: each child consumes the previous output,
//! - residual: the block input is reduced with the chain output,
//! - dense: each child consumes the reduction of the block input and every
//!   earlier output (restricted to the children named by `link`, if any).

use super::description::{ConnectionKind, Reduction};
use super::instance::{Instance, Node};
use crate::error::{Error, Result};
use crate::value::Value;

impl Node {
    /// Invokes the node on `input`.
    pub fn forward(&self, input: Value) -> Result<Value> {
        match self {
            Node::Leaf(module) => module.forward(input),
            Node::Block(instance) => instance.forward(input),
        }
    }
}

impl Instance {
    /// Invokes the block on `input`.
    pub fn forward(&self, input: Value) -> Result<Value> {
        let connection = self.connection();
        let reduction = connection.reduction();
        match connection.kind() {
            ConnectionKind::Sequential => self.chain(input),
            ConnectionKind::Residual => {
                let output = self.chain(input.clone())?;
                reduce(self.name(), &reduction, vec![input, output])
            }
            ConnectionKind::Dense => self.dense(input, &reduction),
            ConnectionKind::Custom(kind) => Err(Error::Forward {
                component: self.name().to_string(),
                message: format!("connection '{kind}' has no forward rule"),
            }),
        }
    }

    fn chain(&self, input: Value) -> Result<Value> {
        let mut output = input;
        for (_, node, repeats) in self.child_entries() {
            for _ in 0..repeats {
                output = node.forward(output)?;
            }
        }
        Ok(output)
    }

    fn dense(&self, input: Value, reduction: &Reduction) -> Result<Value> {
        let linked: Option<Vec<String>> = self.connection().link().and_then(|link| match link {
            Value::List(items) => Some(
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
            ),
            Value::Str(name) if name != "all" => Some(vec![name.clone()]),
            _ => None,
        });

        let mut pool = vec![input.clone()];
        let mut last = input;
        for (name, node, repeats) in self.child_entries() {
            let keep = linked
                .as_ref()
                .map_or(true, |names| names.iter().any(|n| n == name));
            for _ in 0..repeats {
                let combined = reduce(self.name(), reduction, pool.clone())?;
                last = node.forward(combined)?;
                if keep {
                    pool.push(last.clone());
                }
            }
        }
        Ok(last)
    }
}

/// Reduces `values` elementwise.
pub fn reduce(component: &str, reduction: &Reduction, values: Vec<Value>) -> Result<Value> {
    let count = values.len();
    let mut iter = values.into_iter();
    let Some(first) = iter.next() else {
        return Ok(Value::None);
    };
    let sum = iter.try_fold(first, |acc, value| add(component, acc, value))?;
    match reduction {
        Reduction::Sum => Ok(sum),
        Reduction::Mean => scale(component, sum, 1.0 / count as f64),
        Reduction::Custom(name) => Err(Error::Forward {
            component: component.to_string(),
            message: format!("reduction '{name}' has no forward rule"),
        }),
    }
}

fn add(component: &str, a: Value, b: Value) -> Result<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.checked_add(y).map(Value::Int).ok_or_else(|| Error::Forward {
            component: component.to_string(),
            message: format!("integer overflow adding {x} and {y}"),
        }),
        (Value::List(xs), Value::List(ys)) if xs.len() == ys.len() => xs
            .into_iter()
            .zip(ys)
            .map(|(x, y)| add(component, x, y))
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        (a, b) => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => Ok(Value::Float(x + y)),
            _ => Err(Error::Forward {
                component: component.to_string(),
                message: format!("cannot combine a {} with a {}", a.kind_name(), b.kind_name()),
            }),
        },
    }
}

fn scale(component: &str, value: Value, factor: f64) -> Result<Value> {
    match value {
        Value::List(items) => items
            .into_iter()
            .map(|item| scale(component, item, factor))
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        other => match other.as_float() {
            Some(x) => Ok(Value::Float(x * factor)),
            None => Err(Error::Forward {
                component: component.to_string(),
                message: format!("cannot average a {}", other.kind_name()),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduce_sum_and_mean() {
        let values = vec![Value::Int(1), Value::Int(3)];
        assert_eq!(reduce("b", &Reduction::Sum, values.clone()).unwrap(), Value::Int(4));
        assert_eq!(reduce("b", &Reduction::Mean, values).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn test_reduce_lists_elementwise() {
        let a = Value::List(vec![Value::Int(1), Value::Float(0.5)]);
        let b = Value::List(vec![Value::Int(2), Value::Float(1.5)]);
        assert_eq!(
            reduce("b", &Reduction::Sum, vec![a, b]).unwrap(),
            Value::List(vec![Value::Int(3), Value::Float(2.0)])
        );
    }

    #[test]
    fn test_reduce_reports_integer_overflow() {
        let error = reduce("b", &Reduction::Sum, vec![Value::Int(i64::MAX), Value::Int(1)]).unwrap_err();
        assert!(matches!(error, Error::Forward { component, .. } if component == "b"));
    }

    #[test]
    fn test_reduce_rejects_mismatch() {
        let error = reduce("b", &Reduction::Sum, vec![Value::Int(1), Value::from("x")]).unwrap_err();
        assert!(matches!(error, Error::Forward { .. }));
    }
}
