//! Connection and repeat descriptions.
//!
//! Both descriptions are merged from three sources, later ones winning:
//!
//! 1. the static fields declared on the template,
//! 2. the literal (or variable) passed to the construction call,
//! 3. `connection_<field>` / `repeat_<field>` keyword arguments.
//!
//! The key field (`kind` or `count`) is resolved first. When it is falsy the
//! remaining variable fields are dropped unresolved; otherwise every
//! variable field is resolved under the group prefix.

use indexmap::IndexMap;
use tracing::trace;

use super::spec::ArgValue;
use crate::error::{Error, Result};
use crate::scope::Scope;
use crate::value::{Value, ValueMap};
use crate::var::{Request, Var};

/// Which description a field group belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    Connection,
    Repeat,
}

impl Group {
    /// Keyword prefix and variable name of the group.
    pub fn prefix(self) -> &'static str {
        match self {
            Group::Connection => "connection",
            Group::Repeat => "repeat",
        }
    }

    /// Field that decides whether the rest is resolved.
    pub fn key_field(self) -> &'static str {
        match self {
            Group::Connection => "kind",
            Group::Repeat => "count",
        }
    }

    /// Expands a compact literal into fields.
    fn expand(self, value: Value) -> Result<Vec<(String, ArgValue)>> {
        match (self, value) {
            (_, Value::None) => Ok(Vec::new()),
            (_, Value::Map(map)) => Ok(map
                .into_iter()
                .map(|(k, v)| (k, ArgValue::Literal(v)))
                .collect()),
            (Group::Connection, value @ Value::Str(_)) => {
                Ok(vec![("kind".to_string(), ArgValue::Literal(value))])
            }
            (Group::Repeat, value @ (Value::Int(_) | Value::Bool(_))) => {
                Ok(vec![("count".to_string(), ArgValue::Literal(value))])
            }
            (group, other) => Err(Error::invalid(format!(
                "unknown value is specified for \"{}\": {other}",
                group.prefix()
            ))),
        }
    }
}

/// Statically declared fields of one group.
#[derive(Debug, Clone, Default)]
pub struct FieldSpec {
    /// Compact form given as a variable; resolved per construction call.
    deferred: Option<Var>,
    fields: IndexMap<String, ArgValue>,
}

impl FieldSpec {
    /// Builds the group from its compact form.
    pub fn compact(group: Group, value: ArgValue) -> Result<Self> {
        match value {
            ArgValue::Var(var) => Ok(Self {
                deferred: Some(var),
                fields: IndexMap::new(),
            }),
            ArgValue::Literal(value) => Ok(Self {
                deferred: None,
                fields: group.expand(value)?.into_iter().collect(),
            }),
        }
    }

    /// Builds the group from exploded fields.
    pub fn fields(fields: IndexMap<String, ArgValue>) -> Self {
        Self {
            deferred: None,
            fields,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.deferred.is_none() && self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&ArgValue> {
        self.fields.get(field)
    }

    /// Kwargs-context names the group's variables read.
    pub fn lookup_names(&self, group: Group) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(var) = &self.deferred {
            names.extend(var.kwargs_names(group.prefix()));
        }
        for (field, value) in &self.fields {
            if let ArgValue::Var(var) = value {
                names.extend(var.kwargs_names(field));
            }
        }
        names
    }

    /// Merges and resolves the description of one construction call.
    pub fn resolve(
        &self,
        group: Group,
        literal: Option<&ArgValue>,
        keywords: ValueMap,
        scope: &Scope,
    ) -> Result<ValueMap> {
        let prefix = group.prefix();
        let mut merged = IndexMap::new();

        if let Some(var) = &self.deferred {
            let value = var.value(scope, &Request::new().name(prefix))?;
            merged.extend(group.expand(value)?);
        }
        merged.extend(self.fields.iter().map(|(k, v)| (k.clone(), v.clone())));

        match literal {
            Some(ArgValue::Var(var)) => {
                let value = var.value(scope, &Request::new().name(prefix))?;
                merged.extend(group.expand(value)?);
            }
            Some(ArgValue::Literal(value)) => merged.extend(group.expand(value.clone())?),
            None => {}
        }
        merged.extend(keywords.into_iter().map(|(k, v)| (k, ArgValue::Literal(v))));

        let key = group.key_field();
        let key_value = match merged.get(key) {
            Some(ArgValue::Var(var)) => var.value(scope, &Request::new().name(key).prefix(prefix))?,
            Some(ArgValue::Literal(value)) => value.clone(),
            None => Value::None,
        };
        let enabled = key_value.truthy();

        let mut resolved = ValueMap::new();
        for (field, value) in merged {
            let value = if field == key {
                key_value.clone()
            } else {
                match value {
                    ArgValue::Literal(value) => value,
                    ArgValue::Var(_) if !enabled => continue,
                    ArgValue::Var(var) => {
                        var.value(scope, &Request::new().name(&field).prefix(prefix))?
                    }
                }
            };
            resolved.insert(field, value);
        }
        if !resolved.contains_key(key) {
            resolved.insert(key.to_string(), key_value);
        }
        let shown = Value::Map(resolved.clone());
        trace!(group = prefix, fields = %shown, "description resolved");
        Ok(resolved)
    }
}

/// How sibling outputs are combined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionKind {
    /// Children are chained.
    Sequential,
    /// The block input is reduced with the chain output.
    Residual,
    /// Each child sees the reduction of every earlier output.
    Dense,
    /// A user-defined scheme with no built-in forward rule.
    Custom(String),
}

/// Reduction applied to combined outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reduction {
    Sum,
    Mean,
    Custom(String),
}

/// Resolved connection description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Connection {
    fields: ValueMap,
}

impl Connection {
    pub fn new(fields: ValueMap) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &ValueMap {
        &self.fields
    }

    pub fn kind(&self) -> ConnectionKind {
        match self.fields.get("kind") {
            Some(Value::Str(kind)) => match kind.as_str() {
                "" | "none" | "normal" | "sequential" => ConnectionKind::Sequential,
                "residual" => ConnectionKind::Residual,
                "dense" => ConnectionKind::Dense,
                other => ConnectionKind::Custom(other.to_string()),
            },
            _ => ConnectionKind::Sequential,
        }
    }

    /// Link selection: the children whose outputs are combined.
    pub fn link(&self) -> Option<&Value> {
        self.fields.get("link").filter(|link| !link.is_none())
    }

    pub fn reduction(&self) -> Reduction {
        match self.fields.get("reduction").and_then(Value::as_str) {
            None | Some("sum") | Some("add") => Reduction::Sum,
            Some("mean") => Reduction::Mean,
            Some(other) => Reduction::Custom(other.to_string()),
        }
    }
}

/// Resolved repeat description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Repeat {
    fields: ValueMap,
    count: usize,
    tied: usize,
    groups: Vec<usize>,
}

impl Repeat {
    /// Computes the expansion plan from resolved fields.
    ///
    /// `tied` is `false` for groups of one, `true` for a single group of
    /// `count`, or an explicit group size.
    pub fn new(fields: ValueMap) -> Result<Self> {
        let count = match fields.get("count") {
            None | Some(Value::None) | Some(Value::Bool(false)) => 0,
            Some(Value::Bool(true)) => 1,
            Some(Value::Int(n)) if *n >= 0 => *n as usize,
            Some(other) => {
                return Err(Error::invalid(format!("repeat count must be a non-negative integer, got {other}")))
            }
        };
        let tied = match fields.get("tied") {
            None | Some(Value::None) | Some(Value::Bool(false)) => 1,
            Some(Value::Bool(true)) => count.max(1),
            Some(Value::Int(n)) if *n >= 1 => *n as usize,
            Some(other) => {
                return Err(Error::invalid(format!("repeat tied must be a bool or a positive integer, got {other}")))
            }
        };
        let groups = (0..count.div_ceil(tied))
            .map(|i| tied.min(count - i * tied))
            .collect();
        Ok(Self {
            fields,
            count,
            tied,
            groups,
        })
    }

    pub fn fields(&self) -> &ValueMap {
        &self.fields
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Tie-group size.
    pub fn tied(&self) -> usize {
        self.tied
    }

    pub fn is_repeated(&self) -> bool {
        self.count > 0
    }

    /// Number of physical units.
    pub fn num_blocks(&self) -> usize {
        self.groups.len()
    }

    /// Logical repeats represented by each unit; the last may be partial.
    pub fn groups(&self) -> &[usize] {
        &self.groups
    }

    /// Connection between repeat units.
    pub fn connection(&self) -> Option<&Value> {
        self.fields.get("connection").filter(|c| !c.is_none())
    }

    /// Child label of unit `index`.
    pub fn unit_label(&self, index: usize) -> String {
        match self.groups.get(index) {
            Some(size) if self.tied > 1 => format!("block-{index}-[{size}]"),
            _ => format!("block-{index}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::KWARGS;

    fn call_scope(kwargs: Value) -> Scope {
        Scope::new([(KWARGS.to_string(), kwargs)].into())
    }

    fn keywords(entries: &[(&str, Value)]) -> ValueMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_merge_order() {
        let spec = FieldSpec::compact(Group::Connection, ArgValue::from(Value::map([
            ("kind", "residual"),
            ("reduction", "sum"),
        ])))
        .unwrap();
        let literal = ArgValue::from(Value::map([("reduction", "mean"), ("link", "all")]));
        let resolved = spec
            .resolve(
                Group::Connection,
                Some(&literal),
                keywords(&[("link", Value::from("last"))]),
                &Scope::default(),
            )
            .unwrap();
        let connection = Connection::new(resolved);
        assert_eq!(connection.kind(), ConnectionKind::Residual);
        assert_eq!(connection.reduction(), Reduction::Mean);
        assert_eq!(connection.link(), Some(&Value::from("last")));
    }

    #[test]
    fn test_string_is_kind_sugar() {
        let spec = FieldSpec::compact(Group::Connection, ArgValue::from("dense")).unwrap();
        let resolved = spec
            .resolve(Group::Connection, None, ValueMap::new(), &Scope::default())
            .unwrap();
        assert_eq!(Connection::new(resolved).kind(), ConnectionKind::Dense);
    }

    #[test]
    fn test_falsy_key_drops_variable_fields() {
        let fields = IndexMap::from([
            ("count".to_string(), ArgValue::from(0)),
            ("tied".to_string(), ArgValue::from(Var::kw("tied"))),
        ]);
        let resolved = FieldSpec::fields(fields)
            .resolve(Group::Repeat, None, ValueMap::new(), &call_scope(Value::map([("x", 1)])))
            .unwrap();
        assert!(!resolved.contains_key("tied"));
        assert!(!Repeat::new(resolved).unwrap().is_repeated());
    }

    #[test]
    fn test_variable_fields_resolve_with_prefix() {
        let fields = IndexMap::from([
            ("count".to_string(), ArgValue::from(Var::kw_unnamed())),
            ("tied".to_string(), ArgValue::from(Var::kw("tied").default(false))),
        ]);
        let scope = call_scope(Value::map([("repeat_count", 4), ("repeat_tied", 2)]));
        let resolved = FieldSpec::fields(fields)
            .resolve(Group::Repeat, None, ValueMap::new(), &scope)
            .unwrap();
        let repeat = Repeat::new(resolved).unwrap();
        assert_eq!(repeat.count(), 4);
        assert_eq!(repeat.groups(), &[2, 2]);
    }

    #[test]
    fn test_deferred_compact_form() {
        let spec = FieldSpec::compact(Group::Repeat, ArgValue::from(Var::kw("layers"))).unwrap();
        let scope = call_scope(Value::map([("layers", 3)]));
        let resolved = spec.resolve(Group::Repeat, None, ValueMap::new(), &scope).unwrap();
        assert_eq!(Repeat::new(resolved).unwrap().count(), 3);
    }

    #[test]
    fn test_invalid_compact_value() {
        let error = FieldSpec::compact(Group::Repeat, ArgValue::from("twice")).unwrap_err();
        assert!(matches!(error, Error::InvalidSpec(_)));
    }

    #[test]
    fn test_repeat_groups() {
        let repeat = Repeat::new(keywords(&[("count", Value::Int(5)), ("tied", Value::Int(2))])).unwrap();
        assert_eq!(repeat.num_blocks(), 3);
        assert_eq!(repeat.groups(), &[2, 2, 1]);
        assert_eq!(repeat.unit_label(2), "block-2-[1]");

        let untied = Repeat::new(keywords(&[("count", Value::Int(3))])).unwrap();
        assert_eq!(untied.groups(), &[1, 1, 1]);
        assert_eq!(untied.unit_label(0), "block-0");

        let all = Repeat::new(keywords(&[("count", Value::Int(4)), ("tied", Value::Bool(true))])).unwrap();
        assert_eq!(all.groups(), &[4]);
    }
}
