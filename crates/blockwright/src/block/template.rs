//! Block templates.
//!
//! A [`Template`] is an immutable value: the declared sub-components,
//! defaults, overrides and connection/repeat metadata, plus the tables
//! derived from them once at composition time. Templates are shared behind
//! `Arc` and may be instantiated any number of times.

use std::sync::Arc;

use indexmap::IndexMap;

use super::description::{FieldSpec, Group};
use super::spec::{ArgValue, ComponentSpec};
use super::tables::{compose, Tables};
use crate::error::{Error, Result};
use crate::scope::Scope;
use crate::value::{Value, ValueMap};
use crate::var::Activation;

/// A composed block template.
#[derive(Debug, Clone)]
pub struct Template {
    pub(crate) name: String,
    pub(crate) active: Activation,
    pub(crate) components: IndexMap<String, ComponentSpec>,
    pub(crate) args: IndexMap<String, ArgValue>,
    pub(crate) defaults: ValueMap,
    pub(crate) init: Option<Value>,
    pub(crate) init_blacklist: Option<Value>,
    pub(crate) connection: FieldSpec,
    pub(crate) repeat: FieldSpec,
    pub(crate) tables: Tables,
}

impl Template {
    /// Starts declaring a template called `name`.
    pub fn builder(name: impl Into<String>) -> TemplateBuilder {
        TemplateBuilder::new(name)
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn components(&self) -> &IndexMap<String, ComponentSpec> {
        &self.components
    }

    pub fn defaults(&self) -> &ValueMap {
        &self.defaults
    }

    /// Explicit argument overrides.
    pub fn args(&self) -> &IndexMap<String, ArgValue> {
        &self.args
    }

    pub fn activation(&self) -> &Activation {
        &self.active
    }

    /// Opaque initialization settings, forwarded to repeat units.
    pub fn init(&self) -> Option<&Value> {
        self.init.as_ref()
    }

    pub fn init_blacklist(&self) -> Option<&Value> {
        self.init_blacklist.as_ref()
    }

    pub fn connection_spec(&self) -> &FieldSpec {
        &self.connection
    }

    pub fn repeat_spec(&self) -> &FieldSpec {
        &self.repeat
    }

    /// Derived argument tables.
    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Evaluates the activation of this template as sub-component `prefix`.
    pub fn is_active(&self, prefix: Option<&str>, scope: &Scope) -> Result<bool> {
        let name = prefix.unwrap_or(&self.name);
        self.active.evaluate(None, prefix, name, scope)
    }

    /// True when a bare keyword `name` is accepted without a prefix.
    pub fn accepts_bare(&self, name: &str) -> bool {
        self.tables.translation(name).is_some() || self.tables.is_broadcast(name)
    }

    /// Returns a copy with `defaults` merged over the current defaults and
    /// the tables recomputed.
    pub fn with_defaults(&self, defaults: ValueMap) -> Result<Arc<Template>> {
        let mut template = self.clone();
        template.defaults.extend(defaults);
        template.tables = compose(&template)?;
        Ok(Arc::new(template))
    }

    /// The anonymous template repeated by a repeat expansion: the same
    /// declaration with the given connection and no repetition.
    pub(crate) fn repeat_unit(&self, connection: Option<&Value>) -> Result<Template> {
        let mut unit = self.clone();
        unit.connection = match connection {
            Some(value) => FieldSpec::compact(Group::Connection, ArgValue::Literal(value.clone()))?,
            None => FieldSpec::default(),
        };
        unit.repeat = FieldSpec::default();
        unit.active = Activation::default();
        Ok(unit)
    }
}

/// Declares a [`Template`].
///
/// ```
/// use blockwright::{Registry, Template, Value, Var};
///
/// let registry = Registry::with_builtin_layers();
/// let conv = registry.leaf("Conv2d").unwrap().clone();
/// let template = Template::builder("Stem")
///     .component("conv", conv)
///     .arg("out_channels", Var::kw("width"))
///     .default("kernel_size", 5)
///     .build()
///     .unwrap();
/// assert_eq!(template.tables().sub_arg("conv", "kernel_size").unwrap().default, Some(Value::Int(5)));
/// ```
#[derive(Debug, Clone)]
pub struct TemplateBuilder {
    name: String,
    args: IndexMap<String, ArgValue>,
    active: Activation,
    defaults: IndexMap<String, ArgValue>,
    init: Option<Value>,
    init_blacklist: Option<Value>,
    connection: Option<ArgValue>,
    connection_fields: IndexMap<String, ArgValue>,
    repeat: Option<ArgValue>,
    repeat_fields: IndexMap<String, ArgValue>,
    components: IndexMap<String, ComponentSpec>,
}

impl TemplateBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: IndexMap::new(),
            active: Activation::default(),
            defaults: IndexMap::new(),
            init: None,
            init_blacklist: None,
            connection: None,
            connection_fields: IndexMap::new(),
            repeat: None,
            repeat_fields: IndexMap::new(),
            components: IndexMap::new(),
        }
    }

    /// Appends a sub-component; declaration order is instantiation order.
    pub fn component(mut self, name: impl Into<String>, spec: impl Into<ComponentSpec>) -> Self {
        self.components.insert(name.into(), spec.into());
        self
    }

    /// Overrides the argument `name` wherever its single claimant is.
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    pub fn active(mut self, active: impl Into<Activation>) -> Self {
        self.active = active.into();
        self
    }

    /// Sets one block-level default.
    pub fn default(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    /// Sets several block-level defaults.
    pub fn defaults(mut self, defaults: ValueMap) -> Self {
        self.defaults
            .extend(defaults.into_iter().map(|(k, v)| (k, ArgValue::Literal(v))));
        self
    }

    pub fn init(mut self, init: impl Into<Value>) -> Self {
        self.init = Some(init.into());
        self
    }

    pub fn init_blacklist(mut self, blacklist: impl Into<Value>) -> Self {
        self.init_blacklist = Some(blacklist.into());
        self
    }

    /// Compact connection: a kind string, a field map or a variable.
    pub fn connection(mut self, connection: impl Into<ArgValue>) -> Self {
        self.connection = Some(connection.into());
        self
    }

    pub fn connection_field(mut self, field: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.connection_fields.insert(field.into(), value.into());
        self
    }

    pub fn connection_kind(self, kind: impl Into<ArgValue>) -> Self {
        self.connection_field("kind", kind)
    }

    pub fn connection_link(self, link: impl Into<ArgValue>) -> Self {
        self.connection_field("link", link)
    }

    pub fn connection_reduction(self, reduction: impl Into<ArgValue>) -> Self {
        self.connection_field("reduction", reduction)
    }

    /// Compact repeat: a count, a field map or a variable.
    pub fn repeat(mut self, repeat: impl Into<ArgValue>) -> Self {
        self.repeat = Some(repeat.into());
        self
    }

    pub fn repeat_field(mut self, field: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.repeat_fields.insert(field.into(), value.into());
        self
    }

    pub fn repeat_count(self, count: impl Into<ArgValue>) -> Self {
        self.repeat_field("count", count)
    }

    pub fn repeat_tied(self, tied: impl Into<ArgValue>) -> Self {
        self.repeat_field("tied", tied)
    }

    pub fn repeat_connection(self, connection: impl Into<ArgValue>) -> Self {
        self.repeat_field("connection", connection)
    }

    /// Validates the declaration and composes the tables.
    pub fn build(self) -> Result<Arc<Template>> {
        let connection = field_group(Group::Connection, self.connection, self.connection_fields)?;
        let repeat = field_group(Group::Repeat, self.repeat, self.repeat_fields)?;

        let mut defaults = ValueMap::new();
        for (name, value) in self.defaults {
            match value {
                ArgValue::Literal(value) => {
                    defaults.insert(name, value);
                }
                ArgValue::Var(_) => {
                    return Err(Error::invalid(format!(
                        "default values cannot be variables: '{name}'"
                    )))
                }
            }
        }

        let mut template = Template {
            name: self.name,
            active: self.active,
            components: self.components,
            args: self.args,
            defaults,
            init: self.init,
            init_blacklist: self.init_blacklist,
            connection,
            repeat,
            tables: Tables::default(),
        };
        template.tables = compose(&template)?;
        Ok(Arc::new(template))
    }
}

fn field_group(
    group: Group,
    compact: Option<ArgValue>,
    fields: IndexMap<String, ArgValue>,
) -> Result<FieldSpec> {
    match compact {
        Some(_) if !fields.is_empty() => Err(Error::invalid(format!(
            "inconsistent values are provided for \"{}\"",
            group.prefix()
        ))),
        Some(value) => FieldSpec::compact(group, value),
        None => Ok(FieldSpec::fields(fields)),
    }
}
