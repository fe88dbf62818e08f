//! Derived argument tables.
//!
//! Every descriptor of a template lives once in an arena; the global table,
//! the per-sub-component tables and the translation table are views holding
//! arena indices. A block-level default written to a descriptor is therefore
//! seen identically through every table.
//!
//! Composition runs in four steps:
//!
//! 1. describe every sub-component (leaf parameters, inherited nested
//!    descriptors, variable sub-components),
//! 2. index the global table by argument name,
//! 3. apply explicit `args` overrides, each of which must match exactly one
//!    claimant,
//! 4. keep the names claimed by a single sub-component in the translation
//!    table and layer the block-level defaults onto them.

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace};

use super::description::Group;
use super::spec::{ArgValue, ComponentSpec, SubComponent};
use super::template::Template;
use crate::error::{Error, Result};
use crate::factory::{LeafFactory, ParamKind};
use crate::scope::{Scope, DEFAULTS, KWARGS};
use crate::value::{Value, ValueMap};
use crate::var::{describe_var, Activation, ArgDescriptor, ArgKind, Var};

/// Argument table of one sub-component.
///
/// For a nested template, keys are the keywords that template accepts: the
/// bare name when its translation table claims it, `<child>_<name>`
/// otherwise. Variable descriptors are keyed by their lookup names.
#[derive(Debug, Clone, Default)]
pub struct SubTable {
    args: IndexMap<String, usize>,
    variadic: IndexMap<String, usize>,
    var_keyword: Option<String>,
    var_positional: Option<String>,
    var_component: IndexMap<String, usize>,
}

impl SubTable {
    /// Named arguments with their arena indices.
    pub fn args(&self) -> impl Iterator<Item = (&str, usize)> {
        self.args.iter().map(|(k, &i)| (k.as_str(), i))
    }

    pub fn arg(&self, key: &str) -> Option<usize> {
        self.args.get(key).copied()
    }

    /// Name of the variadic-keyword slot, if any.
    pub fn var_keyword(&self) -> Option<&str> {
        self.var_keyword.as_deref()
    }

    /// Name of the variadic-positional slot, if any.
    pub fn var_positional(&self) -> Option<&str> {
        self.var_positional.as_deref()
    }

    /// Lookup names of a variable sub-component.
    pub fn var_component(&self) -> impl Iterator<Item = (&str, usize)> {
        self.var_component.iter().map(|(k, &i)| (k.as_str(), i))
    }
}

/// Translation entry: the unique sub-component claiming a bare name.
#[derive(Debug, Clone)]
pub struct Translation {
    owner: String,
    descriptors: Vec<usize>,
}

impl Translation {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn descriptors(&self) -> &[usize] {
        &self.descriptors
    }
}

/// Tables computed once per template and shared by every instantiation.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    arena: Vec<ArgDescriptor>,
    global: IndexMap<String, Vec<usize>>,
    subs: IndexMap<String, SubTable>,
    translation: IndexMap<String, Translation>,
    broadcast: IndexSet<String>,
    bound: IndexSet<usize>,
}

impl Tables {
    pub fn descriptor(&self, index: usize) -> &ArgDescriptor {
        &self.arena[index]
    }

    /// Every descriptor claiming `name`, in declaration order.
    pub fn global(&self, name: &str) -> Vec<&ArgDescriptor> {
        self.global
            .get(name)
            .map(|indices| indices.iter().map(|&i| &self.arena[i]).collect())
            .unwrap_or_default()
    }

    pub fn global_names(&self) -> impl Iterator<Item = &str> {
        self.global.keys().map(String::as_str)
    }

    pub fn sub(&self, component: &str) -> Option<&SubTable> {
        self.subs.get(component)
    }

    /// Descriptor of `key` in the table of `component`.
    pub fn sub_arg(&self, component: &str, key: &str) -> Option<&ArgDescriptor> {
        let index = self.subs.get(component)?.arg(key)?;
        Some(&self.arena[index])
    }

    pub fn translation(&self, name: &str) -> Option<&Translation> {
        self.translation.get(name)
    }

    /// Translated names with the first descriptor each claims.
    pub fn translated(&self) -> impl Iterator<Item = (&str, &ArgDescriptor)> {
        self.translation
            .iter()
            .map(|(name, t)| (name.as_str(), &self.arena[t.descriptors[0]]))
    }

    /// True when a bare keyword `name` is read by some variable in the tree.
    pub fn is_broadcast(&self, name: &str) -> bool {
        self.broadcast.contains(name)
    }

    pub fn broadcast_names(&self) -> impl Iterator<Item = &str> {
        self.broadcast.iter().map(String::as_str)
    }

    /// True when the variable of descriptor `index` is resolved by this
    /// template rather than by the nested template it came from.
    pub fn is_bound(&self, index: usize) -> bool {
        self.bound.contains(&index)
    }

    /// Owner paths of the non-variadic descriptors claiming `name`.
    pub fn claimants(&self, name: &str) -> Vec<String> {
        let mut owners: Vec<String> = Vec::new();
        for descriptor in self.global(name) {
            let owner = descriptor.owner_path();
            if !descriptor.is_variadic() && !owners.contains(&owner) {
                owners.push(owner);
            }
        }
        owners
    }

    fn push(&mut self, descriptor: ArgDescriptor) -> usize {
        self.arena.push(descriptor);
        self.arena.len() - 1
    }

    fn describe_leaf(&mut self, component: &str, factory: &dyn LeafFactory, sub: &mut SubTable) {
        for parameter in factory.parameters() {
            let kind = match parameter.kind {
                ParamKind::Normal => ArgKind::Normal,
                ParamKind::VariadicKeyword => ArgKind::VariadicKeyword,
                ParamKind::VariadicPositional => ArgKind::VariadicPositional,
            };
            let index = self.push(ArgDescriptor::new(kind, component, parameter.default.clone()));
            match parameter.kind {
                ParamKind::Normal => {
                    sub.args.insert(parameter.name.clone(), index);
                }
                ParamKind::VariadicKeyword => {
                    sub.variadic.insert(parameter.name.clone(), index);
                    sub.var_keyword = Some(parameter.name.clone());
                }
                ParamKind::VariadicPositional => {
                    sub.variadic.insert(parameter.name.clone(), index);
                    sub.var_positional = Some(parameter.name.clone());
                }
            }
        }
    }

    fn inherit(&mut self, component: &str, child: &Template, sub: &mut SubTable) {
        let inner = &child.tables;
        let mut copies: IndexMap<usize, usize> = IndexMap::new();
        let mut copy = |tables: &mut Tables, index: usize| -> usize {
            *copies
                .entry(index)
                .or_insert_with(|| tables.push(inner.arena[index].nested_under(component)))
        };

        for (child_sub, table) in &inner.subs {
            for (key, &index) in &table.args {
                let descriptor = &inner.arena[index];
                if descriptor.is_catch_all() {
                    continue;
                }
                let keys = if descriptor.is_var() {
                    descriptor.lookup.clone()
                } else if inner
                    .translation
                    .get(key)
                    .is_some_and(|t| t.descriptors.contains(&index))
                {
                    vec![key.clone()]
                } else {
                    vec![format!("{child_sub}_{key}")]
                };
                if keys.is_empty() {
                    continue;
                }
                let copied = copy(self, index);
                for key in keys {
                    sub.args.entry(key).or_insert(copied);
                }
            }
            for (key, &index) in &table.variadic {
                let copied = copy(self, index);
                let key = format!("{child_sub}_{key}");
                if table.var_keyword.is_some() && sub.var_keyword.is_none() {
                    sub.var_keyword = Some(key.clone());
                }
                if table.var_positional.is_some() && sub.var_positional.is_none() {
                    sub.var_positional = Some(key.clone());
                }
                sub.variadic.entry(key).or_insert(copied);
            }
            for (key, &index) in &table.var_component {
                let copied = copy(self, index);
                sub.var_component.entry(key.clone()).or_insert(copied);
            }
        }
        trace!(component, child = child.name(), inherited = copies.len(), "nested descriptors inherited");
    }

    /// Applies the per-component `args` and `defaults` of `spec`.
    fn apply_component_overrides(
        &mut self,
        component: &str,
        spec: &ComponentSpec,
        sub: &mut SubTable,
        scope: &Scope,
    ) -> Result<()> {
        for (arg, value) in &spec.args {
            match sub.args.get(arg).copied() {
                Some(index) => self.replace(index, component, arg, value, scope),
                None if sub.var_keyword.is_some() => {
                    let index = self.push(ArgDescriptor::new(ArgKind::Normal, component, None));
                    self.replace(index, component, arg, value, scope);
                    sub.args.insert(arg.clone(), index);
                }
                None => {
                    return Err(Error::UnknownArgument {
                        component: component.to_string(),
                        argument: arg.clone(),
                    })
                }
            }
        }
        for (arg, value) in &spec.defaults {
            let index = sub.args.get(arg).copied().ok_or_else(|| Error::UnknownArgument {
                component: component.to_string(),
                argument: arg.clone(),
            })?;
            if !self.arena[index].is_var() {
                self.arena[index].default = Some(value.clone());
            }
        }
        Ok(())
    }

    /// Replaces descriptor `index` with an override, keeping its owner.
    fn replace(&mut self, index: usize, component: &str, arg: &str, value: &ArgValue, scope: &Scope) {
        let owner = self.arena[index].owner.clone();
        let mut descriptor = match value {
            ArgValue::Var(var) => {
                self.bound.insert(index);
                describe_var(var, component, arg, scope)
            }
            ArgValue::Literal(value) => {
                self.bound.shift_remove(&index);
                ArgDescriptor::new(ArgKind::Normal, component, Some(value.clone()))
            }
        };
        descriptor.owner = owner;
        self.arena[index] = descriptor;
    }

    fn index_global(&mut self) {
        let mut global: IndexMap<String, Vec<usize>> = IndexMap::new();
        for sub in self.subs.values() {
            let entries = sub
                .args
                .iter()
                .chain(sub.variadic.iter())
                .chain(sub.var_component.iter());
            for (key, &index) in entries {
                let claims = global.entry(key.clone()).or_default();
                if !claims.contains(&index) {
                    claims.push(index);
                }
            }
        }
        self.global = global;
    }

    /// Applies one explicit block-level override.
    fn override_arg(&mut self, template: &str, name: &str, value: &ArgValue, scope: &Scope) -> Result<()> {
        let claims: Vec<usize> = self
            .global
            .get(name)
            .map(|indices| {
                indices
                    .iter()
                    .copied()
                    .filter(|&i| !self.arena[i].is_variadic())
                    .collect()
            })
            .unwrap_or_default();
        match claims.as_slice() {
            [] => Err(Error::UnknownArgument {
                component: template.to_string(),
                argument: name.to_string(),
            }),
            [index] => {
                let owner = self.arena[*index].owner_root().to_string();
                self.replace(*index, &owner, name, value, scope);
                debug!(template, argument = name, %value, "argument overridden");
                Ok(())
            }
            _ => Err(Error::AmbiguousOverride {
                name: name.to_string(),
                claimants: self.claimants(name),
            }),
        }
    }

    fn index_translation(&mut self) {
        let mut claims: IndexMap<String, Vec<(String, usize)>> = IndexMap::new();
        for (component, sub) in &self.subs {
            let named = sub.args.iter().flat_map(|(key, &index)| {
                let descriptor = &self.arena[index];
                let names = if descriptor.is_var() {
                    descriptor.lookup.clone()
                } else {
                    vec![key.clone()]
                };
                names.into_iter().map(move |name| (name, index))
            });
            let components = sub
                .var_component
                .iter()
                .map(|(key, &index)| (key.clone(), index));
            for (name, index) in named.chain(components) {
                let entry = claims.entry(name).or_default();
                if !entry.iter().any(|(_, i)| *i == index) {
                    entry.push((component.clone(), index));
                }
            }
        }

        self.translation = claims
            .into_iter()
            .filter_map(|(name, entries)| {
                let owner = entries.first()?.0.clone();
                if entries.iter().any(|(o, _)| *o != owner) {
                    trace!(name = %name, "ambiguous name left out of translation");
                    return None;
                }
                let descriptors = entries.into_iter().map(|(_, i)| i).collect();
                Some((name, Translation { owner, descriptors }))
            })
            .collect();
    }

    fn layer_default(&mut self, name: &str, value: &Value) {
        let Some(translation) = self.translation.get(name) else {
            return;
        };
        for &index in &translation.descriptors {
            let descriptor = &mut self.arena[index];
            if !descriptor.is_var() {
                descriptor.default = Some(value.clone());
            }
        }
    }

    fn collect_broadcast(&mut self, extra: Vec<String>) {
        let mut broadcast = IndexSet::new();
        for descriptor in self.arena.iter().filter(|d| d.is_var()) {
            broadcast.extend(descriptor.lookup.iter().cloned());
            if let Some(Activation::Var(switch)) = descriptor.variable.as_ref().map(Var::activation) {
                broadcast.extend(switch.kwargs_names("active"));
            }
        }
        broadcast.extend(extra);
        self.broadcast = broadcast;
    }
}

/// Frame the display defaults of variable descriptors are computed in: no
/// keyword arguments, the template defaults as the defaults table.
pub(crate) fn composition_scope(defaults: &ValueMap) -> Scope {
    Scope::new(
        [
            (KWARGS.to_string(), Value::Map(ValueMap::new())),
            (DEFAULTS.to_string(), Value::Map(defaults.clone())),
        ]
        .into(),
    )
}

/// Computes the tables of `template` from its declaration.
pub(crate) fn compose(template: &Template) -> Result<Tables> {
    let scope = composition_scope(&template.defaults);
    let mut tables = Tables::default();
    let mut extra: Vec<String> = Vec::new();

    for (name, spec) in &template.components {
        let mut sub = SubTable::default();
        match &spec.kind {
            SubComponent::Leaf(factory) => tables.describe_leaf(name, factory.as_ref(), &mut sub),
            SubComponent::Template(child) => {
                tables.inherit(name, child, &mut sub);
                extra.extend(child.tables.broadcast.iter().cloned());
                extra.extend(child.active.lookup_names(None, name));
            }
            SubComponent::Var(var) => {
                if !spec.args.is_empty() || !spec.defaults.is_empty() {
                    return Err(Error::invalid(format!(
                        "variable sub-component '{name}' takes its arguments from keyword arguments"
                    )));
                }
                describe_component_var(&mut tables, name, var, &scope, &mut sub);
                extra.extend(var.activation().lookup_names(Some(var), name));
            }
        }
        tables.apply_component_overrides(name, spec, &mut sub, &scope)?;
        tables.subs.insert(name.clone(), sub);
    }

    tables.index_global();
    for (name, value) in &template.args {
        tables.override_arg(&template.name, name, value, &scope)?;
    }
    tables.index_translation();
    for (name, value) in &template.defaults {
        tables.layer_default(name, value);
    }

    extra.extend(template.connection.lookup_names(Group::Connection));
    extra.extend(template.repeat.lookup_names(Group::Repeat));
    tables.collect_broadcast(extra);

    debug!(
        template = %template.name,
        components = tables.subs.len(),
        descriptors = tables.arena.len(),
        translated = tables.translation.len(),
        "template composed"
    );
    Ok(tables)
}

fn describe_component_var(tables: &mut Tables, component: &str, var: &Var, scope: &Scope, sub: &mut SubTable) {
    let mut descriptor = describe_var(var, component, component, scope);
    descriptor.component = true;
    let keys = descriptor.lookup.clone();
    let index = tables.push(descriptor);
    for key in keys {
        sub.var_component.insert(key, index);
    }
}
