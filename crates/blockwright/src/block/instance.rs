//! Block instantiation.
//!
//! Instantiation is a pure function of the template, the construction
//! [`Call`] and the enclosing [`Scope`]. It pushes one frame binding the
//! call's translated keyword arguments and merged defaults, resolves the
//! connection and repeat descriptions against it, then either expands the
//! repeat units or constructs every active sub-component in declaration
//! order.
//!
//! # Keyword routing
//!
//! 1. A bare key claimed in the translation table becomes `<owner>_<key>`.
//! 2. `connection_*` and `repeat_*` keys feed the descriptions.
//! 3. `<sub>_<rest>` is routed to `sub` as `rest`; the longest matching
//!    sub-component name wins.
//! 4. A remaining bare key must be read by some variable of the tree; it
//!    stays visible in the frame and is forwarded to the nested templates
//!    that accept it. Anything else is rejected.

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, instrument, trace};

use super::description::{Connection, Group, Repeat};
use super::spec::{ArgValue, SubComponent};
use super::template::Template;
use crate::error::{Error, Result};
use crate::factory::{bind_arguments, LeafFactory, Module};
use crate::lookup::take_prefixed;
use crate::scope::{Scope, COMPONENT, DEFAULTS, KWARGS, NAME};
use crate::value::{Component, Value, ValueMap};
use crate::var::{Activation, Request, Var};

/// Arguments of one construction call.
#[derive(Debug, Clone, Default)]
pub struct Call {
    pub kwargs: ValueMap,
    /// Compact connection literal or variable.
    pub connection: Option<ArgValue>,
    /// Compact repeat literal or variable.
    pub repeat: Option<ArgValue>,
    /// Defaults layered under the template's own.
    pub defaults: ValueMap,
}

impl Call {
    pub fn new() -> Self {
        Self {
            kwargs: ValueMap::new(),
            connection: None,
            repeat: None,
            defaults: ValueMap::new(),
        }
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    pub fn kwargs(mut self, kwargs: ValueMap) -> Self {
        self.kwargs.extend(kwargs);
        self
    }

    pub fn connection(mut self, connection: impl Into<ArgValue>) -> Self {
        self.connection = Some(connection.into());
        self
    }

    pub fn repeat(mut self, repeat: impl Into<ArgValue>) -> Self {
        self.repeat = Some(repeat.into());
        self
    }

    pub fn default(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    pub fn defaults(mut self, defaults: ValueMap) -> Self {
        self.defaults.extend(defaults);
        self
    }
}

/// A constructed child.
#[derive(Debug)]
pub enum Node {
    Leaf(Box<dyn Module>),
    Block(Instance),
}

impl Node {
    pub fn type_name(&self) -> &str {
        match self {
            Node::Leaf(module) => module.type_name(),
            Node::Block(instance) => instance.name(),
        }
    }

    pub fn as_block(&self) -> Option<&Instance> {
        match self {
            Node::Block(instance) => Some(instance),
            Node::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&dyn Module> {
        match self {
            Node::Leaf(module) => Some(module.as_ref()),
            Node::Block(_) => None,
        }
    }

    /// Constructor arguments of a leaf.
    pub fn arguments(&self) -> Option<&ValueMap> {
        self.as_leaf().and_then(Module::arguments)
    }
}

#[derive(Debug)]
struct Child {
    node: Node,
    repeats: usize,
}

/// One constructed tree node.
#[derive(Debug)]
pub struct Instance {
    name: String,
    children: IndexMap<String, Child>,
    connection: Connection,
    repeat: Repeat,
    init: Option<Value>,
    init_blacklist: Option<Value>,
}

impl Instance {
    /// Name of the template this node was built from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Child names in construction order.
    pub fn block_names(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.children.iter().map(|(k, c)| (k.as_str(), &c.node))
    }

    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.get(name).map(|c| &c.node)
    }

    pub fn last_child(&self) -> Option<&Node> {
        self.children.last().map(|(_, c)| &c.node)
    }

    /// Logical repeats a child stands for: the tie-group size of a repeat
    /// unit, 1 otherwise.
    pub fn repeats(&self, name: &str) -> Option<usize> {
        self.children.get(name).map(|c| c.repeats)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn repeat(&self) -> &Repeat {
        &self.repeat
    }

    pub fn init(&self) -> Option<&Value> {
        self.init.as_ref()
    }

    pub fn init_blacklist(&self) -> Option<&Value> {
        self.init_blacklist.as_ref()
    }

    pub(crate) fn child_entries(&self) -> impl Iterator<Item = (&str, &Node, usize)> {
        self.children
            .iter()
            .map(|(k, c)| (k.as_str(), &c.node, c.repeats))
    }

    fn push(&mut self, name: String, node: Node, repeats: usize) {
        self.children.insert(name, Child { node, repeats });
    }
}

impl Template {
    /// Instantiates the template at the root of a fresh scope chain.
    pub fn build(&self, call: &Call) -> Result<Instance> {
        self.instantiate(call, &Scope::default())
    }

    /// Instantiates the template in a frame pushed on `parent`.
    #[instrument(skip_all, name = "instantiate", fields(template = %self.name))]
    pub fn instantiate(&self, call: &Call, parent: &Scope) -> Result<Instance> {
        let mut kwargs = self.translate(&call.kwargs);
        let connection_kwargs = take_prefixed(Group::Connection.prefix(), &mut kwargs);
        let repeat_kwargs = take_prefixed(Group::Repeat.prefix(), &mut kwargs);
        let routed = self.route(&kwargs)?;

        let mut defaults = call.defaults.clone();
        defaults.extend(self.defaults.iter().map(|(k, v)| (k.clone(), v.clone())));

        let scope = parent.push(self.frame(&kwargs, &defaults, None));
        let connection = Connection::new(self.connection.resolve(
            Group::Connection,
            call.connection.as_ref(),
            connection_kwargs,
            &scope,
        )?);
        let repeat = Repeat::new(self.repeat.resolve(
            Group::Repeat,
            call.repeat.as_ref(),
            repeat_kwargs,
            &scope,
        )?)?;

        let mut instance = Instance {
            name: self.name.clone(),
            children: IndexMap::new(),
            connection,
            repeat,
            init: self.init.clone(),
            init_blacklist: self.init_blacklist.clone(),
        };

        if instance.repeat.is_repeated() {
            self.expand_repeat(&mut instance, kwargs, defaults, &scope)?;
            return Ok(instance);
        }

        for (name, spec) in &self.components {
            let local = scope.push(self.frame(&kwargs, &defaults, Some(name.as_str())));
            let (active, switches) = match &spec.kind {
                SubComponent::Template(child) => (
                    child.is_active(Some(name.as_str()), &local)?,
                    child.active.lookup_names(None, name),
                ),
                SubComponent::Var(var) => (
                    var.is_active(Some(name.as_str()), name, &local)?,
                    var.activation().lookup_names(Some(var), name),
                ),
                SubComponent::Leaf(_) => (true, Vec::new()),
            };
            if !active {
                debug!(component = %name, "inactive sub-component skipped");
                continue;
            }

            let mut related = routed.get(name).cloned().unwrap_or_default();
            related.shift_remove("active");
            for switch in &switches {
                related.shift_remove(switch);
            }

            let node = match &spec.kind {
                SubComponent::Leaf(factory) => {
                    Node::Leaf(self.construct_leaf(name, factory.as_ref(), related, &local)?)
                }
                SubComponent::Template(child) => {
                    Node::Block(self.construct_nested(name, child, related, &defaults, &local)?)
                }
                SubComponent::Var(var) => self.construct_resolved(name, var, related, &defaults, &local)?,
            };
            debug!(component = %name, node = node.type_name(), "sub-component constructed");
            instance.push(name.clone(), node, 1);
        }
        Ok(instance)
    }

    fn frame(&self, kwargs: &ValueMap, defaults: &ValueMap, component: Option<&str>) -> ValueMap {
        let mut bindings = ValueMap::new();
        bindings.insert(KWARGS.to_string(), Value::Map(kwargs.clone()));
        bindings.insert(DEFAULTS.to_string(), Value::Map(defaults.clone()));
        bindings.insert(NAME.to_string(), Value::from(self.name.as_str()));
        if let Some(component) = component {
            bindings.insert(COMPONENT.to_string(), Value::from(component));
        }
        bindings
    }

    /// Rewrites bare keys claimed in the translation table to their
    /// prefixed form. An explicitly prefixed key wins over a translated one.
    fn translate(&self, kwargs: &ValueMap) -> ValueMap {
        let mut translated = ValueMap::new();
        for (key, value) in kwargs {
            match self.tables.translation(key) {
                Some(translation) => {
                    let prefixed = format!("{}_{key}", translation.owner());
                    trace!(from = %key, to = %prefixed, "keyword translated");
                    translated.entry(prefixed).or_insert_with(|| value.clone());
                }
                None => {
                    translated.insert(key.clone(), value.clone());
                }
            }
        }
        translated
    }

    /// Splits `<sub>_<rest>` on the longest declared sub-component name.
    fn split_prefixed<'k>(&self, key: &'k str) -> Option<(&str, &'k str)> {
        self.components
            .keys()
            .filter_map(|name| {
                let rest = key.strip_prefix(name.as_str())?.strip_prefix('_')?;
                (!rest.is_empty()).then_some((name.as_str(), rest))
            })
            .max_by_key(|(name, _)| name.len())
    }

    fn route(&self, kwargs: &ValueMap) -> Result<IndexMap<String, ValueMap>> {
        let mut routed: IndexMap<String, ValueMap> = IndexMap::new();
        let mut bare = Vec::new();

        for (key, value) in kwargs {
            if let Some((component, rest)) = self.split_prefixed(key) {
                routed
                    .entry(component.to_string())
                    .or_default()
                    .insert(rest.to_string(), value.clone());
                continue;
            }
            if self.tables.is_broadcast(key) {
                bare.push((key, value));
                continue;
            }
            let claimants = self.tables.claimants(key);
            if claimants.len() > 1 {
                return Err(Error::AmbiguousOverride {
                    name: key.clone(),
                    claimants,
                });
            }
            return Err(Error::UnknownArgument {
                component: self.name.clone(),
                argument: key.clone(),
            });
        }

        for (key, value) in bare {
            for (name, spec) in &self.components {
                if let SubComponent::Template(child) = &spec.kind {
                    if child.accepts_bare(key) {
                        routed
                            .entry(name.clone())
                            .or_default()
                            .entry(key.clone())
                            .or_insert_with(|| value.clone());
                    }
                }
            }
        }
        Ok(routed)
    }

    fn construct_leaf(
        &self,
        name: &str,
        factory: &dyn LeafFactory,
        related: ValueMap,
        scope: &Scope,
    ) -> Result<Box<dyn Module>> {
        let table = self.tables.sub(name);
        let mut args = ValueMap::new();
        let mut consumed: IndexSet<String> = IndexSet::new();

        for (arg, index) in table.into_iter().flat_map(|t| t.args()) {
            let descriptor = self.tables.descriptor(index);
            consumed.insert(arg.to_string());
            let variable = descriptor.variable.as_ref().filter(|_| descriptor.is_var());
            if let Some(var) = variable {
                consumed.extend(descriptor.lookup.iter().cloned());
                if let Activation::Var(switch) = var.activation() {
                    consumed.extend(switch.kwargs_names("active"));
                }
            }
            if let Some(value) = related.get(arg) {
                args.insert(arg.to_string(), value.clone());
                continue;
            }
            match variable {
                Some(var) => {
                    if var.is_active(Some(name), arg, scope)? {
                        let value = var.value(scope, &Request::new().name(arg).prefix(name))?;
                        args.insert(arg.to_string(), value);
                    } else if let Some(default) = &descriptor.default {
                        args.insert(arg.to_string(), default.clone());
                    }
                }
                None => {
                    if let Some(default) = &descriptor.default {
                        args.insert(arg.to_string(), default.clone());
                    }
                }
            }
        }

        let open = table.and_then(|t| t.var_keyword()).is_some() || factory.accepts_any_keyword();
        for (key, value) in related {
            if consumed.contains(&key) {
                continue;
            }
            if !open {
                return Err(Error::UnknownArgument {
                    component: name.to_string(),
                    argument: key,
                });
            }
            args.insert(key, value);
        }

        let bound = bind_arguments(factory, name, args)?;
        let shown = Value::Map(bound.clone());
        trace!(component = name, args = %shown, "leaf arguments bound");
        factory.build(bound)
    }

    fn construct_nested(
        &self,
        name: &str,
        child: &Template,
        mut related: ValueMap,
        defaults: &ValueMap,
        scope: &Scope,
    ) -> Result<Instance> {
        let mut kwargs = ValueMap::new();
        if let Some(table) = self.tables.sub(name) {
            for (key, index) in table.args() {
                if self.tables.is_bound(index) {
                    for lookup in &self.tables.descriptor(index).lookup {
                        if lookup != key {
                            related.shift_remove(lookup);
                        }
                    }
                }
            }
            for (key, index) in table.args() {
                if related.contains_key(key) {
                    continue;
                }
                let descriptor = self.tables.descriptor(index);
                match descriptor.variable.as_ref().filter(|_| descriptor.is_var()) {
                    Some(var) if self.tables.is_bound(index) => {
                        if var.is_active(Some(name), key, scope)? {
                            let value = var.value(scope, &Request::new().name(key).prefix(name))?;
                            kwargs.insert(key.to_string(), value);
                        }
                    }
                    Some(_) => {}
                    None => {
                        if let Some(default) = &descriptor.default {
                            kwargs.insert(key.to_string(), default.clone());
                        }
                    }
                }
            }
        }
        kwargs.extend(related);
        child.instantiate(&Call::new().kwargs(kwargs).defaults(defaults.clone()), scope)
    }

    fn construct_resolved(
        &self,
        name: &str,
        var: &Var,
        mut related: ValueMap,
        defaults: &ValueMap,
        scope: &Scope,
    ) -> Result<Node> {
        let resolved = var.value(scope, &Request::new().name(name).prefix(name))?;
        for lookup in var.kwargs_names(name) {
            related.shift_remove(&lookup);
        }
        match resolved {
            Value::Component(Component::Leaf(factory)) => {
                debug!(component = name, factory = factory.name(), "variable sub-component resolved");
                Ok(Node::Leaf(self.construct_leaf(name, factory.as_ref(), related, scope)?))
            }
            Value::Component(Component::Template(template)) => {
                debug!(component = name, template = template.name(), "variable sub-component resolved");
                let call = Call::new().kwargs(related).defaults(defaults.clone());
                Ok(Node::Block(template.instantiate(&call, scope)?))
            }
            other => Err(Error::invalid(format!(
                "sub-component '{name}' resolved to a {}, not a component",
                other.kind_name()
            ))),
        }
    }

    fn expand_repeat(
        &self,
        instance: &mut Instance,
        kwargs: ValueMap,
        defaults: ValueMap,
        scope: &Scope,
    ) -> Result<()> {
        let unit = self.repeat_unit(instance.repeat.connection())?;
        let call = Call::new().kwargs(kwargs).defaults(defaults);
        let groups = instance.repeat.groups().to_vec();
        debug!(
            count = instance.repeat.count(),
            tied = instance.repeat.tied(),
            units = groups.len(),
            "expanding repeat"
        );
        for (index, size) in groups.into_iter().enumerate() {
            let label = instance.repeat.unit_label(index);
            let node = unit.instantiate(&call, scope)?;
            trace!(unit = %label, repeats = size, "repeat unit constructed");
            instance.push(label, Node::Block(node), size);
        }
        Ok(())
    }
}
