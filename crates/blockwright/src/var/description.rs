//! Argument descriptors.
//!
//! A descriptor is the normalized metadata of one formal parameter of one
//! sub-component: its kind, the path of the sub-component that owns it, an
//! optional default and, for variable-typed parameters, the variable and the
//! keyword names it can be satisfied by.

use tracing::trace;

use super::variable::{Request, Var};
use crate::scope::Scope;
use crate::value::Value;

/// Kind of a formal parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    /// Plain named parameter.
    Normal,
    /// Catch-all keyword slot.
    VariadicKeyword,
    /// Catch-all positional slot.
    VariadicPositional,
    /// Parameter bound to a deferred variable.
    Var,
}

/// Metadata for one formal parameter of one sub-component.
#[derive(Debug, Clone)]
pub struct ArgDescriptor {
    pub kind: ArgKind,
    /// Owning sub-component path, outermost first.
    pub owner: Vec<String>,
    pub default: Option<Value>,
    /// The variable, for [`ArgKind::Var`].
    pub variable: Option<Var>,
    /// Keyword names that satisfy the variable.
    pub lookup: Vec<String>,
    /// Participation depends on an activation predicate.
    pub conditional: bool,
    /// Describes a variable-typed sub-component rather than a parameter.
    pub component: bool,
}

impl ArgDescriptor {
    /// Descriptor of a plain or variadic parameter.
    pub fn new(kind: ArgKind, owner: impl Into<String>, default: Option<Value>) -> Self {
        Self {
            kind,
            owner: vec![owner.into()],
            default,
            variable: None,
            lookup: Vec::new(),
            conditional: false,
            component: false,
        }
    }

    pub fn is_var(&self) -> bool {
        self.kind == ArgKind::Var
    }

    /// True for either variadic slot.
    pub fn is_variadic(&self) -> bool {
        matches!(self.kind, ArgKind::VariadicKeyword | ArgKind::VariadicPositional)
    }

    /// Immediate owning sub-component.
    pub fn owner_root(&self) -> &str {
        self.owner.first().map(String::as_str).unwrap_or_default()
    }

    /// Dotted owner path, e.g. `encoder.conv`.
    pub fn owner_path(&self) -> String {
        self.owner.join(".")
    }

    /// Returns a copy owned one level further out, by `component`.
    pub fn nested_under(&self, component: &str) -> Self {
        let mut descriptor = self.clone();
        descriptor.owner.insert(0, component.to_string());
        descriptor
    }

    /// Variable descriptor reading the keyword arguments but with no
    /// addressable name: a catch-all that cannot be routed to.
    pub fn is_catch_all(&self) -> bool {
        self.is_var()
            && self.lookup.is_empty()
            && self.variable.as_ref().is_some_and(Var::reads_kwargs)
    }
}

/// Describes `var` bound to parameter `arg_name` of `component`.
///
/// The display default is computed by resolving the variable against
/// `scope` (the composition frame); a lookup failure there only means the
/// descriptor has no default.
pub fn describe_var(var: &Var, component: &str, arg_name: &str, scope: &Scope) -> ArgDescriptor {
    let lookup = var.kwargs_names(arg_name);
    let default = match var.is_active(Some(component), component, scope) {
        Ok(true) => var
            .raw_value(scope, &Request::new().name(arg_name).prefix(component))
            .ok(),
        Ok(false) | Err(_) => None,
    };
    trace!(component, arg = arg_name, ?lookup, has_default = default.is_some(), "variable described");
    ArgDescriptor {
        kind: ArgKind::Var,
        owner: vec![component.to_string()],
        default,
        variable: Some(var.clone()),
        lookup,
        conditional: var.activation().is_conditional(),
        component: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{DEFAULTS, KWARGS};
    use crate::value::ValueMap;
    use crate::var::Lookup;

    fn composition_scope(defaults: Value) -> Scope {
        Scope::new(
            [
                (KWARGS.to_string(), Value::Map(ValueMap::new())),
                (DEFAULTS.to_string(), defaults),
            ]
            .into(),
        )
    }

    #[test]
    fn test_describe_kwargs_variable() {
        let var = Var::kw("width").default(16);
        let descriptor = describe_var(&var, "conv", "out_channels", &composition_scope(Value::None));
        assert_eq!(descriptor.kind, ArgKind::Var);
        assert_eq!(descriptor.lookup, vec!["width".to_string()]);
        assert_eq!(descriptor.default, Some(Value::Int(16)));
        assert_eq!(descriptor.owner_path(), "conv");
        assert!(!descriptor.conditional);
    }

    #[test]
    fn test_describe_takes_default_from_table() {
        let var = Var::kw("width");
        let scope = composition_scope(Value::map([("width", 8)]));
        let descriptor = describe_var(&var, "conv", "out_channels", &scope);
        assert_eq!(descriptor.default, Some(Value::Int(8)));
    }

    #[test]
    fn test_unnamed_kwargs_variable_uses_arg_name() {
        let descriptor = describe_var(
            &Var::kw_unnamed(),
            "conv",
            "kernel_size",
            &composition_scope(Value::None),
        );
        assert_eq!(descriptor.lookup, vec!["kernel_size".to_string()]);
        assert_eq!(descriptor.default, None);
    }

    #[test]
    fn test_local_variable_has_no_lookup_names() {
        let descriptor = describe_var(&Var::new("x"), "conv", "x", &Scope::default());
        assert!(descriptor.lookup.is_empty());
        assert!(!descriptor.is_catch_all());
    }

    #[test]
    fn test_inactive_variable_has_no_default() {
        let var = Var::kw("width").default(3).active(false);
        let descriptor = describe_var(&var, "conv", "width", &composition_scope(Value::None));
        assert_eq!(descriptor.default, None);
        assert!(descriptor.conditional);

        let gated = Var::kw("width").default(3).active(Lookup::Exists);
        let descriptor = describe_var(&gated, "conv", "width", &composition_scope(Value::None));
        assert!(descriptor.conditional);
    }

    #[test]
    fn test_nested_under_prefixes_owner() {
        let descriptor = ArgDescriptor::new(ArgKind::Normal, "conv", None).nested_under("encoder");
        assert_eq!(descriptor.owner, vec!["encoder".to_string(), "conv".to_string()]);
        assert_eq!(descriptor.owner_root(), "encoder");
    }
}
