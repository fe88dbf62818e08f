//! Deferred variables.
//!
//! A [`Var`] stands for a value that is unknown when a template is written
//! and is resolved, once per construction call, against the [`Scope`] of that
//! call.
//!
//! # Resolution
//!
//! 1. Expand the candidates. Each declared (name, context) pair is tried in
//!    priority order; with a prefix `p` the prefixed form is tried right
//!    before the bare one, so `[n1, n2]` becomes `p_n1, n1, p_n2, n2`.
//! 2. Try every candidate against its context. The first hit wins.
//! 3. Try every candidate against the `defaults` binding of the frame (or
//!    the explicitly supplied defaults table).
//! 4. Fall back to the static default, unless the request is strict.
//! 5. Otherwise fail with [`Error::LookupFailure`] naming every candidate.
//!
//! Decorators run in declaration order on whatever step 2-4 produced, so the
//! last declared decorator is the outermost transform.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use super::decorator::Decorator;
use crate::error::{Error, Result};
use crate::lookup::{get_in, get_value};
use crate::scope::{Scope, KWARGS};
use crate::value::{Value, ValueMap};

/// Where a candidate name is looked up.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Context {
    /// The bindings of the frame handed to the resolution call.
    #[default]
    Local,
    /// A dotted path inside the frame bindings, e.g. `kwargs`.
    Named(String),
    /// An explicit value or object.
    Value(Value),
}

impl Context {
    /// The keyword-argument context of a construction call.
    pub fn kwargs() -> Self {
        Context::Named(KWARGS.to_string())
    }

    /// True for the keyword-argument context.
    pub fn is_kwargs(&self) -> bool {
        matches!(self, Context::Named(path) if path == KWARGS)
    }

    /// Materializes the context against `scope`, or `None` when a named
    /// context is itself missing from the frame.
    pub(crate) fn target<'s>(&self, scope: &'s Scope) -> Option<Target<'s>> {
        match self {
            Context::Local => Some(Target::Frame(scope.bindings())),
            Context::Named(path) => get_in(path, scope.bindings()).map(Target::Value),
            Context::Value(value) => Some(Target::Value(value.clone())),
        }
    }
}

impl From<&str> for Context {
    fn from(path: &str) -> Self {
        Context::Named(path.to_string())
    }
}

impl From<Value> for Context {
    fn from(value: Value) -> Self {
        Context::Value(value)
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Context::Local => write!(f, "local"),
            Context::Named(path) => write!(f, "{path}"),
            Context::Value(value) => write!(f, "{value}"),
        }
    }
}

/// A materialized lookup context.
pub(crate) enum Target<'s> {
    Frame(&'s ValueMap),
    Value(Value),
}

impl Target<'_> {
    fn get(&self, path: &str) -> Option<Value> {
        match self {
            Target::Frame(bindings) => get_in(path, bindings),
            Target::Value(value) => get_value(path, value),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Target::Frame(bindings) => Value::Map((*bindings).clone()),
            Target::Value(value) => value.clone(),
        }
    }
}

/// Custom lookup: `(candidate name, context) -> value`.
pub type LookupFn = Arc<dyn Fn(&str, &Value) -> Option<Value> + Send + Sync>;

/// How a candidate is turned into a value.
#[derive(Clone, Default)]
pub enum Lookup {
    /// Dotted-path retrieval.
    #[default]
    Evaluate,
    /// Presence check; the value is `true`, the implicit default `false`.
    Exists,
    /// Caller-supplied retrieval.
    Custom(LookupFn),
}

impl Lookup {
    /// Wraps a closure as a custom lookup.
    pub fn custom(f: impl Fn(&str, &Value) -> Option<Value> + Send + Sync + 'static) -> Self {
        Lookup::Custom(Arc::new(f))
    }

    /// Parses a named strategy.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "evaluate" => Some(Lookup::Evaluate),
            "exists" => Some(Lookup::Exists),
            _ => None,
        }
    }
}

impl fmt::Debug for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Evaluate => write!(f, "Evaluate"),
            Lookup::Exists => write!(f, "Exists"),
            Lookup::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Activation predicate of a variable or template.
#[derive(Debug, Clone)]
pub enum Activation {
    /// Literal flag.
    Flag(bool),
    /// Another variable, resolved under the name `active`.
    Var(Box<Var>),
    /// A lookup strategy applied to the subject's own candidates.
    Lookup(Lookup),
}

impl Default for Activation {
    fn default() -> Self {
        Activation::Flag(true)
    }
}

impl From<bool> for Activation {
    fn from(flag: bool) -> Self {
        Activation::Flag(flag)
    }
}

impl From<Var> for Activation {
    fn from(var: Var) -> Self {
        Activation::Var(Box::new(var))
    }
}

impl From<Lookup> for Activation {
    fn from(lookup: Lookup) -> Self {
        Activation::Lookup(lookup)
    }
}

impl Activation {
    /// True unless the activation is the literal `true`.
    pub fn is_conditional(&self) -> bool {
        !matches!(self, Activation::Flag(true))
    }

    /// Kwargs-context names consulted while evaluating this activation.
    pub fn lookup_names(&self, subject: Option<&Var>, name: &str) -> Vec<String> {
        match self {
            Activation::Flag(_) => Vec::new(),
            Activation::Var(var) => var.kwargs_names("active"),
            Activation::Lookup(_) => match subject {
                Some(var) => var.kwargs_names(name),
                None => vec![name.to_string()],
            },
        }
    }

    /// Evaluates the activation.
    ///
    /// A [`Activation::Lookup`] builds an ephemeral variable over the
    /// candidates of `subject` (or over the keyword `name` when there is no
    /// subject) using the strategy, with a default of `false`.
    pub fn evaluate(
        &self,
        subject: Option<&Var>,
        prefix: Option<&str>,
        name: &str,
        scope: &Scope,
    ) -> Result<bool> {
        match self {
            Activation::Flag(flag) => Ok(*flag),
            Activation::Var(var) => {
                let request = Request::new().name("active").prefix_opt(prefix);
                Ok(var.value(scope, &request)?.truthy())
            }
            Activation::Lookup(lookup) => {
                let ephemeral = match subject {
                    Some(var) => var.ephemeral(lookup.clone()),
                    None => Var::kw_unnamed().lookup(lookup.clone()).default(false),
                };
                let request = Request::new().name(name).prefix_opt(prefix);
                Ok(ephemeral.value(scope, &request)?.truthy())
            }
        }
    }
}

/// Parameters of one resolution call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Request<'a> {
    /// Name used for candidates the variable declares without a name.
    pub name: Option<&'a str>,
    /// Prefix tried before each bare candidate.
    pub prefix: Option<&'a str>,
    /// Defaults table used when the frame binds none.
    pub defaults: Option<&'a Value>,
    /// Use `name` verbatim and never fall back to the static default.
    pub strict: bool,
}

impl<'a> Request<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    pub fn prefix(mut self, prefix: &'a str) -> Self {
        self.prefix = Some(prefix);
        self
    }

    pub fn prefix_opt(mut self, prefix: Option<&'a str>) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn defaults(mut self, defaults: &'a Value) -> Self {
        self.defaults = Some(defaults);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// One expanded (name, context) candidate.
#[derive(Debug, Clone)]
struct Candidate<'v> {
    name: String,
    context: &'v Context,
}

/// A deferred value.
///
/// Immutable once built; the builder methods consume and return `self`.
///
/// ```
/// # use blockwright::{Scope, Value, Var, Request};
/// # use blockwright::scope::KWARGS;
/// let width = Var::kw("width").default(32);
/// let scope = Scope::new([(KWARGS.to_string(), Value::map([("conv_width", 64)]))].into());
/// let value = width.value(&scope, &Request::new().prefix("conv")).unwrap();
/// assert_eq!(value, Value::Int(64));
/// ```
#[derive(Debug, Clone)]
pub struct Var {
    names: Vec<Option<String>>,
    contexts: Vec<Context>,
    active: Activation,
    lookup: Lookup,
    default: Option<Value>,
    decorators: Vec<Decorator>,
}

impl Var {
    fn from_parts(names: Vec<Option<String>>, contexts: Vec<Context>) -> Self {
        Self {
            names,
            contexts,
            active: Activation::default(),
            lookup: Lookup::Evaluate,
            default: None,
            decorators: Vec::new(),
        }
    }

    /// A variable looked up by `name` in the local frame.
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_parts(vec![Some(name.into())], vec![Context::Local])
    }

    /// A variable whose name is supplied by the resolution call.
    pub fn unnamed() -> Self {
        Self::from_parts(vec![None], vec![Context::Local])
    }

    /// A variable looked up by `name` among the call's keyword arguments.
    pub fn kw(name: impl Into<String>) -> Self {
        Self::from_parts(vec![Some(name.into())], vec![Context::kwargs()])
    }

    /// An unnamed variable looked up among the call's keyword arguments.
    pub fn kw_unnamed() -> Self {
        Self::from_parts(vec![None], vec![Context::kwargs()])
    }

    /// A priority variable over `names`, all looked up in the local frame.
    pub fn priority<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        let names: Vec<_> = names.into_iter().map(|n| Some(n.into())).collect();
        Self::from_parts(names, vec![Context::Local])
    }

    /// Builds a variable from parallel name and context lists.
    ///
    /// The lists must have equal length, or one of them length 1 (it is then
    /// broadcast against the other).
    pub fn with_candidates(names: Vec<Option<String>>, contexts: Vec<Context>) -> Result<Self> {
        if names.is_empty() || contexts.is_empty() {
            return Err(Error::invalid("a variable needs at least one name and context"));
        }
        if names.len() != contexts.len() && names.len() != 1 && contexts.len() != 1 {
            return Err(Error::invalid(format!(
                "variable declares {} names but {} contexts",
                names.len(),
                contexts.len()
            )));
        }
        Ok(Self::from_parts(names, contexts))
    }

    /// Looks every candidate up in `context`.
    pub fn context(mut self, context: impl Into<Context>) -> Self {
        self.contexts = vec![context.into()];
        self
    }

    /// Sets the static default.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets the activation predicate.
    pub fn active(mut self, active: impl Into<Activation>) -> Self {
        self.active = active.into();
        self
    }

    /// Sets the lookup strategy.
    pub fn lookup(mut self, lookup: Lookup) -> Self {
        self.lookup = lookup;
        self
    }

    /// Appends a decorator; later decorators wrap earlier ones.
    pub fn decorate(mut self, decorator: Decorator) -> Self {
        self.decorators.push(decorator);
        self
    }

    /// Appends a closure decorator.
    pub fn map(self, f: impl Fn(Value) -> Result<Value> + Send + Sync + 'static) -> Self {
        self.decorate(Decorator::map(f))
    }

    /// Appends a logging decorator.
    pub fn tee(self, message: impl Into<String>) -> Self {
        self.decorate(Decorator::Tee(message.into()))
    }

    /// Appends a decorator treating the value as a path into `context`.
    pub fn dig(self, context: impl Into<Context>) -> Self {
        self.decorate(Decorator::Dig(context.into()))
    }

    /// First declared name, if any.
    pub fn name(&self) -> Option<&str> {
        self.names.first().and_then(|n| n.as_deref())
    }

    /// True when the variable carries several (name, context) pairs.
    pub fn is_priority(&self) -> bool {
        self.names.len().max(self.contexts.len()) > 1
    }

    pub fn activation(&self) -> &Activation {
        &self.active
    }

    pub fn static_default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn decorators(&self) -> &[Decorator] {
        &self.decorators
    }

    /// Declared (name, context) pairs after broadcasting.
    pub fn pairs(&self) -> Vec<(Option<&str>, &Context)> {
        let len = self.names.len().max(self.contexts.len());
        (0..len)
            .map(|i| {
                let name = &self.names[if self.names.len() == 1 { 0 } else { i }];
                let context = &self.contexts[if self.contexts.len() == 1 { 0 } else { i }];
                (name.as_deref(), context)
            })
            .collect()
    }

    /// Names looked up among the keyword arguments, with `fallback`
    /// standing in for unnamed candidates. Dotted names are not
    /// independently addressable and are skipped.
    pub fn kwargs_names(&self, fallback: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for (name, context) in self.pairs() {
            if !context.is_kwargs() {
                continue;
            }
            let name = name.unwrap_or(fallback);
            if name.contains('.') || names.iter().any(|n| n == name) {
                continue;
            }
            names.push(name.to_string());
        }
        names
    }

    /// True when any candidate is looked up among the keyword arguments.
    pub fn reads_kwargs(&self) -> bool {
        self.contexts.iter().any(Context::is_kwargs)
    }

    fn ephemeral(&self, lookup: Lookup) -> Var {
        Var {
            names: self.names.clone(),
            contexts: self.contexts.clone(),
            active: Activation::default(),
            lookup,
            default: Some(Value::Bool(false)),
            decorators: Vec::new(),
        }
    }

    /// Evaluates the activation predicate of this variable.
    pub fn is_active(&self, prefix: Option<&str>, name: &str, scope: &Scope) -> Result<bool> {
        self.active.evaluate(Some(self), prefix, name, scope)
    }

    fn candidates(&self, request: &Request<'_>) -> Result<Vec<Candidate<'_>>> {
        let mut candidates = Vec::new();
        for (declared, context) in self.pairs() {
            let base = if request.strict {
                request.name.or(declared)
            } else {
                declared.or(request.name)
            };
            let base = base.ok_or_else(|| Error::invalid("no name is provided for the variable"))?;
            if let Some(prefix) = request.prefix {
                candidates.push(Candidate {
                    name: format!("{prefix}_{base}"),
                    context,
                });
            }
            candidates.push(Candidate {
                name: base.to_string(),
                context,
            });
        }
        Ok(candidates)
    }

    fn fetch(&self, candidate: &Candidate<'_>, scope: &Scope) -> Option<Value> {
        let Some(target) = candidate.context.target(scope) else {
            trace!(name = %candidate.name, context = %candidate.context, "context missing");
            return None;
        };
        let found = match &self.lookup {
            Lookup::Evaluate => target.get(&candidate.name),
            Lookup::Exists => target.get(&candidate.name).map(|_| Value::Bool(true)),
            Lookup::Custom(f) => f(&candidate.name, &target.to_value()),
        };
        trace!(name = %candidate.name, context = %candidate.context, hit = found.is_some(), "candidate");
        found
    }

    /// Resolves the variable without applying decorators.
    pub fn raw_value(&self, scope: &Scope, request: &Request<'_>) -> Result<Value> {
        let candidates = self.candidates(request)?;

        for candidate in &candidates {
            if let Some(value) = self.fetch(candidate, scope) {
                return Ok(value);
            }
        }

        if let Some(defaults) = scope.defaults().or(request.defaults) {
            for candidate in &candidates {
                if let Some(value) = get_value(&candidate.name, defaults) {
                    trace!(name = %candidate.name, "defaults table hit");
                    return Ok(match self.lookup {
                        Lookup::Exists => Value::Bool(true),
                        _ => value,
                    });
                }
            }
        }

        if !request.strict {
            if let Some(default) = &self.default {
                return Ok(default.clone());
            }
            if matches!(self.lookup, Lookup::Exists) {
                return Ok(Value::Bool(false));
            }
        }

        Err(Error::LookupFailure {
            candidates: candidates.into_iter().map(|c| c.name).collect(),
        })
    }

    /// Resolves the variable and applies its decorators.
    pub fn value(&self, scope: &Scope, request: &Request<'_>) -> Result<Value> {
        let raw = self.raw_value(scope, request)?;
        self.decorators
            .iter()
            .try_fold(raw, |value, decorator| decorator.apply(value, scope))
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut args = Vec::new();
        let names: Vec<&str> = self.names.iter().filter_map(|n| n.as_deref()).collect();
        match names.as_slice() {
            [] => {}
            [name] => args.push(format!("name=\"{name}\"")),
            many => args.push(format!("name={many:?}")),
        }
        let contexts: Vec<String> = self
            .contexts
            .iter()
            .filter(|c| !matches!(c, Context::Local))
            .map(|c| format!("\"{c}\""))
            .collect();
        if !contexts.is_empty() {
            args.push(format!("context={}", contexts.join("|")));
        }
        if let Some(default) = &self.default {
            args.push(format!("default={default}"));
        }
        if self.active.is_conditional() {
            args.push("active=?".to_string());
        }
        write!(f, "Var({})", args.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::DEFAULTS;

    fn frame(entries: &[(&str, Value)]) -> Scope {
        Scope::new(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    fn kwargs(entries: &[(&str, Value)]) -> Scope {
        let map: ValueMap = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        frame(&[(KWARGS, Value::Map(map))])
    }

    #[test]
    fn test_local_lookup() {
        let scope = frame(&[("width", Value::Int(16))]);
        let value = Var::new("width").value(&scope, &Request::new()).unwrap();
        assert_eq!(value, Value::Int(16));
    }

    #[test]
    fn test_prefixed_first_priority_wins() {
        let scope = kwargs(&[("p_a", Value::Int(1)), ("b", Value::Int(2))]);
        let var = Var::priority(["a", "b"]).context(Context::kwargs());
        let value = var.value(&scope, &Request::new().prefix("p")).unwrap();
        assert_eq!(value, Value::Int(1));
    }

    #[test]
    fn test_adjacent_prefix_ordering() {
        // `a` bare beats `p_b` because pairs are tried adjacently.
        let scope = kwargs(&[("a", Value::Int(1)), ("p_b", Value::Int(2))]);
        let var = Var::priority(["a", "b"]).context(Context::kwargs());
        let value = var.value(&scope, &Request::new().prefix("p")).unwrap();
        assert_eq!(value, Value::Int(1));
    }

    #[test]
    fn test_default_precedence() {
        let var = Var::kw("width").default(1);
        let defaults = Value::map([("width", 2)]);

        let both = frame(&[
            (KWARGS, Value::map([("width", 3)])),
            (DEFAULTS, defaults.clone()),
        ]);
        assert_eq!(var.value(&both, &Request::new()).unwrap(), Value::Int(3));

        let table_only = frame(&[(KWARGS, Value::Map(ValueMap::new())), (DEFAULTS, defaults)]);
        assert_eq!(var.value(&table_only, &Request::new()).unwrap(), Value::Int(2));

        let neither = kwargs(&[]);
        assert_eq!(var.value(&neither, &Request::new()).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_context_value_beats_earlier_defaults_entry() {
        let var = Var::priority(["a", "b"]).context(Context::kwargs());
        let scope = frame(&[
            (KWARGS, Value::map([("b", 5)])),
            (DEFAULTS, Value::map([("a", 9)])),
        ]);
        assert_eq!(var.value(&scope, &Request::new()).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_frame_defaults_override_request_defaults() {
        let var = Var::new("x");
        let supplied = Value::map([("x", 1)]);
        let scope = frame(&[(DEFAULTS, Value::map([("x", 2)]))]);
        let request = Request::new().defaults(&supplied);
        assert_eq!(var.value(&scope, &request).unwrap(), Value::Int(2));
        assert_eq!(var.value(&Scope::default(), &request).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_lookup_failure_lists_candidates() {
        let var = Var::priority(["a", "b"]);
        let error = var
            .value(&Scope::default(), &Request::new().prefix("p"))
            .unwrap_err();
        assert_eq!(
            error,
            Error::LookupFailure {
                candidates: vec!["p_a".into(), "a".into(), "p_b".into(), "b".into()]
            }
        );
    }

    #[test]
    fn test_strict_skips_static_default() {
        let var = Var::unnamed().default(4);
        let request = Request::new().name("x").strict(true);
        assert!(var.value(&Scope::default(), &request).is_err());
        assert_eq!(
            var.value(&Scope::default(), &Request::new().name("x")).unwrap(),
            Value::Int(4)
        );
    }

    #[test]
    fn test_unnamed_without_request_name_is_invalid() {
        let error = Var::unnamed()
            .value(&Scope::default(), &Request::new())
            .unwrap_err();
        assert!(matches!(error, Error::InvalidSpec(_)));
    }

    #[test]
    fn test_dotted_miss_fails_only_that_candidate() {
        let scope = frame(&[("cfg", Value::map([("width", 8)]))]);
        let var = Var::priority(["cfg.depth", "cfg.width"]);
        assert_eq!(var.value(&scope, &Request::new()).unwrap(), Value::Int(8));
    }

    #[test]
    fn test_exists_lookup() {
        let scope = kwargs(&[("previous", Value::None)]);
        let present = Var::kw("previous").lookup(Lookup::Exists);
        let absent = Var::kw("next").lookup(Lookup::Exists);
        assert_eq!(present.value(&scope, &Request::new()).unwrap(), Value::Bool(true));
        assert_eq!(absent.value(&scope, &Request::new()).unwrap(), Value::Bool(false));
        let overridden = Var::kw("next").lookup(Lookup::Exists).default(true);
        assert_eq!(overridden.value(&scope, &Request::new()).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_custom_lookup() {
        let upper = Lookup::custom(|name, ctx| get_value(&name.to_uppercase(), ctx));
        let scope = frame(&[("WIDTH", Value::Int(3))]);
        let var = Var::new("width").lookup(upper);
        assert_eq!(var.value(&scope, &Request::new()).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_explicit_value_context() {
        let var = Var::new("width").context(Value::map([("width", 12)]));
        assert_eq!(
            var.value(&Scope::default(), &Request::new()).unwrap(),
            Value::Int(12)
        );
    }

    #[test]
    fn test_decorators_apply_in_declaration_order() {
        let var = Var::new("x")
            .map(|v| Ok(Value::Int(v.as_int().unwrap_or(0) + 1)))
            .map(|v| Ok(Value::Int(v.as_int().unwrap_or(0) * 10)));
        let scope = frame(&[("x", Value::Int(2))]);
        assert_eq!(var.value(&scope, &Request::new()).unwrap(), Value::Int(30));
        assert_eq!(var.raw_value(&scope, &Request::new()).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_broadcast_and_mismatch() {
        let var = Var::with_candidates(
            vec![Some("a".into())],
            vec![Context::kwargs(), Context::Local],
        )
        .unwrap();
        assert!(var.is_priority());
        assert_eq!(var.pairs().len(), 2);

        let mismatch = Var::with_candidates(
            vec![Some("a".into()), Some("b".into())],
            vec![Context::Local, Context::Local, Context::kwargs()],
        );
        assert!(matches!(mismatch, Err(Error::InvalidSpec(_))));
        assert!(!Var::kw("a").is_priority());
    }

    #[test]
    fn test_activation_variable_uses_active_name() {
        let var = Var::kw("width").active(Var::kw_unnamed().default(true));
        let off = kwargs(&[("conv_active", Value::Bool(false))]);
        assert!(!var.is_active(Some("conv"), "conv", &off).unwrap());
        assert!(var.is_active(Some("conv"), "conv", &kwargs(&[])).unwrap());
    }

    #[test]
    fn test_activation_lookup_builds_ephemeral_variable() {
        let var = Var::kw("previous").active(Lookup::Exists);
        assert!(!var.is_active(None, "previous", &kwargs(&[])).unwrap());
        let scope = kwargs(&[("previous", Value::Int(0))]);
        assert!(var.is_active(None, "previous", &scope).unwrap());
    }

    #[test]
    fn test_kwargs_names_skip_dotted_and_local() {
        let var = Var::with_candidates(
            vec![Some("a".into()), None, Some("cfg.width".into()), Some("b".into())],
            vec![Context::kwargs(), Context::kwargs(), Context::kwargs(), Context::Local],
        )
        .unwrap();
        assert_eq!(var.kwargs_names("arg"), vec!["a".to_string(), "arg".to_string()]);
    }

    #[test]
    fn test_display() {
        let var = Var::kw("width").default(3);
        assert_eq!(var.to_string(), "Var(name=\"width\", context=\"kwargs\", default=3)");
    }
}
