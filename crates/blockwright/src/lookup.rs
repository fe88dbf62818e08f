//! Dotted-path lookup primitives.
//!
//! Paths are dot-separated segments (`kwargs.encoder.width`). Each segment is
//! looked up in the value reached so far:
//! - on a [`Value::Map`] by key membership
//! - on a [`Value::Object`] by attribute presence
//! - on anything else the lookup misses
//!
//! A miss partway through a path fails only that lookup.

use crate::error::{Error, Result};
use crate::value::{Value, ValueMap};

/// Looks up `path` inside `context`, returning `None` on any miss.
///
/// ```
/// # use blockwright::{lookup::get_value, Value};
/// let ctx = Value::map([("encoder", Value::map([("width", 64)]))]);
/// assert_eq!(get_value("encoder.width", &ctx), Some(Value::Int(64)));
/// assert_eq!(get_value("encoder.depth", &ctx), None);
/// ```
pub fn get_value(path: &str, context: &Value) -> Option<Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = step(context, first)?;
    for segment in segments {
        current = step(&current, segment)?;
    }
    Some(current)
}

/// Looks up `path` where the first segment is a key of `bindings`.
pub fn get_in(path: &str, bindings: &ValueMap) -> Option<Value> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    let root = bindings.get(head)?;
    match rest {
        Some(rest) => get_value(rest, root),
        None => Some(root.clone()),
    }
}

/// Strict form of [`get_value`]: a miss is a [`Error::LookupFailure`].
pub fn dig(path: &str, context: &Value) -> Result<Value> {
    get_value(path, context).ok_or_else(|| Error::LookupFailure {
        candidates: vec![path.to_string()],
    })
}

/// Checks whether `path` resolves inside `context`.
pub fn contains(path: &str, context: &Value) -> bool {
    get_value(path, context).is_some()
}

fn step(value: &Value, segment: &str) -> Option<Value> {
    match value {
        Value::Map(map) => map.get(segment).cloned(),
        Value::Object(object) => object.attribute(segment),
        _ => None,
    }
}

/// Collects the `<prefix>_<name>` entries of `args` keyed by `name`.
pub fn prefixed(prefix: &str, args: &ValueMap) -> ValueMap {
    let head = format!("{prefix}_");
    args.iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(&head)
                .map(|name| (name.to_string(), value.clone()))
        })
        .collect()
}

/// Like [`prefixed`], but also removes the matched entries from `args`.
pub fn take_prefixed(prefix: &str, args: &mut ValueMap) -> ValueMap {
    let head = format!("{prefix}_");
    let mut taken = ValueMap::new();
    args.retain(|key, value| match key.strip_prefix(&head) {
        Some(name) => {
            taken.insert(name.to_string(), std::mem::take(value));
            false
        }
        None => true,
    });
    taken
}
