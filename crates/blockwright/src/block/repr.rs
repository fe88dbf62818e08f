//! Human-readable renderings of templates and instances.

use std::fmt;

use super::instance::{Instance, Node};
use super::template::Template;
use crate::value::Value;

/// Renders the template signature from its translation table:
/// `Name(required, optional=default, [aliased]=default, conditional*)`.
///
/// Required arguments (no default) come first. A name claimed through
/// several lookup names is bracketed; a conditionally active one is starred.
impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut required = Vec::new();
        let mut optional = Vec::new();
        for (name, descriptor) in self.tables.translated() {
            let mut label = if descriptor.lookup.len() > 1 {
                format!("[{name}]")
            } else {
                name.to_string()
            };
            if descriptor.conditional {
                label.push('*');
            }
            match &descriptor.default {
                None => required.push(label),
                Some(default) => optional.push(format!("{label}={}", quoted(default))),
            }
        }
        write!(f, "{}(", self.name)?;
        for (i, entry) in required.iter().chain(optional.iter()).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{entry}")?;
        }
        write!(f, ")")
    }
}

fn quoted(value: &Value) -> String {
    match value {
        Value::Str(s) => format!("{s:?}"),
        other => other.to_string(),
    }
}

impl Instance {
    /// Indented outline of the constructed tree, one child per line.
    ///
    /// ```text
    /// Stage
    ///   block-0-[2]: Unit x2
    ///     conv: Conv2d
    /// ```
    pub fn outline(&self) -> String {
        let mut out = String::new();
        out.push_str(self.name());
        out.push('\n');
        self.write_outline(&mut out, 1);
        out
    }

    fn write_outline(&self, out: &mut String, depth: usize) {
        for (name, node, repeats) in self.child_entries() {
            out.push_str(&"  ".repeat(depth));
            out.push_str(name);
            out.push_str(": ");
            out.push_str(node.type_name());
            if repeats > 1 {
                out.push_str(&format!(" x{repeats}"));
            }
            out.push('\n');
            if let Node::Block(instance) = node {
                instance.write_outline(out, depth + 1);
            }
        }
    }
}
