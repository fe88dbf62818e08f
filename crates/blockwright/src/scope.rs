//! Resolution scopes.
//!
//! A [`Scope`] is an immutable linked chain of frames. Each frame is an
//! ordered set of named bindings; a resolution call searches the frame it is
//! handed, and callers that want an outer frame pass [`Scope::parent`] or
//! [`Scope::ancestor`] explicitly.
//!
//! Every block instantiation pushes one frame:
//!
//! | binding     | content                                          |
//! |-------------|--------------------------------------------------|
//! | `kwargs`    | the call's keyword arguments after translation   |
//! | `defaults`  | merged default table of the call                 |
//! | `name`      | display name of the template being instantiated |
//! | `component` | sub-component being processed, when any          |

use std::sync::Arc;

use crate::value::{Value, ValueMap};

/// Binding holding the keyword arguments of a construction call.
pub const KWARGS: &str = "kwargs";
/// Binding consulted as the defaults table during resolution.
pub const DEFAULTS: &str = "defaults";
/// Binding holding the template display name.
pub const NAME: &str = "name";
/// Binding holding the sub-component currently being processed.
pub const COMPONENT: &str = "component";

#[derive(Debug)]
struct Frame {
    bindings: ValueMap,
    parent: Option<Scope>,
}

/// Handle to one frame of the resolution chain.
///
/// Cloning is cheap; frames are shared and never mutated once pushed.
#[derive(Debug, Clone)]
pub struct Scope {
    frame: Arc<Frame>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new(ValueMap::new())
    }
}

impl Scope {
    /// Creates a root frame holding `bindings`.
    pub fn new(bindings: ValueMap) -> Self {
        Self {
            frame: Arc::new(Frame {
                bindings,
                parent: None,
            }),
        }
    }

    /// Pushes a child frame on top of this one.
    pub fn push(&self, bindings: ValueMap) -> Scope {
        Scope {
            frame: Arc::new(Frame {
                bindings,
                parent: Some(self.clone()),
            }),
        }
    }

    /// Bindings of this frame only ("local context capture").
    pub fn bindings(&self) -> &ValueMap {
        &self.frame.bindings
    }

    /// Looks up a binding of this frame.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frame.bindings.get(name)
    }

    /// The frame this one was pushed on.
    pub fn parent(&self) -> Option<&Scope> {
        self.frame.parent.as_ref()
    }

    /// The frame `levels` links up; `ancestor(0)` is this frame.
    pub fn ancestor(&self, levels: usize) -> Option<&Scope> {
        let mut scope = self;
        for _ in 0..levels {
            scope = scope.parent()?;
        }
        Some(scope)
    }

    /// Number of frames in the chain, this one included.
    pub fn depth(&self) -> usize {
        std::iter::successors(Some(self), |scope| scope.parent()).count()
    }

    /// Keyword arguments bound in this frame, if any.
    pub fn kwargs(&self) -> Option<&ValueMap> {
        self.get(KWARGS).and_then(Value::as_map)
    }

    /// Defaults table bound in this frame, if any.
    pub fn defaults(&self) -> Option<&Value> {
        self.get(DEFAULTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_frames_separate() {
        let root = Scope::new([("width".to_string(), Value::Int(8))].into_iter().collect());
        let child = root.push([("depth".to_string(), Value::Int(2))].into_iter().collect());

        assert_eq!(child.get("depth"), Some(&Value::Int(2)));
        assert_eq!(child.get("width"), None);
        assert_eq!(child.parent().and_then(|p| p.get("width")), Some(&Value::Int(8)));
        assert_eq!(child.depth(), 2);
    }

    #[test]
    fn test_ancestor_walks_links() {
        let root = Scope::default();
        let leaf = root.push(ValueMap::new()).push(ValueMap::new());
        assert_eq!(leaf.ancestor(0).map(Scope::depth), Some(3));
        assert_eq!(leaf.ancestor(2).map(Scope::depth), Some(1));
        assert!(leaf.ancestor(3).is_none());
    }
}
