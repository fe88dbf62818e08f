//! Component registry.
//!
//! Maps names to leaf factories and templates so that declarative documents
//! can refer to components by name.
//!
//! # Example
//!
//! ```
//! use blockwright::Registry;
//!
//! let registry = Registry::with_builtin_layers();
//! assert!(registry.is_known("Conv2d"));
//! assert!(!registry.is_known("Transformer"));
//! ```

use std::sync::Arc;

use indexmap::IndexMap;

use crate::block::Template;
use crate::factory::{LayerFactory, LeafFactory, Parameter};
use crate::value::Component;

/// Named components available to documents.
#[derive(Clone, Default)]
pub struct Registry {
    components: IndexMap<String, Component>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the generic built-in layers.
    pub fn with_builtin_layers() -> Self {
        let mut registry = Self::new();
        for factory in builtin_layers() {
            registry.register_leaf(factory);
        }
        registry
    }

    /// Registers a leaf factory under its own name.
    pub fn register_leaf(&mut self, factory: Arc<dyn LeafFactory>) {
        self.components
            .insert(factory.name().to_string(), Component::Leaf(factory));
    }

    /// Registers a template under its display name.
    pub fn register_template(&mut self, template: Arc<Template>) {
        self.components
            .insert(template.name().to_string(), Component::Template(template));
    }

    /// Looks up a component by name.
    pub fn get(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    /// Looks up a template by name.
    pub fn template(&self, name: &str) -> Option<&Arc<Template>> {
        match self.components.get(name)? {
            Component::Template(template) => Some(template),
            Component::Leaf(_) => None,
        }
    }

    /// Looks up a leaf factory by name.
    pub fn leaf(&self, name: &str) -> Option<&Arc<dyn LeafFactory>> {
        match self.components.get(name)? {
            Component::Leaf(factory) => Some(factory),
            Component::Template(_) => None,
        }
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    /// Registered templates, in registration order.
    pub fn templates(&self) -> impl Iterator<Item = &Arc<Template>> {
        self.components.values().filter_map(|c| match c {
            Component::Template(template) => Some(template),
            Component::Leaf(_) => None,
        })
    }
}

/// Generic layers whose forward pass is the identity.
pub fn builtin_layers() -> Vec<Arc<dyn LeafFactory>> {
    vec![
        LayerFactory::new("Linear")
            .param(Parameter::required("in_features"))
            .param(Parameter::required("out_features"))
            .param(Parameter::optional("bias", true))
            .shared(),
        LayerFactory::new("Conv2d")
            .param(Parameter::required("in_channels"))
            .param(Parameter::required("out_channels"))
            .param(Parameter::optional("kernel_size", 3))
            .param(Parameter::optional("stride", 1))
            .param(Parameter::optional("padding", 0))
            .shared(),
        LayerFactory::new("BatchNorm")
            .param(Parameter::required("num_features"))
            .param(Parameter::optional("eps", 1e-5))
            .shared(),
        LayerFactory::new("ReLU")
            .param(Parameter::optional("inplace", false))
            .shared(),
        LayerFactory::new("Dropout")
            .param(Parameter::optional("p", 0.5))
            .shared(),
        LayerFactory::new("Identity")
            .param(Parameter::variadic_keyword("kwargs"))
            .shared(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::ParamKind;

    #[test]
    fn test_builtin_lookup() {
        let registry = Registry::with_builtin_layers();
        let conv = registry.leaf("Conv2d").unwrap();
        assert_eq!(conv.parameters()[0].name, "in_channels");
        assert!(registry.template("Conv2d").is_none());
        assert_eq!(registry.names().count(), 6);
    }

    #[test]
    fn test_identity_is_open() {
        let registry = Registry::with_builtin_layers();
        let identity = registry.leaf("Identity").unwrap();
        assert_eq!(identity.parameters()[0].kind, ParamKind::VariadicKeyword);
        assert!(identity.accepts_any_keyword());
    }
}
