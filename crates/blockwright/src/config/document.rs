//! Template and build documents.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value as Yaml;
use thiserror::Error;
use tracing::{debug, warn};

use super::convert::{to_activation, to_arg, to_value, to_var};
use crate::block::{Call, ComponentSpec, SubComponent, Template};
use crate::error::Error;
use crate::registry::Registry;
use crate::value::ValueMap;

/// Supported document API version.
pub const API_VERSION: &str = "blockwright/v1";

/// Errors that can occur when loading or converting a document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the document file.
    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the document YAML.
    #[error("failed to parse document YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid API version.
    #[error("invalid apiVersion: expected 'blockwright/v1', got '{0}'")]
    InvalidApiVersion(String),

    /// Invalid kind.
    #[error("invalid kind: expected '{expected}', got '{found}'")]
    InvalidKind { expected: String, found: String },

    /// Missing required field.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A referenced component is not registered.
    #[error("component '{0}' is not registered")]
    UnknownComponent(String),

    /// Malformed document content.
    #[error("invalid document: {0}")]
    Invalid(String),

    /// The declared template failed to compose or build.
    #[error(transparent)]
    Template(#[from] Error),
}

/// Result type for document operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

fn default_api_version() -> String {
    API_VERSION.to_string()
}

/// Document metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// Template display name, also its registry name.
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,
}

/// One sub-component entry of a template document.
///
/// Exactly one of `leaf`, `template` or `var` must be given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentDocument {
    #[serde(default)]
    pub leaf: Option<String>,

    #[serde(default)]
    pub template: Option<String>,

    /// Variable resolving to a component at construction time.
    #[serde(default)]
    pub var: Option<Yaml>,

    #[serde(default)]
    pub args: IndexMap<String, Yaml>,

    #[serde(default)]
    pub defaults: IndexMap<String, Yaml>,
}

impl ComponentDocument {
    fn to_spec(&self, component: &str, registry: &Registry) -> ConfigResult<ComponentSpec> {
        let kind = match (&self.leaf, &self.template, &self.var) {
            (Some(name), None, None) => SubComponent::Leaf(
                registry
                    .leaf(name)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownComponent(name.clone()))?,
            ),
            (None, Some(name), None) => SubComponent::Template(
                registry
                    .template(name)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownComponent(name.clone()))?,
            ),
            (None, None, Some(var)) => SubComponent::Var(to_var(var, registry)?),
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "component '{component}' must declare exactly one of leaf, template or var"
                )))
            }
        };

        let mut spec = ComponentSpec::new(kind);
        for (name, value) in &self.args {
            spec = spec.arg(name.clone(), to_arg(value, registry)?);
        }
        for (name, value) in &self.defaults {
            spec = spec.default(name.clone(), to_value(value, registry)?);
        }
        Ok(spec)
    }
}

/// A declarative block template.
///
/// ```yaml
/// apiVersion: blockwright/v1
/// kind: Template
/// metadata:
///   name: Bottleneck
/// defaults:
///   kernel_size: 3
/// args:
///   out_channels: {var: {name: width, context: kwargs}}
/// connection: residual
/// components:
///   conv:
///     leaf: Conv2d
///   act:
///     leaf: ReLU
/// ```
///
/// `connection_<field>` and `repeat_<field>` keys declare the exploded form
/// of the connection and repeat descriptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDocument {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "template_kind")]
    pub kind: String,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default)]
    pub active: Option<Yaml>,

    #[serde(default)]
    pub defaults: IndexMap<String, Yaml>,

    /// Explicit argument overrides.
    #[serde(default)]
    pub args: IndexMap<String, Yaml>,

    #[serde(default)]
    pub connection: Option<Yaml>,

    #[serde(default)]
    pub repeat: Option<Yaml>,

    #[serde(default)]
    pub init: Option<Yaml>,

    #[serde(default, alias = "init_blacklist")]
    pub init_blacklist: Option<Yaml>,

    /// Sub-components in declaration order.
    #[serde(default)]
    pub components: IndexMap<String, ComponentDocument>,

    /// Exploded `connection_*` / `repeat_*` fields.
    #[serde(flatten)]
    pub fields: IndexMap<String, Yaml>,
}

fn template_kind() -> String {
    "Template".to_string()
}

impl TemplateDocument {
    /// Load a template document from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a template document from a YAML string.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let document: TemplateDocument = serde_yaml::from_str(yaml)?;
        document.validate_schema()?;
        Ok(document)
    }

    fn validate_schema(&self) -> ConfigResult<()> {
        validate_header(&self.api_version, &self.kind, "Template")?;
        if self.metadata.name.is_empty() {
            return Err(ConfigError::MissingField("metadata.name".to_string()));
        }
        if let Some(key) = self
            .fields
            .keys()
            .find(|k| !k.starts_with("connection_") && !k.starts_with("repeat_"))
        {
            return Err(ConfigError::Invalid(format!("unknown field '{key}'")));
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Names of the registry components this document refers to.
    pub fn references(&self) -> Vec<&str> {
        self.components
            .values()
            .filter_map(|c| c.leaf.as_deref().or(c.template.as_deref()))
            .collect()
    }

    /// Composes the template, resolving component names in `registry`.
    pub fn to_template(&self, registry: &Registry) -> ConfigResult<Arc<Template>> {
        let mut builder = Template::builder(self.metadata.name.clone());
        if let Some(active) = &self.active {
            builder = builder.active(to_activation(active, registry)?);
        }
        for (name, component) in &self.components {
            builder = builder.component(name.clone(), component.to_spec(name, registry)?);
        }
        for (name, value) in &self.args {
            builder = builder.arg(name.clone(), to_arg(value, registry)?);
        }
        for (name, value) in &self.defaults {
            builder = builder.default(name.clone(), to_arg(value, registry)?);
        }
        if let Some(init) = &self.init {
            builder = builder.init(to_value(init, registry)?);
        }
        if let Some(blacklist) = &self.init_blacklist {
            builder = builder.init_blacklist(to_value(blacklist, registry)?);
        }
        if let Some(connection) = &self.connection {
            builder = builder.connection(to_arg(connection, registry)?);
        }
        if let Some(repeat) = &self.repeat {
            builder = builder.repeat(to_arg(repeat, registry)?);
        }
        for (key, value) in &self.fields {
            let arg = to_arg(value, registry)?;
            builder = match (key.strip_prefix("connection_"), key.strip_prefix("repeat_")) {
                (Some(field), _) => builder.connection_field(field, arg),
                (_, Some(field)) => builder.repeat_field(field, arg),
                _ => return Err(ConfigError::Invalid(format!("unknown field '{key}'"))),
            };
        }

        let template = builder.build()?;
        debug!(template = template.name(), "template document converted");
        Ok(template)
    }
}

/// A concrete construction call against a registered template.
///
/// ```yaml
/// apiVersion: blockwright/v1
/// kind: Build
/// template: Stage
/// kwargs:
///   width: 64
/// repeat: 3
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildDocument {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "build_kind")]
    pub kind: String,

    #[serde(default)]
    pub template: String,

    #[serde(default)]
    pub kwargs: IndexMap<String, Yaml>,

    #[serde(default)]
    pub connection: Option<Yaml>,

    #[serde(default)]
    pub repeat: Option<Yaml>,

    #[serde(default)]
    pub defaults: IndexMap<String, Yaml>,
}

fn build_kind() -> String {
    "Build".to_string()
}

impl BuildDocument {
    /// Create a build request for `template`.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            api_version: default_api_version(),
            kind: build_kind(),
            template: template.into(),
            kwargs: IndexMap::new(),
            connection: None,
            repeat: None,
            defaults: IndexMap::new(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let document: BuildDocument = serde_yaml::from_str(yaml)?;
        document.validate_schema()?;
        Ok(document)
    }

    fn validate_schema(&self) -> ConfigResult<()> {
        validate_header(&self.api_version, &self.kind, "Build")?;
        if self.template.is_empty() {
            return Err(ConfigError::MissingField("template".to_string()));
        }
        Ok(())
    }

    /// Builder method: set a keyword argument.
    pub fn with_kwarg(mut self, name: impl Into<String>, value: impl Into<Yaml>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    /// Builder method: set the compact repeat description.
    pub fn with_repeat(mut self, repeat: impl Into<Yaml>) -> Self {
        self.repeat = Some(repeat.into());
        self
    }

    /// The requested template.
    pub fn template(&self, registry: &Registry) -> ConfigResult<Arc<Template>> {
        registry
            .template(&self.template)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownComponent(self.template.clone()))
    }

    /// Converts the request into a construction call.
    pub fn to_call(&self, registry: &Registry) -> ConfigResult<Call> {
        let mut kwargs = ValueMap::new();
        for (name, value) in &self.kwargs {
            kwargs.insert(name.clone(), to_value(value, registry)?);
        }
        let mut defaults = ValueMap::new();
        for (name, value) in &self.defaults {
            defaults.insert(name.clone(), to_value(value, registry)?);
        }
        let mut call = Call::new().kwargs(kwargs).defaults(defaults);
        if let Some(connection) = &self.connection {
            call = call.connection(to_arg(connection, registry)?);
        }
        if let Some(repeat) = &self.repeat {
            call = call.repeat(to_arg(repeat, registry)?);
        }
        Ok(call)
    }
}

fn validate_header(api_version: &str, kind: &str, expected: &str) -> ConfigResult<()> {
    if api_version != API_VERSION {
        return Err(ConfigError::InvalidApiVersion(api_version.to_string()));
    }
    if kind != expected {
        return Err(ConfigError::InvalidKind {
            expected: expected.to_string(),
            found: kind.to_string(),
        });
    }
    Ok(())
}

#[derive(Deserialize)]
struct Header {
    #[serde(default)]
    kind: Option<String>,
}

/// Returns the `kind` field of a YAML document without validating it.
pub fn document_kind(yaml: &str) -> ConfigResult<Option<String>> {
    let header: Header = serde_yaml::from_str(yaml)?;
    Ok(header.kind)
}

/// Find document files in a directory.
///
/// Each `.yaml` or `.yml` file in `dir` is a candidate, sorted by path.
pub fn find_documents(dir: impl AsRef<Path>) -> Vec<PathBuf> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Vec::new();
    }

    let mut documents = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "yaml" || e == "yml") {
                documents.push(path);
            }
        }
    }
    documents.sort();
    documents
}

/// Expands directories among `paths` into the documents they contain.
pub fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    paths
        .iter()
        .flat_map(|path| {
            if path.is_dir() {
                find_documents(path)
            } else {
                vec![path.clone()]
            }
        })
        .collect()
}

/// Load every template document among `paths` into `registry`.
///
/// Documents may refer to templates declared in later files: a document
/// whose references are not registered yet is retried after the others,
/// until a pass makes no progress. Files of another kind are skipped.
/// Returns the registered template names in registration order.
pub fn load_templates(paths: &[PathBuf], registry: &mut Registry) -> ConfigResult<Vec<String>> {
    let mut pending = Vec::new();
    for path in expand_paths(paths) {
        let content = std::fs::read_to_string(&path)?;
        match document_kind(&content)?.as_deref() {
            Some("Template") | None => pending.push(TemplateDocument::from_yaml(&content)?),
            Some(kind) => debug!(path = %path.display(), kind, "skipping non-template document"),
        }
    }

    let mut loaded = Vec::new();
    while !pending.is_empty() {
        let before = pending.len();
        let mut deferred = Vec::new();
        let mut last_error = None;
        for document in pending {
            match document.to_template(registry) {
                Ok(template) => {
                    loaded.push(template.name().to_string());
                    registry.register_template(template);
                }
                Err(ConfigError::UnknownComponent(name)) => {
                    last_error = Some(ConfigError::UnknownComponent(name));
                    deferred.push(document);
                }
                Err(error) => return Err(error),
            }
        }
        if deferred.len() == before {
            warn!(unresolved = before, "template documents left unresolved");
            if let Some(error) = last_error {
                return Err(error);
            }
        }
        pending = deferred;
    }
    Ok(loaded)
}
