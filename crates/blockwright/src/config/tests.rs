//! Tests for template and build documents.

use std::fs;

use super::*;
use crate::error::Error;
use crate::registry::Registry;
use crate::value::Value;

const UNIT: &str = r#"
apiVersion: blockwright/v1
kind: Template

metadata:
  name: Unit
  description: "Convolution followed by an optional activation"

defaults:
  in_channels: 3

components:
  conv:
    leaf: Conv2d
    args:
      out_channels: {var: {name: width, context: kwargs}}
  act:
    leaf: ReLU
"#;

const STAGE: &str = r#"
apiVersion: blockwright/v1
kind: Template

metadata:
  name: Stage

repeat_count: {var: {name: depth, context: kwargs, default: 3}}
repeat_tied: 2

components:
  body:
    template: Unit
"#;

const REQUEST: &str = r#"
apiVersion: blockwright/v1
kind: Build
template: Unit
kwargs:
  width: 16
"#;

#[test]
fn test_template_from_yaml() {
    let document = TemplateDocument::from_yaml(UNIT).unwrap();
    assert_eq!(document.name(), "Unit");
    assert_eq!(document.metadata.description.as_deref(), Some("Convolution followed by an optional activation"));
    assert_eq!(document.components.keys().collect::<Vec<_>>(), vec!["conv", "act"]);
    assert_eq!(document.references(), vec!["Conv2d", "ReLU"]);

    let registry = Registry::with_builtin_layers();
    let template = document.to_template(&registry).unwrap();
    let tables = template.tables();
    assert_eq!(
        tables.sub_arg("conv", "in_channels").unwrap().default,
        Some(Value::Int(3))
    );
    assert!(tables.sub_arg("conv", "out_channels").unwrap().is_var());
    assert_eq!(tables.translation("width").map(|t| t.owner()), Some("conv"));
}

#[test]
fn test_template_schema_validation() {
    let wrong_version = UNIT.replace("blockwright/v1", "blockwright/v0");
    assert!(matches!(
        TemplateDocument::from_yaml(&wrong_version),
        Err(ConfigError::InvalidApiVersion(v)) if v == "blockwright/v0"
    ));

    let wrong_kind = UNIT.replace("kind: Template", "kind: Build");
    assert!(matches!(
        TemplateDocument::from_yaml(&wrong_kind),
        Err(ConfigError::InvalidKind { .. })
    ));

    let unnamed = UNIT.replace("name: Unit", "name: \"\"");
    assert!(matches!(
        TemplateDocument::from_yaml(&unnamed),
        Err(ConfigError::MissingField(field)) if field == "metadata.name"
    ));

    let stray = format!("{UNIT}\nwidth_hint: 3\n");
    assert!(matches!(
        TemplateDocument::from_yaml(&stray),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_component_must_declare_one_kind() {
    let yaml = r#"
apiVersion: blockwright/v1
kind: Template
metadata:
  name: Broken
components:
  conv:
    leaf: Conv2d
    template: Unit
"#;
    let document = TemplateDocument::from_yaml(yaml).unwrap();
    let error = document.to_template(&Registry::with_builtin_layers()).unwrap_err();
    assert!(matches!(error, ConfigError::Invalid(_)));
}

#[test]
fn test_compact_and_exploded_connection_conflict() {
    let yaml = r#"
apiVersion: blockwright/v1
kind: Template
metadata:
  name: Conflicted
connection: residual
connection_reduction: mean
components:
  act:
    leaf: ReLU
"#;
    let document = TemplateDocument::from_yaml(yaml).unwrap();
    let error = document.to_template(&Registry::with_builtin_layers()).unwrap_err();
    assert!(matches!(error, ConfigError::Template(Error::InvalidSpec(_))));
}

#[test]
fn test_build_request() {
    let mut registry = Registry::with_builtin_layers();
    let template = TemplateDocument::from_yaml(UNIT)
        .unwrap()
        .to_template(&registry)
        .unwrap();
    registry.register_template(template);

    let request = BuildDocument::from_yaml(REQUEST).unwrap();
    let template = request.template(&registry).unwrap();
    let instance = template.build(&request.to_call(&registry).unwrap()).unwrap();

    assert_eq!(instance.block_names().collect::<Vec<_>>(), vec!["conv", "act"]);
    let conv = instance.child("conv").and_then(|c| c.arguments()).unwrap();
    assert_eq!(conv.get("out_channels"), Some(&Value::Int(16)));
    assert_eq!(conv.get("in_channels"), Some(&Value::Int(3)));
}

#[test]
fn test_build_request_builder() {
    let request = BuildDocument::new("Stage").with_kwarg("width", 8).with_repeat(4);
    let call = request.to_call(&Registry::new()).unwrap();
    assert_eq!(call.kwargs.get("width"), Some(&Value::Int(8)));
    assert!(call.repeat.is_some());

    assert!(matches!(
        request.template(&Registry::new()),
        Err(ConfigError::UnknownComponent(name)) if name == "Stage"
    ));
}

#[test]
fn test_load_templates_resolves_forward_references() {
    let dir = tempfile::tempdir().unwrap();
    // Stage sorts before Unit but depends on it.
    fs::write(dir.path().join("a_stage.yaml"), STAGE).unwrap();
    fs::write(dir.path().join("b_unit.yml"), UNIT).unwrap();
    fs::write(dir.path().join("request.yaml"), REQUEST).unwrap();
    fs::write(dir.path().join("notes.txt"), "not a document").unwrap();

    assert_eq!(find_documents(dir.path()).len(), 3);

    let mut registry = Registry::with_builtin_layers();
    let loaded = load_templates(&[dir.path().to_path_buf()], &mut registry).unwrap();
    assert_eq!(loaded, vec!["Unit", "Stage"]);

    let stage = registry.template("Stage").unwrap();
    let instance = stage
        .build(&crate::block::Call::new().kwarg("width", 4))
        .unwrap();
    assert_eq!(
        instance.block_names().collect::<Vec<_>>(),
        vec!["block-0-[2]", "block-1-[1]"]
    );
    assert_eq!(instance.repeats("block-0-[2]"), Some(2));
}

#[test]
fn test_load_templates_reports_unresolved_reference() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("stage.yaml"), STAGE).unwrap();

    let mut registry = Registry::with_builtin_layers();
    let error = load_templates(&[dir.path().to_path_buf()], &mut registry).unwrap_err();
    assert!(matches!(error, ConfigError::UnknownComponent(name) if name == "Unit"));
}

#[test]
fn test_find_documents_missing_dir() {
    assert!(find_documents("/nonexistent/blockwright").is_empty());
}
