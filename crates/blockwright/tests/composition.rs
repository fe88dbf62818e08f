// Template composition: derived tables, overrides and signatures

use std::sync::Arc;

use blockwright::{ComponentSpec, Error, Lookup, Registry, Template, Value, ValueMap, Var};

fn layer(name: &str) -> Arc<dyn blockwright::LeafFactory> {
    Registry::with_builtin_layers().leaf(name).unwrap().clone()
}

fn two_convs() -> blockwright::TemplateBuilder {
    Template::builder("Pair")
        .component("conv1", layer("Conv2d"))
        .component("conv2", layer("Conv2d"))
        .component("act", layer("ReLU"))
}

#[test]
fn test_translation_keeps_only_unique_names() {
    let template = two_convs().build().unwrap();
    let tables = template.tables();

    assert!(tables.translation("in_channels").is_none());
    assert!(tables.translation("kernel_size").is_none());
    assert_eq!(tables.translation("inplace").map(|t| t.owner()), Some("act"));
    assert_eq!(tables.claimants("in_channels"), vec!["conv1", "conv2"]);
    assert_eq!(tables.global("in_channels").len(), 2);
}

#[test]
fn test_ambiguous_override_is_rejected() {
    let error = two_convs().arg("in_channels", 3).build().unwrap_err();
    match error {
        Error::AmbiguousOverride { name, claimants } => {
            assert_eq!(name, "in_channels");
            assert_eq!(claimants, vec!["conv1", "conv2"]);
        }
        other => panic!("expected AmbiguousOverride, got {other:?}"),
    }
}

#[test]
fn test_override_of_unknown_name_is_rejected() {
    let error = two_convs().arg("dilation", 2).build().unwrap_err();
    assert_eq!(
        error,
        Error::UnknownArgument {
            component: "Pair".into(),
            argument: "dilation".into(),
        }
    );
}

#[test]
fn test_block_default_updates_every_view() {
    let template = Template::builder("Stem")
        .component("conv", layer("Conv2d"))
        .default("kernel_size", 7)
        .build()
        .unwrap();
    let tables = template.tables();

    let private = tables.sub_arg("conv", "kernel_size").unwrap();
    let global = tables.global("kernel_size");
    assert_eq!(private.default, Some(Value::Int(7)));
    assert_eq!(global.len(), 1);
    assert_eq!(global[0].default, Some(Value::Int(7)));
}

#[test]
fn test_with_defaults_recomputes_tables() {
    let template = Template::builder("Stem")
        .component("conv", layer("Conv2d"))
        .build()
        .unwrap();
    let strided = template
        .with_defaults(ValueMap::from([("stride".to_string(), Value::Int(2))]))
        .unwrap();

    assert_eq!(strided.tables().sub_arg("conv", "stride").unwrap().default, Some(Value::Int(2)));
    assert_eq!(template.tables().sub_arg("conv", "stride").unwrap().default, Some(Value::Int(1)));
}

#[test]
fn test_per_component_args_and_defaults() {
    let template = Template::builder("Stem")
        .component(
            "conv",
            ComponentSpec::new(layer("Conv2d"))
                .arg("stride", 2)
                .arg("out_channels", Var::kw("width"))
                .default("padding", 1),
        )
        .build()
        .unwrap();
    let tables = template.tables();

    assert_eq!(tables.sub_arg("conv", "stride").unwrap().default, Some(Value::Int(2)));
    assert_eq!(tables.sub_arg("conv", "padding").unwrap().default, Some(Value::Int(1)));
    let width = tables.sub_arg("conv", "out_channels").unwrap();
    assert!(width.is_var());
    assert_eq!(width.lookup, vec!["width"]);
    assert!(tables.is_broadcast("width"));
}

#[test]
fn test_per_component_unknown_arg() {
    let error = Template::builder("Stem")
        .component("conv", ComponentSpec::new(layer("Conv2d")).arg("dilation", 2))
        .build()
        .unwrap_err();
    assert!(matches!(error, Error::UnknownArgument { component, .. } if component == "conv"));

    // A variadic-keyword slot accepts anything.
    let template = Template::builder("Open")
        .component("id", ComponentSpec::new(layer("Identity")).arg("tag", "skip"))
        .build()
        .unwrap();
    assert_eq!(template.tables().sub_arg("id", "tag").unwrap().default, Some(Value::from("skip")));
}

#[test]
fn test_variable_subcomponent_takes_no_overrides() {
    let error = Template::builder("Swap")
        .component("body", ComponentSpec::new(Var::kw("body")).arg("width", 3))
        .build()
        .unwrap_err();
    assert!(matches!(error, Error::InvalidSpec(_)));
}

#[test]
fn test_compact_and_exploded_fields_conflict() {
    let error = two_convs()
        .connection("residual")
        .connection_reduction("mean")
        .build()
        .unwrap_err();
    assert!(matches!(error, Error::InvalidSpec(message) if message.contains("connection")));

    let error = two_convs().repeat(3).repeat_tied(true).build().unwrap_err();
    assert!(matches!(error, Error::InvalidSpec(message) if message.contains("repeat")));
}

#[test]
fn test_variable_default_is_rejected() {
    let error = two_convs().default("inplace", Var::kw("inplace")).build().unwrap_err();
    assert!(matches!(error, Error::InvalidSpec(_)));
}

#[test]
fn test_nested_template_descriptors() {
    let inner = Template::builder("Inner")
        .component("conv", layer("Conv2d"))
        .arg("out_channels", Var::kw("width"))
        .build()
        .unwrap();
    let outer = Template::builder("Outer")
        .component("body", inner)
        .component("head", layer("Linear"))
        .build()
        .unwrap();
    let tables = outer.tables();

    let in_channels = tables.sub_arg("body", "in_channels").unwrap();
    assert_eq!(in_channels.owner_path(), "body.conv");
    assert!(tables.sub_arg("body", "width").unwrap().is_var());
    assert_eq!(tables.translation("width").map(|t| t.owner()), Some("body"));
    assert_eq!(tables.translation("in_features").map(|t| t.owner()), Some("head"));
    assert!(tables.is_broadcast("width"));
}

#[test]
fn test_signature_lists_required_first() {
    let template = Template::builder("Head")
        .component("lin", layer("Linear"))
        .arg("in_features", Var::kw("fan_in").active(Lookup::Exists))
        .arg(
            "out_features",
            Var::priority(["width", "channels"]).context("kwargs"),
        )
        .build()
        .unwrap();

    assert_eq!(
        template.to_string(),
        "Head(fan_in*, [width], [channels], bias=true)"
    );
}

#[test]
fn test_signature_quotes_string_defaults() {
    let template = Template::builder("Act")
        .component("id", ComponentSpec::new(layer("Identity")).arg("mode", "fast"))
        .build()
        .unwrap();
    assert_eq!(template.to_string(), "Act(mode=\"fast\")");
}
