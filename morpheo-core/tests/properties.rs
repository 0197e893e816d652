//! End-to-end checks of the component model: normalization, registry,
//! connections and behaviors working together

use std::collections::HashSet;
use std::sync::Arc;

use morpheo_core::behavior::BehaviorRegistry;
use morpheo_core::prelude::*;
use morpheo_core::{
    normalize, resolve_type, ComponentDefinition, ConnectionError, RegistryError, Transform,
};
use serde_json::{json, Value};

fn noop(_: &RenderView<'_>, _: &mut Frame, _: Rect) {}

fn registry() -> Arc<ComponentRegistry> {
    let mut registry = ComponentRegistry::new();
    registry
        .register(ComponentDefinition::new(
            ComponentMeta::new("container", "Container"),
            noop,
        ))
        .unwrap();
    registry
        .register(ComponentDefinition::new(
            ComponentMeta::new("button", "Button").with_capability(
                ComponentCapability::new("press", "Press")
                    .with_point(ConnectionPoint::output("click", DataType::Event)),
            ),
            noop,
        ))
        .unwrap();
    registry
        .register(ComponentDefinition::new(
            ComponentMeta::new("text-input", "Text input").with_capability(
                ComponentCapability::new("value", "Value")
                    .with_point(ConnectionPoint::bidirectional("value", DataType::Text)),
            ),
            noop,
        ))
        .unwrap();
    registry
        .register(ComponentDefinition::new(
            ComponentMeta::new("text", "Text").with_capability(
                ComponentCapability::new("content", "Content")
                    .with_point(ConnectionPoint::input("text", DataType::Text))
                    .with_point(ConnectionPoint::output("shown", DataType::Text)),
            ),
            noop,
        ))
        .unwrap();
    registry
        .register(ComponentDefinition::new(
            ComponentMeta::new("counter", "Counter").with_behavior("counter"),
            noop,
        ))
        .unwrap();
    Arc::new(registry)
}

#[test]
fn test_missing_ids_are_unique_and_normalize_is_idempotent() {
    let mut seen = HashSet::new();
    for _ in 0..50 {
        let component = normalize(&json!({"type": "button"}));
        assert!(!component.id.is_empty());
        assert!(seen.insert(component.id.clone()));

        let again = normalize(&component.to_value());
        assert_eq!(again.id, component.id);
        assert_eq!(again.kind, component.kind);
        assert_eq!(again, component);
    }

    let fallback = normalize(&Value::Null);
    assert_eq!(fallback.kind, "container");
    assert!(!fallback.id.is_empty());
}

#[test]
fn test_type_aliases_case_insensitive() {
    for alias in ["input", "textinput", "input-text", "TextInput", "INPUT"] {
        assert_eq!(resolve_type(alias), "text-input", "alias {alias}");
    }
    assert_eq!(resolve_type("Paragraph"), "p");
    assert_eq!(resolve_type("sparkline"), "sparkline");
}

#[test]
fn test_properties_win_over_props() {
    let component = normalize(&json!({
        "type": "Button",
        "properties": {"text": "Hi"},
        "props": {"text": "Bye"}
    }));
    assert_eq!(component.kind, "button");
    assert_eq!(component.props["text"], json!("Hi"));
}

#[test]
fn test_duplicate_registration_signals() {
    let mut registry = ComponentRegistry::new();
    let definition = || ComponentDefinition::new(ComponentMeta::new("button", "Button"), noop);
    registry.register(definition()).unwrap();
    assert_eq!(
        registry.register(definition()),
        Err(RegistryError::AlreadyRegistered("button".into()))
    );
    assert_eq!(
        registry.create_instance("chart", &Default::default()).unwrap_err(),
        RegistryError::UnknownType("chart".into())
    );
}

#[test]
fn test_output_to_output_fails_output_to_input_propagates() {
    let tree = normalize(&json!({
        "id": "form",
        "type": "div",
        "children": [
            {"id": "name", "type": "input"},
            {"id": "greeting", "type": "text"}
        ]
    }));
    let mut runtime = ComponentRuntime::new(registry());
    runtime.mount(&tree);

    assert!(matches!(
        runtime.connect("greeting", "shown", "name", "value", None),
        Ok(_)
    ));
    assert!(matches!(
        runtime.connect("name", "value", "greeting", "shown", None),
        Err(ConnectionError::InvalidConnectionDirection { .. })
    ));

    let hello = Transform::new(|v| json!(format!("Hello, {}!", v.as_str().unwrap_or("?"))));
    runtime
        .connect("name", "value", "greeting", "text", Some(hello))
        .unwrap();
    runtime
        .send_event("name", "change", "value", json!("Ada"))
        .unwrap();
    assert_eq!(
        runtime.connection_value("greeting", "text"),
        Some(json!("Hello, Ada!"))
    );
}

#[test]
fn test_counter_clamps_and_resets_to_initial() {
    let tree = normalize(&json!({
        "id": "root",
        "type": "container",
        "children": [
            {"id": "inc", "type": "button"},
            {"id": "reset", "type": "button"},
            {"id": "count", "type": "counter", "props": {"count": 0, "step": 1, "max": 3}}
        ]
    }));
    let mut runtime = ComponentRuntime::with_behaviors(registry(), BehaviorRegistry::with_defaults());
    runtime.mount(&tree);
    runtime.connect("inc", "click", "count", "increment", None).unwrap();
    runtime.connect("reset", "click", "count", "reset", None).unwrap();

    for _ in 0..3 {
        runtime.trigger("inc", "click", Value::Null).unwrap();
    }
    assert_eq!(runtime.connection_value("count", "value"), Some(json!(3)));

    runtime.trigger("inc", "click", Value::Null).unwrap();
    assert_eq!(runtime.connection_value("count", "value"), Some(json!(3)));

    runtime.trigger("reset", "click", Value::Null).unwrap();
    assert_eq!(runtime.connection_value("count", "value"), Some(json!(0)));
}

#[test]
fn test_unmount_leaves_no_dangling_edges() {
    let tree = normalize(&json!({
        "id": "root",
        "type": "container",
        "children": [
            {"id": "inc", "type": "button"},
            {"id": "panel", "type": "container", "children": [
                {"id": "count", "type": "counter"}
            ]}
        ]
    }));
    let mut runtime = ComponentRuntime::new(registry());
    runtime.mount(&tree);
    runtime.connect("inc", "click", "count", "increment", None).unwrap();

    assert_eq!(runtime.unmount("panel"), 2);
    assert!(runtime.connections().is_empty());
    assert!(runtime.connections_of("inc").is_empty());
    assert!(runtime.instance("inc").unwrap().connections.is_empty());
    assert_eq!(
        runtime.send_event("count", "value", "value", json!(1)),
        Err(ConnectionError::UnknownComponent("count".into()))
    );
}

#[test]
fn test_empty_config_yields_no_content_panel() {
    let config = AppConfig::from_json("{}").unwrap();
    let root = config.root();
    assert_eq!(root.kind, "empty-state");
    assert_eq!(root.prop_str("title"), Some("No content"));
}
