//! Rendering generated configs end to end through the runtime

use std::sync::Arc;

use morpheo_core::testing::RenderHarness;
use morpheo_core::{AppConfig, ComponentRegistry, ComponentRuntime};
use serde_json::{json, Value};

fn runtime() -> ComponentRuntime {
    let mut registry = ComponentRegistry::new();
    morpheo_components::register_all(&mut registry).unwrap();
    ComponentRuntime::new(Arc::new(registry))
}

#[test]
fn test_signup_form_renders_and_reacts() {
    let config = AppConfig::from_value(&json!({
        "app": {"name": "Clicker"},
        "components": [
            {"id": "title", "type": "H1", "props": {"text": "Click counter"}},
            {"id": "plus", "type": "Button", "properties": {"label": "Add"}},
            {"id": "clicks", "type": "counter", "props": {"label": "Clicks", "max": 2}},
            {"id": "status", "type": "label", "props": {"text": "waiting"}}
        ]
    }));
    let root = config.root();

    let mut runtime = runtime();
    runtime.mount(&root);
    runtime.connect("plus", "click", "clicks", "increment", None).unwrap();
    runtime.connect("clicks", "value", "status", "text", None).unwrap();

    for _ in 0..3 {
        runtime.trigger("plus", "click", Value::Null).unwrap();
    }

    let mut harness = RenderHarness::new(30, 8);
    let output = harness.render_to_string_plain(|frame| {
        runtime.render(&root, frame, frame.area(), Some("plus"));
    });
    let lines: Vec<_> = output.lines().collect();
    assert!(lines[0].contains("Clicker"));
    assert!(lines[1].contains("Click counter"));
    assert!(lines[2].contains("[ Add ]"));
    assert!(lines[3].contains("Clicks: 2"));
    assert!(lines[4].contains('2'));
}

#[test]
fn test_unknown_types_render_placeholder() {
    let config = AppConfig::from_value(&json!({
        "components": [{"id": "chart", "type": "sparkline"}]
    }));
    let root = config.root();
    let mut runtime = runtime();
    assert!(runtime.mount(&root).is_empty());

    let mut harness = RenderHarness::new(40, 1);
    let output = harness.render_to_string_plain(|frame| {
        runtime.render(&root, frame, frame.area(), None);
    });
    assert_eq!(output, "[unknown component: sparkline]");
}

#[test]
fn test_method_handlers_update_other_components() {
    let config = AppConfig::from_value(&json!({
        "components": [{
            "id": "form",
            "type": "section",
            "children": [
                {"id": "name", "type": "input", "props": {"label": "Name"}},
                {
                    "id": "greet",
                    "type": "button",
                    "props": {"label": "Greet"},
                    "events": {"click": "onGreet"},
                    "methods": {"onGreet": {"actions": [
                        {"type": "getValue", "target": "name", "into": "name"},
                        {"type": "if",
                         "condition": {"op": "truthy", "value": {"var": "name"}},
                         "then": [{"type": "setProperty", "target": "hello", "property": "text", "value": {"var": "name"}}],
                         "else": [{"type": "setProperty", "target": "hello", "property": "text", "value": "Who are you?"}]}
                    ]}}
                },
                {"id": "hello", "type": "text", "props": {"text": ""}}
            ]
        }]
    }));
    let root = config.root();
    let mut runtime = runtime();
    runtime.mount(&root);

    runtime.trigger("greet", "click", Value::Null).unwrap();
    assert_eq!(
        runtime.instance("hello").unwrap().properties["text"],
        json!("Who are you?")
    );

    runtime
        .send_event("name", "change", "value", json!("Ada"))
        .unwrap();
    runtime.trigger("greet", "click", Value::Null).unwrap();
    assert_eq!(
        runtime.instance("hello").unwrap().properties["text"],
        json!("Ada")
    );
}
