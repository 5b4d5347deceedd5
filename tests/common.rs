//! Common test utilities for building model definitions.
use katachi::prelude::*;
use katachi::model::{ArgumentDefinition, FieldDefinition, ParameterDirection, PinDefinition, ValueRef};

/// The slew use case: a data record, two states and a shared `Decrement T2D` activity.
#[allow(dead_code)]
pub const SLEW_MODEL_JSON: &str = include_str!("../demos/slew_use_case.json");

#[allow(dead_code)]
pub fn load_model(json: &str) -> Model {
    let definition = ExportedModel::from_json(json)
        .expect("Failed to parse exported model")
        .into_definition()
        .expect("Failed to convert exported model");
    Model::build(definition).expect("Failed to build model")
}

#[allow(dead_code)]
pub fn slew_model() -> Model {
    load_model(SLEW_MODEL_JSON)
}

#[allow(dead_code)]
pub fn node(id: &str, kind: NodeKindDefinition) -> NodeDefinition {
    NodeDefinition {
        id: id.to_string(),
        name: None,
        kind,
    }
}

#[allow(dead_code)]
pub fn literal(id: &str, value: f64) -> NodeDefinition {
    node(
        id,
        NodeKindDefinition::ValueSpecification {
            literal: Value::Number(value),
        },
    )
}

#[allow(dead_code)]
pub fn opaque(id: &str, body: &str, inputs: &[(&str, &str)], outputs: &[&str]) -> NodeDefinition {
    node(
        id,
        NodeKindDefinition::OpaqueAction {
            body: body.to_string(),
            language: None,
            inputs: inputs
                .iter()
                .map(|(name, from)| PinDefinition {
                    name: name.to_string(),
                    scalar: ScalarType::Float,
                    source: Some(value_ref(from)),
                })
                .collect(),
            outputs: outputs
                .iter()
                .map(|name| PinDefinition {
                    name: name.to_string(),
                    scalar: ScalarType::Float,
                    source: None,
                })
                .collect(),
        },
    )
}

#[allow(dead_code)]
pub fn call(id: &str, target: &str, arguments: &[(&str, &str)]) -> NodeDefinition {
    node(
        id,
        NodeKindDefinition::CallBehavior {
            target: target.to_string(),
            arguments: arguments
                .iter()
                .map(|(parameter, from)| ArgumentDefinition {
                    parameter: parameter.to_string(),
                    source: value_ref(from),
                })
                .collect(),
        },
    )
}

#[allow(dead_code)]
pub fn output(id: &str, parameter: &str, type_name: &str, from: &str) -> NodeDefinition {
    node(
        id,
        NodeKindDefinition::Parameter {
            direction: ParameterDirection::Out,
            name: parameter.to_string(),
            type_name: type_name.to_string(),
            source: Some(value_ref(from)),
        },
    )
}

#[allow(dead_code)]
pub fn value_ref(raw: &str) -> ValueRef {
    match raw.split_once('.') {
        Some((node, pin)) => ValueRef::pin(node, pin),
        None => ValueRef::node(raw),
    }
}

#[allow(dead_code)]
pub fn activity(name: &str, nodes: Vec<NodeDefinition>) -> ActivityDefinition {
    ActivityDefinition {
        name: name.to_string(),
        nodes,
        edges: vec![],
    }
}

#[allow(dead_code)]
pub fn state(name: &str, activities: &[&str]) -> StateDefinition {
    StateDefinition {
        name: name.to_string(),
        activities: activities.iter().map(|a| a.to_string()).collect(),
    }
}

#[allow(dead_code)]
pub fn transition(
    source: &str,
    target: &str,
    guard: Option<&str>,
    trigger: Option<&str>,
) -> TransitionDefinition {
    TransitionDefinition {
        source: source.to_string(),
        target: target.to_string(),
        guard: guard.map(str::to_string),
        trigger: trigger.map(str::to_string),
    }
}

#[allow(dead_code)]
pub fn component(
    name: &str,
    states: Vec<StateDefinition>,
    transitions: Vec<TransitionDefinition>,
    activities: Vec<ActivityDefinition>,
) -> ComponentDefinition {
    let initial = states
        .first()
        .map(|s| s.name.clone())
        .unwrap_or_default();
    ComponentDefinition {
        name: name.to_string(),
        state_machine: StateMachineDefinition {
            name: "Main".to_string(),
            states,
            initial,
            transitions,
        },
        activities,
        attributes: vec![],
    }
}

#[allow(dead_code)]
pub fn bool_attribute(name: &str) -> FieldDefinition {
    FieldDefinition {
        name: name.to_string(),
        scalar: ScalarType::Bool,
    }
}

/// A two-state switch.
///
/// `OFF -> ON` on the `turn on` signal, `ON -> OFF` on every tick unless `enabled`.
#[allow(dead_code)]
pub fn create_toggle_definition() -> ModelDefinition {
    let mut toggle = component(
        "Toggle Switch",
        vec![state("OFF", &[]), state("ON", &[])],
        vec![
            transition("OFF", "ON", None, Some("turn on")),
            transition("ON", "OFF", Some("!enabled"), None),
        ],
        vec![],
    );
    toggle.attributes.push(bool_attribute("enabled"));
    ModelDefinition {
        components: vec![toggle],
        record_types: vec![],
    }
}

#[allow(dead_code)]
pub fn toggle_model() -> Model {
    Model::build(create_toggle_definition()).expect("Failed to build toggle model")
}

/// A component whose state activity calls an activity written in an unsupported
/// transformation language.
#[allow(dead_code)]
pub fn create_unsupported_component(name: &str) -> ComponentDefinition {
    let mut calc = activity(
        "Calc",
        vec![
            literal("seed", 1.0),
            opaque("script", "y = x * 2", &[("x", "seed")], &["y"]),
        ],
    );
    if let NodeKindDefinition::OpaqueAction { language, .. } = &mut calc.nodes[1].kind {
        *language = Some("python".to_string());
    }
    component(
        name,
        vec![state("RUN", &["Main"])],
        vec![],
        vec![activity("Main", vec![call("invoke", "Calc", &[])]), calc],
    )
}

/// A one-state component that runs a single activity every tick.
#[allow(dead_code)]
pub fn create_single_activity_component(name: &str, body: ActivityDefinition) -> ComponentDefinition {
    let activity_name = body.name.clone();
    component(name, vec![state("RUN", &[&activity_name])], vec![], vec![body])
}

#[allow(dead_code)]
pub fn model_of(components: Vec<ComponentDefinition>) -> Model {
    Model::build(ModelDefinition {
        components,
        record_types: vec![],
    })
    .expect("Failed to build model")
}
