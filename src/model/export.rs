//! A JSON export format for resolved models.
//!
//! External tooling (an XMI reader, a modelling tool plug-in) writes this format; the CLI
//! and the tests read it. Value references are written as `"node"` or `"node.pin"`.

use super::conversion::IntoDefinition;
use super::definition::*;
use crate::ast::{ScalarType, Value};
use crate::error::ConversionError;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedModel {
    #[serde(default)]
    pub record_types: Vec<ExportedRecordType>,
    pub components: Vec<ExportedComponent>,
}

#[derive(Debug, Deserialize)]
pub struct ExportedRecordType {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<ExportedField>,
}

#[derive(Debug, Deserialize)]
pub struct ExportedField {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedComponent {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<ExportedField>,
    pub state_machine: ExportedStateMachine,
    #[serde(default)]
    pub activities: Vec<ExportedActivity>,
}

#[derive(Debug, Deserialize)]
pub struct ExportedStateMachine {
    pub name: String,
    pub initial: String,
    #[serde(default)]
    pub states: Vec<ExportedState>,
    #[serde(default)]
    pub transitions: Vec<ExportedTransition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedState {
    pub name: String,
    #[serde(default, alias = "activities")]
    pub do_activities: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportedTransition {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub guard: Option<String>,
    #[serde(default)]
    pub trigger: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportedActivity {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<ExportedNode>,
    #[serde(default)]
    pub edges: Vec<ExportedEdge>,
}

#[derive(Debug, Deserialize)]
pub struct ExportedEdge {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Deserialize)]
pub struct ExportedNode {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub kind: ExportedNodeKind,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ExportedNodeKind {
    #[serde(rename = "uml:OpaqueAction")]
    OpaqueAction {
        body: String,
        #[serde(default)]
        language: Option<String>,
        #[serde(default)]
        inputs: Vec<ExportedPin>,
        #[serde(default)]
        outputs: Vec<ExportedPin>,
    },
    #[serde(rename = "uml:CallBehaviorAction")]
    CallBehavior {
        behavior: String,
        #[serde(default)]
        arguments: Vec<ExportedArgument>,
    },
    #[serde(rename = "uml:ReadStructuralFeatureAction")]
    ReadStructuralFeature { object: String, feature: String },
    #[serde(rename = "uml:AddStructuralFeatureValueAction")]
    AddStructuralFeatureValue {
        object: String,
        feature: String,
        value: String,
    },
    #[serde(rename = "uml:ForkNode")]
    Fork {
        #[serde(default)]
        branches: Vec<String>,
    },
    #[serde(rename = "uml:JoinNode")]
    Join {
        #[serde(default)]
        inputs: Vec<String>,
    },
    #[serde(rename = "uml:CreateObjectAction")]
    CreateObject { classifier: String },
    #[serde(rename = "uml:ActivityParameterNode")]
    Parameter {
        direction: ParameterDirection,
        parameter: String,
        #[serde(rename = "parameterType")]
        type_name: String,
        #[serde(default)]
        from: Option<String>,
    },
    #[serde(rename = "uml:ValueSpecificationAction")]
    ValueSpecification { value: serde_json::Value },
}

#[derive(Debug, Deserialize)]
pub struct ExportedPin {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub from: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportedArgument {
    pub parameter: String,
    pub from: String,
}

impl ExportedModel {
    pub fn from_json(json: &str) -> Result<Self, ConversionError> {
        serde_json::from_str(json).map_err(|e| ConversionError::ValidationError(e.to_string()))
    }
}

impl IntoDefinition for ExportedModel {
    fn into_definition(self) -> Result<ModelDefinition, ConversionError> {
        let record_types = self
            .record_types
            .into_iter()
            .map(|r| {
                Ok(RecordTypeDefinition {
                    fields: convert_fields(r.fields)?,
                    name: r.name,
                })
            })
            .collect::<Result<Vec<_>, ConversionError>>()?;

        let components = self
            .components
            .into_iter()
            .map(convert_component)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ModelDefinition {
            components,
            record_types,
        })
    }
}

fn convert_component(raw: ExportedComponent) -> Result<ComponentDefinition, ConversionError> {
    let machine = raw.state_machine;
    let state_machine = StateMachineDefinition {
        name: machine.name,
        initial: machine.initial,
        states: machine
            .states
            .into_iter()
            .map(|s| StateDefinition {
                name: s.name,
                activities: s.do_activities,
            })
            .collect(),
        transitions: machine
            .transitions
            .into_iter()
            .map(|t| TransitionDefinition {
                source: t.source,
                target: t.target,
                guard: t.guard,
                trigger: t.trigger,
            })
            .collect(),
    };

    let activities = raw
        .activities
        .into_iter()
        .map(|a| {
            let nodes = a
                .nodes
                .into_iter()
                .map(convert_node)
                .collect::<Result<Vec<_>, _>>()?;
            let edges = a
                .edges
                .into_iter()
                .map(|e| EdgeDefinition {
                    source: e.source,
                    target: e.target,
                })
                .collect();
            Ok(ActivityDefinition {
                name: a.name,
                nodes,
                edges,
            })
        })
        .collect::<Result<Vec<_>, ConversionError>>()?;

    Ok(ComponentDefinition {
        name: raw.name,
        attributes: convert_fields(raw.attributes)?,
        state_machine,
        activities,
    })
}

fn convert_node(raw: ExportedNode) -> Result<NodeDefinition, ConversionError> {
    let kind = match raw.kind {
        ExportedNodeKind::OpaqueAction {
            body,
            language,
            inputs,
            outputs,
        } => NodeKindDefinition::OpaqueAction {
            body,
            language,
            inputs: convert_pins(&raw.id, inputs)?,
            outputs: convert_pins(&raw.id, outputs)?,
        },
        ExportedNodeKind::CallBehavior {
            behavior,
            arguments,
        } => NodeKindDefinition::CallBehavior {
            target: behavior,
            arguments: arguments
                .into_iter()
                .map(|a| ArgumentDefinition {
                    parameter: a.parameter,
                    source: parse_value_ref(&a.from),
                })
                .collect(),
        },
        ExportedNodeKind::ReadStructuralFeature { object, feature } => {
            NodeKindDefinition::ReadStructuralFeature {
                object: parse_value_ref(&object),
                attribute: feature,
            }
        }
        ExportedNodeKind::AddStructuralFeatureValue {
            object,
            feature,
            value,
        } => NodeKindDefinition::AddStructuralFeatureValue {
            object: parse_value_ref(&object),
            attribute: feature,
            value: parse_value_ref(&value),
        },
        ExportedNodeKind::Fork { branches } => NodeKindDefinition::Fork { branches },
        ExportedNodeKind::Join { inputs } => NodeKindDefinition::Join { inputs },
        ExportedNodeKind::CreateObject { classifier } => NodeKindDefinition::CreateObject {
            record_type: classifier,
        },
        ExportedNodeKind::Parameter {
            direction,
            parameter,
            type_name,
            from,
        } => NodeKindDefinition::Parameter {
            direction,
            name: parameter,
            type_name,
            source: from.as_deref().map(parse_value_ref),
        },
        ExportedNodeKind::ValueSpecification { value } => NodeKindDefinition::ValueSpecification {
            literal: convert_literal(&raw.id, &value)?,
        },
    };

    Ok(NodeDefinition {
        id: raw.id,
        name: raw.name,
        kind,
    })
}

fn convert_fields(fields: Vec<ExportedField>) -> Result<Vec<FieldDefinition>, ConversionError> {
    fields
        .into_iter()
        .map(|f| {
            Ok(FieldDefinition {
                scalar: convert_scalar(&f.name, &f.type_name)?,
                name: f.name,
            })
        })
        .collect()
}

fn convert_pins(
    node: &str,
    pins: Vec<ExportedPin>,
) -> Result<Vec<PinDefinition>, ConversionError> {
    pins.into_iter()
        .map(|p| {
            Ok(PinDefinition {
                scalar: convert_scalar(&format!("{}.{}", node, p.name), &p.type_name)?,
                source: p.from.as_deref().map(parse_value_ref),
                name: p.name,
            })
        })
        .collect()
}

fn convert_scalar(element: &str, type_name: &str) -> Result<ScalarType, ConversionError> {
    ScalarType::from_uml_name(type_name).ok_or_else(|| ConversionError::UnsupportedElement {
        element: element.to_string(),
        type_name: type_name.to_string(),
    })
}

fn convert_literal(node: &str, value: &serde_json::Value) -> Result<Value, ConversionError> {
    if let Some(n) = value.as_f64() {
        Ok(Value::Number(n))
    } else if let Some(b) = value.as_bool() {
        Ok(Value::Bool(b))
    } else {
        Err(ConversionError::ValidationError(format!(
            "value specification '{}' holds a non-scalar literal: {}",
            node, value
        )))
    }
}

fn parse_value_ref(raw: &str) -> ValueRef {
    match raw.split_once('.') {
        Some((node, pin)) => ValueRef::pin(node, pin),
        None => ValueRef::node(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_tags_and_value_refs() {
        let json = r#"{
            "components": [{
                "name": "Demo",
                "stateMachine": { "name": "Main", "initial": "IDLE", "states": [{ "name": "IDLE" }] },
                "activities": [{
                    "name": "Step",
                    "nodes": [
                        { "id": "lit", "type": "uml:ValueSpecificationAction", "value": 2 },
                        { "id": "op", "type": "uml:OpaqueAction", "body": "y = x * 2;",
                          "inputs": [{ "name": "x", "type": "Real", "from": "lit" }],
                          "outputs": [{ "name": "y", "type": "Real" }] },
                        { "id": "out", "type": "uml:ActivityParameterNode", "direction": "out",
                          "parameter": "result", "parameterType": "Real", "from": "op.y" }
                    ]
                }]
            }]
        }"#;

        let definition = ExportedModel::from_json(json)
            .unwrap()
            .into_definition()
            .unwrap();
        let nodes = &definition.components[0].activities[0].nodes;
        assert!(matches!(
            nodes[0].kind,
            NodeKindDefinition::ValueSpecification { literal: Value::Number(n) } if n == 2.0
        ));
        match &nodes[2].kind {
            NodeKindDefinition::Parameter { source, .. } => {
                assert_eq!(source.as_ref(), Some(&ValueRef::pin("op", "y")));
            }
            other => panic!("unexpected node kind {:?}", other),
        }
    }

    #[test]
    fn test_unknown_primitive_is_rejected() {
        let json = r#"{
            "recordTypes": [{ "name": "R", "fields": [{ "name": "s", "type": "String" }] }],
            "components": []
        }"#;
        let err = ExportedModel::from_json(json)
            .unwrap()
            .into_definition()
            .unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedElement { .. }));
    }
}
