use super::definition::*;
use super::ir::*;
use crate::ast::{ScalarType, parse_expression};
use crate::error::ModelError;
use crate::sanitize::{IdentifierKind, Sanitizer};
use ahash::{AHashMap, AHashSet};
use std::collections::BTreeSet;
use tracing::debug;

/// Attribute names whose `m_` members the dispatcher already declares.
const FIXED_MEMBERS: [&str; 2] = ["currentState", "stateMachineActive"];

impl Model {
    /// Validates and resolves a definition into an immutable model.
    ///
    /// Either every reference resolves and every name sanitizes, or the first problem is
    /// returned and nothing is built.
    pub fn build(definition: ModelDefinition) -> Result<Model, ModelError> {
        ModelBuilder::new().build(definition)
    }

    pub fn component(&self, raw_name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name.raw == raw_name)
    }
}

struct ModelBuilder {
    sanitizer: Sanitizer,
}

impl ModelBuilder {
    fn new() -> Self {
        Self {
            sanitizer: Sanitizer::new(),
        }
    }

    fn build(mut self, definition: ModelDefinition) -> Result<Model, ModelError> {
        check_unique("model", "record type", definition.record_types.iter().map(|r| &r.name))?;
        check_unique("model", "component", definition.components.iter().map(|c| &c.name))?;

        let mut record_types = Vec::with_capacity(definition.record_types.len());
        for record in &definition.record_types {
            let ident = self
                .sanitizer
                .sanitize("", &record.name, IdentifierKind::Record)?;
            let fields = self.build_fields(&format!("record {}", record.name), &record.fields)?;
            record_types.push(RecordType {
                name: Name {
                    raw: record.name.clone(),
                    ident,
                },
                fields,
            });
        }

        let mut components = Vec::with_capacity(definition.components.len());
        for component in &definition.components {
            components.push(self.build_component(component, &record_types)?);
        }

        debug!(
            components = components.len(),
            record_types = record_types.len(),
            "model built"
        );
        Ok(Model {
            components,
            record_types,
        })
    }

    fn build_fields(
        &mut self,
        scope: &str,
        fields: &[FieldDefinition],
    ) -> Result<Vec<Field>, ModelError> {
        check_unique(scope, "attribute", fields.iter().map(|f| &f.name))?;
        fields
            .iter()
            .map(|f| {
                Ok(Field {
                    name: Name {
                        raw: f.name.clone(),
                        ident: self.sanitizer.sanitize(scope, &f.name, IdentifierKind::Field)?,
                    },
                    scalar: f.scalar,
                })
            })
            .collect()
    }

    fn build_component(
        &mut self,
        definition: &ComponentDefinition,
        records: &[RecordType],
    ) -> Result<Component, ModelError> {
        let path = definition.name.clone();
        let ident = self
            .sanitizer
            .sanitize("", &definition.name, IdentifierKind::Component)?;
        for member in FIXED_MEMBERS {
            self.sanitizer.reserve(&path, IdentifierKind::Field, member);
        }
        let attributes = self.build_fields(&path, &definition.attributes)?;

        let machine = &definition.state_machine;
        let machine_path = format!("{}::{}", path, machine.name);
        if machine.states.is_empty() {
            return Err(ModelError::EmptyStateMachine { path: machine_path });
        }
        check_unique(&machine_path, "state", machine.states.iter().map(|s| &s.name))?;
        check_unique(&path, "activity", definition.activities.iter().map(|a| &a.name))?;

        // Activity names first, so call-behavior targets and state activities can resolve.
        let guard_count = machine.transitions.iter().filter(|t| t.guard.is_some()).count();
        for method in FIXED_METHODS {
            self.sanitizer.reserve(&path, IdentifierKind::Activity, method);
        }
        for index in 0..guard_count {
            self.sanitizer
                .reserve(&path, IdentifierKind::Activity, &format!("guard_{}", index));
        }
        let mut activity_names = Vec::with_capacity(definition.activities.len());
        for activity in &definition.activities {
            activity_names.push(Name {
                raw: activity.name.clone(),
                ident: self
                    .sanitizer
                    .sanitize(&path, &activity.name, IdentifierKind::Activity)?,
            });
        }

        let class_names = class_scope_names(
            activity_names.iter().map(|n| n.ident.as_str()),
            guard_count,
            records.iter().map(|r| r.name.ident.as_str()),
        );
        let mut activities = Vec::with_capacity(definition.activities.len());
        for (index, activity) in definition.activities.iter().enumerate() {
            let builder = ActivityBuilder {
                sanitizer: &mut self.sanitizer,
                component: definition,
                records,
                class_names: &class_names,
                path: format!("{}::{}", path, activity.name),
            };
            activities.push(builder.build(activity, activity_names[index].clone())?);
        }

        let mut states = Vec::with_capacity(machine.states.len());
        for state in &machine.states {
            let state_path = format!("{}::state '{}'", machine_path, state.name);
            let mut state_activities = Vec::with_capacity(state.activities.len());
            for name in &state.activities {
                let id = find_activity(definition, &state_path, name)?;
                // The dispatcher has nothing to pass to an activity expecting inputs.
                if let Some(&param) = activities[id].parameters(ParameterDirection::In).first() {
                    if let NodeKind::Parameter { name, .. } = &activities[id].nodes[param].kind {
                        return Err(ModelError::MissingArgument {
                            path: state_path,
                            parameter: name.raw.clone(),
                        });
                    }
                }
                state_activities.push(id);
            }
            states.push(State {
                name: Name {
                    raw: state.name.clone(),
                    ident: self
                        .sanitizer
                        .sanitize(&machine_path, &state.name, IdentifierKind::State)?,
                },
                activities: state_activities,
            });
        }

        let initial = find_state(machine, &machine_path, &machine.initial)?;

        let mut commands = vec![
            Command {
                mnemonic: START_COMMAND.to_string(),
                kind: CommandKind::Start,
            },
            Command {
                mnemonic: STOP_COMMAND.to_string(),
                kind: CommandKind::Stop,
            },
        ];
        for command in &commands {
            self.sanitizer
                .reserve(&path, IdentifierKind::Command, &command.mnemonic);
        }

        let mut transitions = Vec::with_capacity(machine.transitions.len());
        for transition in &machine.transitions {
            let transition_path = format!(
                "{}::transition '{} -> {}'",
                machine_path, transition.source, transition.target
            );
            let source = find_state(machine, &transition_path, &transition.source)?;
            let target = find_state(machine, &transition_path, &transition.target)?;
            let guard = transition
                .guard
                .as_deref()
                .map(|g| build_guard(&transition_path, g, &attributes))
                .transpose()?;

            let trigger = match &transition.trigger {
                Some(signal) => {
                    let mnemonic = self
                        .sanitizer
                        .sanitize(&path, signal, IdentifierKind::Command)?
                        .to_ascii_uppercase();
                    let existing = commands.iter().position(
                        |c| matches!(&c.kind, CommandKind::Trigger(s) if s == signal),
                    );
                    Some(existing.unwrap_or_else(|| {
                        commands.push(Command {
                            mnemonic,
                            kind: CommandKind::Trigger(signal.clone()),
                        });
                        commands.len() - 1
                    }))
                }
                None => None,
            };

            transitions.push(Transition {
                source,
                target,
                guard,
                trigger,
            });
        }

        let state_machine = StateMachine {
            name: Name {
                raw: machine.name.clone(),
                ident: self
                    .sanitizer
                    .sanitize(&path, &machine.name, IdentifierKind::Component)?,
            },
            states,
            initial,
            transitions,
        };

        Ok(Component {
            name: Name {
                raw: definition.name.clone(),
                ident,
            },
            state_machine,
            activities,
            attributes,
            commands,
            telemetry_channel: CURRENT_STATE_CHANNEL.to_string(),
            transition_event: STATE_TRANSITION_EVENT.to_string(),
        })
    }
}

struct ActivityBuilder<'a> {
    sanitizer: &'a mut Sanitizer,
    component: &'a ComponentDefinition,
    records: &'a [RecordType],
    class_names: &'a [String],
    path: String,
}

impl ActivityBuilder<'_> {
    fn build(mut self, definition: &ActivityDefinition, name: Name) -> Result<Activity, ModelError> {
        check_unique(&self.path, "node", definition.nodes.iter().map(|n| &n.id))?;
        let index: AHashMap<&str, NodeId> = definition
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();

        for name in self.class_names {
            self.sanitizer
                .reserve(&self.path, IdentifierKind::Variable, name);
        }

        // Opaque bodies refer to their pins verbatim, so pin names keep priority over
        // generated variable names.
        let mut pin_names: AHashMap<(usize, String), String> = AHashMap::new();
        for (i, node) in definition.nodes.iter().enumerate() {
            if let NodeKindDefinition::OpaqueAction {
                inputs, outputs, ..
            } = &node.kind
            {
                let scope = format!("{}::{}", self.path, node.id);
                for pin in inputs.iter().chain(outputs) {
                    let ident =
                        self.sanitizer
                            .sanitize(&scope, &pin.name, IdentifierKind::Variable)?;
                    pin_names.insert((i, pin.name.clone()), ident);
                }
            }
        }
        for ident in pin_names.values().collect::<BTreeSet<_>>() {
            self.sanitizer
                .reserve(&self.path, IdentifierKind::Variable, ident);
        }

        let mut nodes = Vec::with_capacity(definition.nodes.len());
        for (i, node) in definition.nodes.iter().enumerate() {
            let node_path = format!("{}::node '{}'", self.path, node.id);
            let raw = match &node.kind {
                NodeKindDefinition::Parameter { name, .. } => name.as_str(),
                _ => node.name.as_deref().unwrap_or(&node.id),
            };
            let ident = self
                .sanitizer
                .fresh(&self.path, raw, IdentifierKind::Variable)?;

            let kind = match &node.kind {
                NodeKindDefinition::OpaqueAction {
                    body,
                    language,
                    inputs,
                    outputs,
                } => {
                    check_unique(&node_path, "input pin", inputs.iter().map(|p| &p.name))?;
                    check_unique(&node_path, "output pin", outputs.iter().map(|p| &p.name))?;
                    let mut resolved_inputs = Vec::with_capacity(inputs.len());
                    for pin in inputs {
                        let source = pin.source.as_ref().ok_or_else(|| {
                            ModelError::MissingArgument {
                                path: node_path.clone(),
                                parameter: pin.name.clone(),
                            }
                        })?;
                        resolved_inputs.push(Pin {
                            name: pin_name(&pin_names, i, &pin.name),
                            scalar: pin.scalar,
                            source: Some(resolve_port(definition, &index, &node_path, source)?),
                        });
                    }
                    let resolved_outputs = outputs
                        .iter()
                        .map(|pin| Pin {
                            name: pin_name(&pin_names, i, &pin.name),
                            scalar: pin.scalar,
                            source: None,
                        })
                        .collect();
                    NodeKind::OpaqueAction {
                        body: body.clone(),
                        language: language.clone(),
                        inputs: resolved_inputs,
                        outputs: resolved_outputs,
                    }
                }
                NodeKindDefinition::CallBehavior { target, arguments } => {
                    let target_id = find_activity(self.component, &node_path, target)?;
                    let target_def = &self.component.activities[target_id];
                    let mut resolved = Vec::with_capacity(arguments.len());
                    for argument in arguments {
                        let parameter = find_in_parameter(target_def, &argument.parameter)
                            .ok_or_else(|| ModelError::UnresolvedReference {
                                path: node_path.clone(),
                                kind: "parameter",
                                reference: argument.parameter.clone(),
                            })?;
                        resolved.push(Argument {
                            parameter,
                            source: resolve_port(definition, &index, &node_path, &argument.source)?,
                        });
                    }
                    NodeKind::CallBehavior {
                        target: target_id,
                        arguments: resolved,
                    }
                }
                NodeKindDefinition::ReadStructuralFeature { object, attribute } => {
                    NodeKind::ReadStructuralFeature {
                        object: resolve_port(definition, &index, &node_path, object)?,
                        attribute: attribute.clone(),
                    }
                }
                NodeKindDefinition::AddStructuralFeatureValue {
                    object,
                    attribute,
                    value,
                } => NodeKind::AddStructuralFeatureValue {
                    object: resolve_port(definition, &index, &node_path, object)?,
                    attribute: attribute.clone(),
                    value: resolve_port(definition, &index, &node_path, value)?,
                },
                NodeKindDefinition::Fork { branches } => NodeKind::Fork {
                    branches: resolve_nodes(&index, &node_path, branches)?,
                },
                NodeKindDefinition::Join { inputs } => NodeKind::Join {
                    inputs: resolve_nodes(&index, &node_path, inputs)?,
                },
                NodeKindDefinition::CreateObject { record_type } => NodeKind::CreateObject {
                    record: find_record(self.records, &node_path, record_type)?,
                },
                NodeKindDefinition::Parameter {
                    direction,
                    name,
                    type_name,
                    source,
                } => {
                    let ty = match self.records.iter().position(|r| &r.name.raw == type_name) {
                        Some(record) => ParameterType::Record(record),
                        None => ScalarType::from_uml_name(type_name)
                            .map(ParameterType::Scalar)
                            .ok_or_else(|| ModelError::UnresolvedReference {
                                path: node_path.clone(),
                                kind: "type",
                                reference: type_name.clone(),
                            })?,
                    };
                    let source = match (direction, source) {
                        (ParameterDirection::Out, Some(source)) => {
                            Some(resolve_port(definition, &index, &node_path, source)?)
                        }
                        _ => None,
                    };
                    NodeKind::Parameter {
                        direction: *direction,
                        name: Name {
                            raw: name.clone(),
                            ident: ident.clone(),
                        },
                        ty,
                        source,
                    }
                }
                NodeKindDefinition::ValueSpecification { literal } => {
                    NodeKind::ValueSpecification { literal: *literal }
                }
            };

            nodes.push(Node {
                id: node.id.clone(),
                ident,
                kind,
            });
        }

        check_unique(
            &self.path,
            "parameter",
            definition.nodes.iter().filter_map(|n| match &n.kind {
                NodeKindDefinition::Parameter { name, .. } => Some(name),
                _ => None,
            }),
        )?;

        let edges = definition
            .edges
            .iter()
            .map(|e| {
                let edge_path = format!("{}::edge '{} -> {}'", self.path, e.source, e.target);
                Ok((
                    lookup_node(&index, &edge_path, &e.source)?,
                    lookup_node(&index, &edge_path, &e.target)?,
                ))
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        Ok(Activity { name, nodes, edges })
    }
}

fn pin_name(pin_names: &AHashMap<(usize, String), String>, node: usize, raw: &str) -> Name {
    Name {
        raw: raw.to_string(),
        ident: pin_names
            .get(&(node, raw.to_string()))
            .cloned()
            .unwrap_or_else(|| raw.to_string()),
    }
}

fn build_guard(path: &str, source: &str, attributes: &[Field]) -> Result<Guard, ModelError> {
    let expression = parse_expression(source).map_err(|e| ModelError::InvalidExpression {
        path: path.to_string(),
        message: e.to_string(),
    })?;

    let mut variables = BTreeSet::new();
    expression.collect_variables(&mut variables);
    let mut bool_guard = expression.is_boolean();
    for variable in &variables {
        let attribute = attributes
            .iter()
            .find(|a| &a.name.raw == variable)
            .ok_or_else(|| ModelError::UnresolvedReference {
                path: path.to_string(),
                kind: "attribute",
                reference: variable.clone(),
            })?;
        if expression == crate::ast::Expression::Variable(variable.clone()) {
            bool_guard = attribute.scalar == ScalarType::Bool;
        }
    }
    if !bool_guard {
        return Err(ModelError::InvalidExpression {
            path: path.to_string(),
            message: format!("guard '{}' does not yield a boolean", source),
        });
    }

    let renamed = expression.map_variables(&|raw| {
        attributes
            .iter()
            .find(|a| a.name.raw == raw)
            .map(|a| a.name.ident.clone())
            .unwrap_or_else(|| raw.to_string())
    });
    Ok(Guard {
        source: source.to_string(),
        expression: renamed,
    })
}

fn check_unique<'a>(
    path: &str,
    kind: &'static str,
    names: impl Iterator<Item = &'a String>,
) -> Result<(), ModelError> {
    let mut seen = AHashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(ModelError::DuplicateName {
                path: path.to_string(),
                kind,
                name: name.clone(),
            });
        }
    }
    Ok(())
}

fn find_state(
    machine: &StateMachineDefinition,
    path: &str,
    name: &str,
) -> Result<StateId, ModelError> {
    machine
        .states
        .iter()
        .position(|s| s.name == name)
        .ok_or_else(|| ModelError::UnresolvedReference {
            path: path.to_string(),
            kind: "state",
            reference: name.to_string(),
        })
}

fn find_activity(
    component: &ComponentDefinition,
    path: &str,
    name: &str,
) -> Result<ActivityId, ModelError> {
    component
        .activities
        .iter()
        .position(|a| a.name == name)
        .ok_or_else(|| ModelError::UnresolvedReference {
            path: path.to_string(),
            kind: "activity",
            reference: name.to_string(),
        })
}

fn find_record(records: &[RecordType], path: &str, name: &str) -> Result<RecordId, ModelError> {
    records
        .iter()
        .position(|r| r.name.raw == name)
        .ok_or_else(|| ModelError::UnresolvedReference {
            path: path.to_string(),
            kind: "record type",
            reference: name.to_string(),
        })
}

fn find_in_parameter(activity: &ActivityDefinition, name: &str) -> Option<NodeId> {
    activity.nodes.iter().position(|n| {
        matches!(
            &n.kind,
            NodeKindDefinition::Parameter { direction: ParameterDirection::In, name: p, .. } if p == name
        )
    })
}

fn lookup_node(index: &AHashMap<&str, NodeId>, path: &str, id: &str) -> Result<NodeId, ModelError> {
    index
        .get(id)
        .copied()
        .ok_or_else(|| ModelError::UnresolvedReference {
            path: path.to_string(),
            kind: "node",
            reference: id.to_string(),
        })
}

fn resolve_nodes(
    index: &AHashMap<&str, NodeId>,
    path: &str,
    ids: &[String],
) -> Result<Vec<NodeId>, ModelError> {
    ids.iter().map(|id| lookup_node(index, path, id)).collect()
}

fn resolve_port(
    activity: &ActivityDefinition,
    index: &AHashMap<&str, NodeId>,
    path: &str,
    reference: &ValueRef,
) -> Result<Port, ModelError> {
    let node = lookup_node(index, path, &reference.node)?;
    let unresolved_pin = |pin: &str| ModelError::UnresolvedReference {
        path: path.to_string(),
        kind: "pin",
        reference: format!("{}.{}", reference.node, pin),
    };

    match (&activity.nodes[node].kind, &reference.pin) {
        (NodeKindDefinition::OpaqueAction { outputs, .. }, Some(pin)) => outputs
            .iter()
            .position(|p| &p.name == pin)
            .map(|i| Port { node, pin: Some(i) })
            .ok_or_else(|| unresolved_pin(pin)),
        (NodeKindDefinition::OpaqueAction { outputs, .. }, None) if outputs.len() == 1 => {
            Ok(Port { node, pin: Some(0) })
        }
        (NodeKindDefinition::OpaqueAction { .. }, None) => Err(unresolved_pin("<output>")),
        (_, Some(pin)) => Err(unresolved_pin(pin)),
        (_, None) => Ok(Port { node, pin: None }),
    }
}
