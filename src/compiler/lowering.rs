use super::compiled::*;
use super::graph::DependencyGraph;
use crate::ast::{ScalarType, Value};
use crate::error::{CompileError, ModelError, UnsupportedLanguageError};
use crate::model::{
    Activity, Component, Model, NodeId, NodeKind, ParameterDirection, ParameterType, Port,
    RecordType, class_scope_names,
};
use crate::sanitize::{IdentifierKind, Sanitizer};
use ahash::AHashMap;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Lowers a single activity once its callees are compiled.
pub(super) struct ActivityLowering<'a> {
    model: &'a Model,
    component: &'a Component,
    activity: &'a Activity,
    path: String,
    callees: AHashMap<NodeId, Arc<CompiledActivity>>,
}

/// Whether an opaque action's language tag asks for a translation the compiler lacks.
pub(super) fn declared_language(language: Option<&str>) -> Option<&str> {
    language
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case("none"))
}

/// Rejects the first opaque action that declares a transformation language.
pub(super) fn check_languages(path: &str, activity: &Activity) -> Result<(), UnsupportedLanguageError> {
    for node in &activity.nodes {
        if let NodeKind::OpaqueAction { language, .. } = &node.kind {
            if let Some(language) = declared_language(language.as_deref()) {
                return Err(UnsupportedLanguageError {
                    activity: path.to_string(),
                    node: node.id.clone(),
                    language: language.to_string(),
                });
            }
        }
    }
    Ok(())
}

impl<'a> ActivityLowering<'a> {
    pub(super) fn new(
        model: &'a Model,
        component: &'a Component,
        activity: &'a Activity,
        path: String,
        callees: AHashMap<NodeId, Arc<CompiledActivity>>,
    ) -> Self {
        Self {
            model,
            component,
            activity,
            path,
            callees,
        }
    }

    pub(super) fn lower(self) -> Result<CompiledActivity, CompileError> {
        let graph = self.dependency_graph()?;
        self.check_object_order(&graph)?;

        let order = graph.topological_order().map_err(|stuck| ModelError::CyclicDependency {
            path: self.path.clone(),
            nodes: stuck
                .into_iter()
                .map(|n| self.activity.nodes[n].id.clone())
                .collect(),
        })?;

        // Typing follows value references, which are acyclic once an order exists.
        self.check_types()?;
        Ok(self.emit_statements(&order)?)
    }

    fn node_path(&self, node: NodeId) -> String {
        format!("{}::node '{}'", self.path, self.activity.nodes[node].id)
    }

    fn record(&self, ty: &ValueType) -> Option<&'a RecordType> {
        match ty {
            ValueType::Record(ident) => self.model.record_types.iter().find(|r| &r.name.ident == ident),
            ValueType::Scalar(_) => None,
        }
    }

    // --- Typing ---

    fn parameter_type(&self, ty: ParameterType) -> ValueType {
        match ty {
            ParameterType::Record(r) => {
                ValueType::Record(self.model.record_types[r].name.ident.clone())
            }
            ParameterType::Scalar(s) => ValueType::Scalar(s),
        }
    }

    /// Follows write chains back to the node that first produced an object.
    fn object_root(&self, port: Port) -> Result<NodeId, ModelError> {
        let mut current = port.node;
        let mut steps = 0;
        while let NodeKind::AddStructuralFeatureValue { object, .. } =
            &self.activity.nodes[current].kind
        {
            current = object.node;
            steps += 1;
            if steps > self.activity.nodes.len() {
                return Err(ModelError::CyclicDependency {
                    path: self.node_path(port.node),
                    nodes: vec![self.activity.nodes[port.node].id.clone()],
                });
            }
        }
        Ok(current)
    }

    fn value_type(&self, port: Port) -> Result<ValueType, ModelError> {
        let node = &self.activity.nodes[port.node];
        let mismatch = |found: &str| ModelError::TypeMismatch {
            path: self.node_path(port.node),
            expected: "a value".to_string(),
            found: found.to_string(),
        };
        match &node.kind {
            NodeKind::Parameter {
                direction: ParameterDirection::In,
                ty,
                ..
            } => Ok(self.parameter_type(*ty)),
            NodeKind::Parameter { .. } => Err(mismatch("an output parameter")),
            NodeKind::CreateObject { record } => Ok(ValueType::Record(
                self.model.record_types[*record].name.ident.clone(),
            )),
            NodeKind::ReadStructuralFeature { object, attribute } => {
                let (_, field) = self.feature(port.node, *object, attribute)?;
                Ok(ValueType::Scalar(field))
            }
            NodeKind::AddStructuralFeatureValue { .. } => {
                let root = self.object_root(port)?;
                self.value_type(Port {
                    node: root,
                    pin: None,
                })
            }
            NodeKind::ValueSpecification { literal } => Ok(ValueType::Scalar(scalar_of(literal))),
            NodeKind::OpaqueAction { outputs, .. } => {
                let pin = port.pin.and_then(|p| outputs.get(p));
                pin.map(|p| ValueType::Scalar(p.scalar))
                    .ok_or_else(|| mismatch("an opaque action without that output"))
            }
            NodeKind::CallBehavior { .. } => self
                .callees
                .get(&port.node)
                .and_then(|callee| callee.outputs.first())
                .map(|slot| slot.ty.clone())
                .ok_or_else(|| ModelError::UnboundOutput {
                    path: self.node_path(port.node),
                }),
            NodeKind::Fork { .. } | NodeKind::Join { .. } => Err(mismatch("a control node")),
        }
    }

    /// Resolves a structural feature on the object at `object`: the record and the
    /// attribute's scalar type.
    fn feature(
        &self,
        node: NodeId,
        object: Port,
        attribute: &str,
    ) -> Result<(&'a RecordType, ScalarType), ModelError> {
        let ty = self.value_type(object)?;
        let record = self.record(&ty).ok_or_else(|| ModelError::TypeMismatch {
            path: self.node_path(node),
            expected: "a record".to_string(),
            found: ty.to_string(),
        })?;
        let field = record
            .field(attribute)
            .ok_or_else(|| ModelError::UndeclaredAttribute {
                path: self.node_path(node),
                record: record.name.raw.clone(),
                attribute: attribute.to_string(),
            })?;
        Ok((record, field.scalar))
    }

    fn expect_type(&self, node: NodeId, port: Port, expected: &ValueType) -> Result<(), ModelError> {
        let found = self.value_type(port)?;
        if &found != expected {
            return Err(ModelError::TypeMismatch {
                path: self.node_path(node),
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
        Ok(())
    }

    fn check_types(&self) -> Result<(), ModelError> {
        for (index, node) in self.activity.nodes.iter().enumerate() {
            match &node.kind {
                NodeKind::ReadStructuralFeature { object, attribute } => {
                    self.feature(index, *object, attribute)?;
                }
                NodeKind::AddStructuralFeatureValue {
                    object,
                    attribute,
                    value,
                } => {
                    let (_, scalar) = self.feature(index, *object, attribute)?;
                    self.expect_type(index, *value, &ValueType::Scalar(scalar))?;
                }
                NodeKind::OpaqueAction { inputs, .. } => {
                    for pin in inputs {
                        if let Some(source) = pin.source {
                            self.expect_type(index, source, &ValueType::Scalar(pin.scalar))?;
                        }
                    }
                }
                NodeKind::CallBehavior { target, arguments } => {
                    let callee = &self.component.activities[*target];
                    for parameter in callee.parameters(ParameterDirection::In) {
                        let NodeKind::Parameter { name, ty, .. } = &callee.nodes[parameter].kind
                        else {
                            continue;
                        };
                        let argument = arguments
                            .iter()
                            .find(|a| a.parameter == parameter)
                            .ok_or_else(|| ModelError::MissingArgument {
                                path: self.node_path(index),
                                parameter: name.raw.clone(),
                            })?;
                        self.expect_type(index, argument.source, &self.parameter_type(*ty))?;
                    }
                }
                NodeKind::Parameter {
                    direction: ParameterDirection::Out,
                    ty,
                    source,
                    ..
                } => {
                    let source = source.ok_or_else(|| ModelError::UnboundOutput {
                        path: self.node_path(index),
                    })?;
                    self.expect_type(index, source, &self.parameter_type(*ty))?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    // --- Ordering ---

    fn consumed_ports(&self, node: NodeId) -> Vec<Port> {
        match &self.activity.nodes[node].kind {
            NodeKind::OpaqueAction { inputs, .. } => {
                inputs.iter().filter_map(|p| p.source).collect()
            }
            NodeKind::CallBehavior { arguments, .. } => {
                arguments.iter().map(|a| a.source).collect()
            }
            NodeKind::ReadStructuralFeature { object, .. } => vec![*object],
            NodeKind::AddStructuralFeatureValue { object, value, .. } => vec![*object, *value],
            NodeKind::Parameter { source, .. } => source.iter().copied().collect(),
            _ => Vec::new(),
        }
    }

    fn is_parameter(&self, node: NodeId, direction: ParameterDirection) -> bool {
        matches!(
            &self.activity.nodes[node].kind,
            NodeKind::Parameter { direction: d, .. } if *d == direction
        )
    }

    fn dependency_graph(&self) -> Result<DependencyGraph, ModelError> {
        let count = self.activity.nodes.len();
        let mut graph = DependencyGraph::new(count);

        for node in 0..count {
            for port in self.consumed_ports(node) {
                graph.add_edge(port.node, node);
            }
            match &self.activity.nodes[node].kind {
                NodeKind::Fork { branches } => {
                    for &branch in branches {
                        graph.add_edge(node, branch);
                    }
                }
                NodeKind::Join { inputs } => {
                    for &input in inputs {
                        graph.add_edge(input, node);
                    }
                }
                _ => {}
            }
        }
        for &(source, target) in &self.activity.edges {
            graph.add_edge(source, target);
        }

        // Inputs are received on entry; outputs are returned on exit.
        for node in 0..count {
            for other in 0..count {
                if node == other {
                    continue;
                }
                if self.is_parameter(node, ParameterDirection::In)
                    && !self.is_parameter(other, ParameterDirection::In)
                {
                    graph.add_edge(node, other);
                }
                if self.is_parameter(other, ParameterDirection::Out)
                    && !self.is_parameter(node, ParameterDirection::Out)
                {
                    graph.add_edge(node, other);
                }
            }
        }

        // A consumer of an object sees every write to it that is not downstream of the
        // consumer itself. Reads only wait for writes to the attribute they read. Edges
        // are added one at a time in declaration order; an edge that would close a cycle
        // is skipped, so the earlier declared writer goes first.
        let mut consumers = Vec::new();
        for consumer in 0..count {
            let read_attribute = match &self.activity.nodes[consumer].kind {
                NodeKind::ReadStructuralFeature { attribute, .. } => Some(attribute.as_str()),
                _ => None,
            };
            let objects: Vec<NodeId> = match &self.activity.nodes[consumer].kind {
                NodeKind::ReadStructuralFeature { object, .. } => vec![self.object_root(*object)?],
                NodeKind::CallBehavior { arguments, .. } => arguments
                    .iter()
                    .map(|a| self.object_root(a.source))
                    .collect::<Result<_, _>>()?,
                NodeKind::Parameter {
                    direction: ParameterDirection::Out,
                    source: Some(source),
                    ..
                } => vec![self.object_root(*source)?],
                _ => continue,
            };
            consumers.push((consumer, read_attribute, objects));
        }

        for (write, root, attribute) in self.writes()? {
            for (consumer, read_attribute, objects) in &consumers {
                let relevant = objects.contains(&root)
                    && read_attribute.is_none_or(|a| a == attribute)
                    && write != *consumer;
                if relevant && !graph.reaches(*consumer, write) {
                    graph.add_edge(write, *consumer);
                }
            }
        }

        Ok(graph)
    }

    /// Every write as `(node, object root, attribute)`.
    fn writes(&self) -> Result<Vec<(NodeId, NodeId, &'a str)>, ModelError> {
        let mut writes = Vec::new();
        for (index, node) in self.activity.nodes.iter().enumerate() {
            if let NodeKind::AddStructuralFeatureValue {
                object, attribute, ..
            } = &node.kind
            {
                writes.push((index, self.object_root(*object)?, attribute.as_str()));
            }
        }
        Ok(writes)
    }

    /// A write must follow the creation (or receipt) of the object it targets. Control
    /// edges that force it earlier are rejected rather than reordered.
    fn check_object_order(&self, graph: &DependencyGraph) -> Result<(), ModelError> {
        for (write, root, _) in self.writes()? {
            if graph.reaches(write, root) {
                return Err(ModelError::DependencyOrderViolation {
                    path: self.node_path(write),
                    object: self.activity.nodes[root].id.clone(),
                });
            }
        }
        Ok(())
    }

    // --- Lowering ---

    fn emit_statements(&self, order: &[NodeId]) -> Result<CompiledActivity, ModelError> {
        let nodes = &self.activity.nodes;

        let mut locals = Sanitizer::new();
        let class_names = class_scope_names(
            self.component.activities.iter().map(|a| a.name.ident.as_str()),
            self.component.guard_count(),
            self.model.record_types.iter().map(|r| r.name.ident.as_str()),
        );
        for name in &class_names {
            locals.reserve("", IdentifierKind::Variable, name);
        }
        for node in nodes {
            locals.reserve("", IdentifierKind::Variable, &node.ident);
            if let NodeKind::OpaqueAction {
                inputs, outputs, ..
            } = &node.kind
            {
                for pin in inputs.iter().chain(outputs) {
                    locals.reserve("", IdentifierKind::Variable, &pin.name.ident);
                }
            }
        }

        let written_roots: BTreeSet<NodeId> =
            self.writes()?.into_iter().map(|(_, root, _)| root).collect();

        // The variable each node's value lives in.
        let mut variables: Vec<String> = Vec::with_capacity(nodes.len());
        let mut pin_variables: AHashMap<(NodeId, usize), String> = AHashMap::new();
        for (index, node) in nodes.iter().enumerate() {
            let variable = match &node.kind {
                NodeKind::Parameter {
                    direction: ParameterDirection::In,
                    ..
                } if written_roots.contains(&index) => locals.fresh(
                    "",
                    &format!("{}_copy", node.ident),
                    IdentifierKind::Variable,
                )?,
                NodeKind::OpaqueAction { outputs, .. } => {
                    for (pin, output) in outputs.iter().enumerate() {
                        let name = locals.fresh(
                            "",
                            &format!("{}_{}", node.ident, output.name.ident),
                            IdentifierKind::Variable,
                        )?;
                        pin_variables.insert((index, pin), name);
                    }
                    node.ident.clone()
                }
                _ => node.ident.clone(),
            };
            variables.push(variable);
        }

        let port_variable = |port: Port| -> Result<String, ModelError> {
            if let Some(pin) = port.pin {
                if let Some(name) = pin_variables.get(&(port.node, pin)) {
                    return Ok(name.clone());
                }
            }
            let root = self.object_root(port)?;
            Ok(variables[root].clone())
        };

        let inputs: Vec<Slot> = self
            .activity
            .parameters(ParameterDirection::In)
            .into_iter()
            .filter_map(|n| self.slot(n))
            .collect();
        let outputs: Vec<Slot> = self
            .activity
            .parameters(ParameterDirection::Out)
            .into_iter()
            .filter_map(|n| self.slot(n))
            .collect();

        let mut statements = Vec::with_capacity(order.len());
        let mut calls = BTreeSet::new();
        for &index in order {
            let node = &nodes[index];
            let id = node.id.clone();
            let statement = match &node.kind {
                NodeKind::Parameter {
                    direction: ParameterDirection::In,
                    ty,
                    ..
                } => Statement::Receive {
                    node: id,
                    parameter: node.ident.clone(),
                    variable: variables[index].clone(),
                    ty: self.parameter_type(*ty),
                    copy: written_roots.contains(&index),
                },
                NodeKind::Parameter { source, .. } => {
                    let source = source.ok_or_else(|| ModelError::UnboundOutput {
                        path: self.node_path(index),
                    })?;
                    let slot = outputs
                        .iter()
                        .position(|s| s.ident == node.ident)
                        .unwrap_or_default();
                    Statement::Return {
                        node: id,
                        slot,
                        variable: port_variable(source)?,
                    }
                }
                NodeKind::CreateObject { record } => {
                    let record = &self.model.record_types[*record];
                    Statement::CreateObject {
                        node: id,
                        variable: variables[index].clone(),
                        record: record.name.ident.clone(),
                        fields: record
                            .fields
                            .iter()
                            .map(|f| (f.name.ident.clone(), f.scalar))
                            .collect(),
                    }
                }
                NodeKind::ValueSpecification { literal } => Statement::Literal {
                    node: id,
                    variable: variables[index].clone(),
                    value: *literal,
                },
                NodeKind::ReadStructuralFeature { object, attribute } => {
                    let (record, scalar) = self.feature(index, *object, attribute)?;
                    Statement::ReadFeature {
                        node: id,
                        variable: variables[index].clone(),
                        object: port_variable(*object)?,
                        attribute: field_ident(record, attribute),
                        scalar,
                    }
                }
                NodeKind::AddStructuralFeatureValue {
                    object,
                    attribute,
                    value,
                } => {
                    let (record, _) = self.feature(index, *object, attribute)?;
                    Statement::WriteFeature {
                        node: id,
                        object: port_variable(*object)?,
                        attribute: field_ident(record, attribute),
                        value: port_variable(*value)?,
                    }
                }
                NodeKind::OpaqueAction {
                    body,
                    inputs: pins_in,
                    outputs: pins_out,
                    ..
                } => {
                    let mut block_locals = Vec::new();
                    for pin in pins_in {
                        let source = pin.source.map(&port_variable).transpose()?;
                        block_locals.push(OpaqueLocal {
                            name: pin.name.ident.clone(),
                            scalar: pin.scalar,
                            source,
                        });
                    }
                    for pin in pins_out {
                        if !block_locals.iter().any(|l| l.name == pin.name.ident) {
                            block_locals.push(OpaqueLocal {
                                name: pin.name.ident.clone(),
                                scalar: pin.scalar,
                                source: None,
                            });
                        }
                    }
                    let exports = pins_out
                        .iter()
                        .enumerate()
                        .filter_map(|(pin, p)| {
                            pin_variables
                                .get(&(index, pin))
                                .map(|outer| (outer.clone(), p.name.ident.clone(), p.scalar))
                        })
                        .collect();
                    Statement::Opaque {
                        node: id,
                        locals: block_locals,
                        body: body.lines().map(|l| l.trim_end().to_string()).collect(),
                        exports,
                    }
                }
                NodeKind::CallBehavior { target, arguments } => {
                    let callee = self.callees.get(&index).ok_or_else(|| {
                        ModelError::UnresolvedReference {
                            path: self.node_path(index),
                            kind: "activity",
                            reference: self.component.activities[*target].name.raw.clone(),
                        }
                    })?;
                    let target_activity = &self.component.activities[*target];
                    let mut bound = Vec::new();
                    for parameter in target_activity.parameters(ParameterDirection::In) {
                        let argument = arguments
                            .iter()
                            .find(|a| a.parameter == parameter)
                            .ok_or_else(|| ModelError::MissingArgument {
                                path: self.node_path(index),
                                parameter: target_activity.nodes[parameter].id.clone(),
                            })?;
                        bound.push(port_variable(argument.source)?);
                    }
                    calls.insert(callee.qualified.clone());
                    Statement::Call {
                        node: id,
                        variable: callee
                            .outputs
                            .first()
                            .map(|slot| (variables[index].clone(), slot.ty.clone())),
                        target: callee.qualified.clone(),
                        method: callee.ident.clone(),
                        arguments: bound,
                    }
                }
                NodeKind::Fork { branches } => Statement::Fork {
                    node: id,
                    branches: branches.iter().map(|&b| nodes[b].id.clone()).collect(),
                },
                NodeKind::Join { inputs } => Statement::Join {
                    node: id,
                    inputs: inputs.iter().map(|&i| nodes[i].id.clone()).collect(),
                },
            };
            statements.push(statement);
        }

        Ok(CompiledActivity {
            component: self.component.name.ident.clone(),
            raw: self.activity.name.raw.clone(),
            ident: self.activity.name.ident.clone(),
            qualified: format!(
                "{}::{}",
                self.component.name.ident, self.activity.name.ident
            ),
            inputs,
            outputs,
            statements,
            calls,
        })
    }

    fn slot(&self, node: NodeId) -> Option<Slot> {
        match &self.activity.nodes[node].kind {
            NodeKind::Parameter { name, ty, .. } => Some(Slot {
                raw: name.raw.clone(),
                ident: name.ident.clone(),
                ty: self.parameter_type(*ty),
            }),
            _ => None,
        }
    }
}

fn field_ident(record: &RecordType, attribute: &str) -> String {
    record
        .field(attribute)
        .map(|f| f.name.ident.clone())
        .unwrap_or_else(|| attribute.to_string())
}

fn scalar_of(value: &Value) -> ScalarType {
    match value {
        Value::Number(_) => ScalarType::Float,
        Value::Bool(_) => ScalarType::Bool,
    }
}
