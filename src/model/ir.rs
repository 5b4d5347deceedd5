use crate::ast::{Expression, ScalarType, Value};
use crate::model::definition::ParameterDirection;

pub type ComponentId = usize;
pub type StateId = usize;
pub type ActivityId = usize;
pub type NodeId = usize;
pub type RecordId = usize;

/// Mnemonics of the lifecycle commands every component exposes.
pub const START_COMMAND: &str = "START_STATE_MACHINE";
pub const STOP_COMMAND: &str = "STOP_STATE_MACHINE";
/// Telemetry channel carrying the name of the most recently entered state.
pub const CURRENT_STATE_CHANNEL: &str = "CurrentState";
/// Event carrying `(fromName, toName)` for every transition.
pub const STATE_TRANSITION_EVENT: &str = "StateTransition";
/// Methods every emitted component defines; activities must not shadow them.
pub const FIXED_METHODS: [&str; 5] = [
    "initializeStateMachine",
    "processStateMachine",
    "transitionToState",
    "getStateName",
    "schedIn_handler",
];

/// Names an activity-local variable must not take: every method of the emitted class
/// and every type an activity body spells out. A local sharing one of them would hide it
/// from its own initializer.
pub fn class_scope_names<'a>(
    activities: impl IntoIterator<Item = &'a str>,
    guard_count: usize,
    records: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    let mut names: Vec<String> = FIXED_METHODS.iter().map(|m| m.to_string()).collect();
    names.extend((0..guard_count).map(|i| format!("guard_{}", i)));
    names.extend(activities.into_iter().map(str::to_string));
    names.extend(records.into_iter().map(str::to_string));
    names.push("F64".to_string());
    names
}

/// A model name together with the identifier it was sanitized to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub raw: String,
    pub ident: String,
}

/// The validated, index-resolved model of one generation run. Built once by
/// [`Model::build`] and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Model {
    pub components: Vec<Component>,
    pub record_types: Vec<RecordType>,
}

#[derive(Debug, Clone)]
pub struct RecordType {
    pub name: Name,
    pub fields: Vec<Field>,
}

impl RecordType {
    pub fn field(&self, raw: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name.raw == raw)
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: Name,
    pub scalar: ScalarType,
}

#[derive(Debug, Clone)]
pub struct Component {
    pub name: Name,
    pub state_machine: StateMachine,
    pub activities: Vec<Activity>,
    pub attributes: Vec<Field>,
    /// Lifecycle commands first, then one command per distinct transition trigger.
    pub commands: Vec<Command>,
    pub telemetry_channel: String,
    pub transition_event: String,
}

impl Component {
    pub fn guard_count(&self) -> usize {
        self.state_machine
            .transitions
            .iter()
            .filter(|t| t.guard.is_some())
            .count()
    }

    pub fn qualified_activity(&self, activity: ActivityId) -> String {
        format!("{}::{}", self.name.ident, self.activities[activity].name.ident)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Start,
    Stop,
    /// Fires the transitions carrying this signal name.
    Trigger(String),
}

#[derive(Debug, Clone)]
pub struct Command {
    pub mnemonic: String,
    pub kind: CommandKind,
}

#[derive(Debug, Clone)]
pub struct StateMachine {
    pub name: Name,
    pub states: Vec<State>,
    pub initial: StateId,
    pub transitions: Vec<Transition>,
}

#[derive(Debug, Clone)]
pub struct State {
    pub name: Name,
    pub activities: Vec<ActivityId>,
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub source: StateId,
    pub target: StateId,
    pub guard: Option<Guard>,
    /// Index into the owning component's `commands`.
    pub trigger: Option<usize>,
}

/// A parsed guard. Variables are already renamed to attribute identifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct Guard {
    pub source: String,
    pub expression: Expression,
}

#[derive(Debug, Clone)]
pub struct Activity {
    pub name: Name,
    pub nodes: Vec<Node>,
    /// Explicit control-flow edges.
    pub edges: Vec<(NodeId, NodeId)>,
}

impl Activity {
    /// Parameter nodes of the given direction, in declaration order.
    pub fn parameters(&self, direction: ParameterDirection) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| {
                matches!(&n.kind, NodeKind::Parameter { direction: d, .. } if *d == direction)
            })
            .map(|(i, _)| i)
            .collect()
    }
}

/// An action node. `ident` is the local variable name the node's value is bound to.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub ident: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    OpaqueAction {
        body: String,
        language: Option<String>,
        inputs: Vec<Pin>,
        outputs: Vec<Pin>,
    },
    CallBehavior {
        target: ActivityId,
        arguments: Vec<Argument>,
    },
    ReadStructuralFeature {
        object: Port,
        attribute: String,
    },
    AddStructuralFeatureValue {
        object: Port,
        attribute: String,
        value: Port,
    },
    Fork {
        branches: Vec<NodeId>,
    },
    Join {
        inputs: Vec<NodeId>,
    },
    CreateObject {
        record: RecordId,
    },
    Parameter {
        direction: ParameterDirection,
        name: Name,
        ty: ParameterType,
        source: Option<Port>,
    },
    ValueSpecification {
        literal: Value,
    },
}

/// A resolved value reference: a node, and for opaque actions the output pin index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port {
    pub node: NodeId,
    pub pin: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Pin {
    pub name: Name,
    pub scalar: ScalarType,
    pub source: Option<Port>,
}

#[derive(Debug, Clone)]
pub struct Argument {
    /// Parameter node inside the called activity.
    pub parameter: NodeId,
    pub source: Port,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    Record(RecordId),
    Scalar(ScalarType),
}
