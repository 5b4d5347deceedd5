use crate::ast::{ScalarType, Value};

/// The complete, resolved object graph handed over by an external model source.
/// This is the target structure for any export format conversion.
///
/// References between elements are plain names/ids; nothing is validated until
/// [`Model::build`](crate::model::Model::build) runs.
#[derive(Debug, Clone, Default)]
pub struct ModelDefinition {
    pub components: Vec<ComponentDefinition>,
    pub record_types: Vec<RecordTypeDefinition>,
}

/// A flat data record type: named scalar fields only.
#[derive(Debug, Clone)]
pub struct RecordTypeDefinition {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
}

/// A named scalar slot, used for record fields and component attributes.
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: String,
    pub scalar: ScalarType,
}

#[derive(Debug, Clone)]
pub struct ComponentDefinition {
    pub name: String,
    pub state_machine: StateMachineDefinition,
    pub activities: Vec<ActivityDefinition>,
    /// Component data that transition guards may read.
    pub attributes: Vec<FieldDefinition>,
}

#[derive(Debug, Clone)]
pub struct StateMachineDefinition {
    pub name: String,
    /// Declaration order is significant: it fixes the state enumeration.
    pub states: Vec<StateDefinition>,
    pub initial: String,
    pub transitions: Vec<TransitionDefinition>,
}

#[derive(Debug, Clone)]
pub struct StateDefinition {
    pub name: String,
    /// Names of activities run on every tick while the state is active, in order.
    pub activities: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TransitionDefinition {
    pub source: String,
    pub target: String,
    /// Boolean expression over component attributes. Absent means always permitted.
    pub guard: Option<String>,
    /// Signal name. Triggered transitions fire from a command handler instead of a tick.
    pub trigger: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ActivityDefinition {
    pub name: String,
    /// Declaration order is a tie-break hint only.
    pub nodes: Vec<NodeDefinition>,
    /// Explicit control-flow edges between node ids.
    pub edges: Vec<EdgeDefinition>,
}

#[derive(Debug, Clone)]
pub struct EdgeDefinition {
    pub source: String,
    pub target: String,
}

/// A single action node. `id` is stable and used for edges and diagnostics; `name` is
/// an optional display name that, when present, seeds the generated variable name.
#[derive(Debug, Clone)]
pub struct NodeDefinition {
    pub id: String,
    pub name: Option<String>,
    pub kind: NodeKindDefinition,
}

#[derive(Debug, Clone)]
pub enum NodeKindDefinition {
    OpaqueAction {
        body: String,
        language: Option<String>,
        inputs: Vec<PinDefinition>,
        outputs: Vec<PinDefinition>,
    },
    CallBehavior {
        target: String,
        arguments: Vec<ArgumentDefinition>,
    },
    ReadStructuralFeature {
        object: ValueRef,
        attribute: String,
    },
    AddStructuralFeatureValue {
        object: ValueRef,
        attribute: String,
        value: ValueRef,
    },
    Fork {
        branches: Vec<String>,
    },
    Join {
        inputs: Vec<String>,
    },
    CreateObject {
        record_type: String,
    },
    Parameter {
        direction: ParameterDirection,
        name: String,
        /// A record type name or a UML primitive (`Real`, `Boolean`, ...).
        type_name: String,
        /// Where an output parameter takes its value from.
        source: Option<ValueRef>,
    },
    ValueSpecification {
        literal: Value,
    },
}

impl NodeKindDefinition {
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKindDefinition::OpaqueAction { .. } => "OpaqueAction",
            NodeKindDefinition::CallBehavior { .. } => "CallBehaviorAction",
            NodeKindDefinition::ReadStructuralFeature { .. } => "ReadStructuralFeatureAction",
            NodeKindDefinition::AddStructuralFeatureValue { .. } => {
                "AddStructuralFeatureValueAction"
            }
            NodeKindDefinition::Fork { .. } => "ForkNode",
            NodeKindDefinition::Join { .. } => "JoinNode",
            NodeKindDefinition::CreateObject { .. } => "CreateObjectAction",
            NodeKindDefinition::Parameter { .. } => "ActivityParameterNode",
            NodeKindDefinition::ValueSpecification { .. } => "ValueSpecificationAction",
        }
    }
}

/// A typed pin of an opaque action. Pin names are the variable names the body uses.
#[derive(Debug, Clone)]
pub struct PinDefinition {
    pub name: String,
    pub scalar: ScalarType,
    /// Where an input pin takes its value from. Unused for output pins.
    pub source: Option<ValueRef>,
}

/// Binds a value to an input parameter of the called activity.
#[derive(Debug, Clone)]
pub struct ArgumentDefinition {
    pub parameter: String,
    pub source: ValueRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterDirection {
    In,
    Out,
}

/// Points at the value produced by a node; `pin` selects an opaque action output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRef {
    pub node: String,
    pub pin: Option<String>,
}

impl ValueRef {
    pub fn node(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            pin: None,
        }
    }

    pub fn pin(node: impl Into<String>, pin: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            pin: Some(pin.into()),
        }
    }
}
