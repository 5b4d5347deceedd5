//! State Machine Synthesizer.
//!
//! Turns a component's state machine into a [`ComponentStateMachine`]: an enumerated
//! state set, a guard table, one dispatch arm per state plus a fatal default, the
//! lifecycle step sequences and the trigger command handlers. Rendering is left to the
//! emitter and execution to the reference runtime; both read the same structure.

use crate::ast::{Expression, ScalarType};
use crate::model::{CommandKind, Component, StateId};
use tracing::debug;

/// Log marker used as the source of the start transition.
pub const INIT_MARKER: &str = "INIT";
/// Log marker used as the source of the stop transition.
pub const ACTIVE_MARKER: &str = "ACTIVE";
/// Log marker used as the target of the stop transition. Never written to telemetry.
pub const STOPPED_MARKER: &str = "STOPPED";
/// Name reported for a state value outside the enumeration.
pub const UNKNOWN_STATE: &str = "UNKNOWN";

/// The fixed order in which a permitted transition takes effect.
pub const TRANSITION_SEQUENCE: [TransitionStep; 4] = [
    TransitionStep::EvaluateGuard,
    TransitionStep::Log,
    TransitionStep::Telemetry,
    TransitionStep::Commit,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionStep {
    /// A denying guard turns the remaining steps into a no-op.
    EvaluateGuard,
    /// Event with the source and target state names, in that order.
    Log,
    /// Telemetry write of the target state name.
    Telemetry,
    /// Update of the recorded current state.
    Commit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentStateMachine {
    pub component: String,
    pub component_raw: String,
    pub machine: String,
    pub states: Vec<StateEntry>,
    pub initial: StateId,
    pub transitions: Vec<TransitionEntry>,
    pub guards: Vec<GuardEntry>,
    pub dispatch: Dispatch,
    pub commands: Vec<CommandEntry>,
    pub start: Vec<LifecycleStep>,
    pub stop: Vec<LifecycleStep>,
    pub attributes: Vec<AttributeEntry>,
    pub telemetry_channel: String,
    pub transition_event: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateEntry {
    pub raw: String,
    pub ident: String,
    /// Enumerator name, `STATE_<IDENT>`.
    pub constant: String,
    pub value: u32,
    pub activities: Vec<ActivityRef>,
}

/// A state activity, by qualified name (`Component::Activity`) and method identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRef {
    pub qualified: String,
    pub ident: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionEntry {
    pub source: StateId,
    pub target: StateId,
    /// Index into `guards`; `None` is the always-permit default.
    pub guard: Option<usize>,
    /// Index into `commands`.
    pub trigger: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuardEntry {
    pub method: String,
    pub source: String,
    pub expression: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub arms: Vec<DispatchArm>,
    pub default: DispatchDefault,
}

impl Dispatch {
    /// Number of `case` labels including the default.
    pub fn case_count(&self) -> usize {
        self.arms.len() + 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchArm {
    pub state: StateId,
    pub activities: Vec<ActivityRef>,
    /// Untriggered transitions leaving this state, in declaration order. The first
    /// permitted one fires and ends the tick.
    pub transitions: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchDefault {
    /// A state value outside the enumeration halts the component.
    Fatal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandEntry {
    pub mnemonic: String,
    pub kind: CommandKind,
    pub handler: String,
    /// Per source state, the triggered transitions in declaration order. Empty for
    /// lifecycle commands.
    pub arms: Vec<(StateId, Vec<usize>)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepName {
    Marker(&'static str),
    State(StateId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStep {
    SetCurrent(StateId),
    SetActive(bool),
    Log { from: StepName, to: StepName },
    Telemetry(StateId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeEntry {
    pub ident: String,
    pub member: String,
    pub scalar: ScalarType,
}

impl ComponentStateMachine {
    pub fn state_name(&self, state: StateId) -> &str {
        &self.states[state].ident
    }

    pub fn state_by_value(&self, value: u32) -> Option<StateId> {
        self.states.iter().position(|s| s.value == value)
    }

    pub fn command(&self, mnemonic: &str) -> Option<&CommandEntry> {
        self.commands.iter().find(|c| c.mnemonic == mnemonic)
    }

    /// Qualified names of every activity a dispatch arm invokes, first use first.
    pub fn referenced_activities(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for arm in &self.dispatch.arms {
            for activity in &arm.activities {
                if !seen.contains(&activity.qualified) {
                    seen.push(activity.qualified.clone());
                }
            }
        }
        seen
    }
}

/// Synthesizes the dispatcher structure of one component.
pub fn synthesize(component: &Component) -> ComponentStateMachine {
    let machine = &component.state_machine;

    let states: Vec<StateEntry> = machine
        .states
        .iter()
        .enumerate()
        .map(|(index, state)| StateEntry {
            raw: state.name.raw.clone(),
            ident: state.name.ident.clone(),
            constant: format!("STATE_{}", state.name.ident.to_ascii_uppercase()),
            value: index as u32,
            activities: state
                .activities
                .iter()
                .map(|&a| ActivityRef {
                    qualified: component.qualified_activity(a),
                    ident: component.activities[a].name.ident.clone(),
                })
                .collect(),
        })
        .collect();

    // Append-only: guard n is the n-th guarded transition in declaration order.
    let mut guards = Vec::new();
    let transitions: Vec<TransitionEntry> = machine
        .transitions
        .iter()
        .map(|t| {
            let guard = t.guard.as_ref().map(|g| {
                guards.push(GuardEntry {
                    method: format!("guard_{}", guards.len()),
                    source: g.source.clone(),
                    expression: g.expression.clone(),
                });
                guards.len() - 1
            });
            TransitionEntry {
                source: t.source,
                target: t.target,
                guard,
                trigger: t.trigger,
            }
        })
        .collect();

    let arms = (0..states.len())
        .map(|state| DispatchArm {
            state,
            activities: states[state].activities.clone(),
            transitions: transitions
                .iter()
                .enumerate()
                .filter(|(_, t)| t.source == state && t.trigger.is_none())
                .map(|(i, _)| i)
                .collect(),
        })
        .collect();

    let commands = component
        .commands
        .iter()
        .enumerate()
        .map(|(index, command)| {
            let arms = match command.kind {
                CommandKind::Trigger(_) => (0..states.len())
                    .filter_map(|state| {
                        let fired: Vec<usize> = transitions
                            .iter()
                            .enumerate()
                            .filter(|(_, t)| t.source == state && t.trigger == Some(index))
                            .map(|(i, _)| i)
                            .collect();
                        (!fired.is_empty()).then_some((state, fired))
                    })
                    .collect(),
                _ => Vec::new(),
            };
            CommandEntry {
                mnemonic: command.mnemonic.clone(),
                kind: command.kind.clone(),
                handler: format!("{}_cmdHandler", command.mnemonic),
                arms,
            }
        })
        .collect();

    let initial = machine.initial;
    let start = vec![
        LifecycleStep::SetCurrent(initial),
        LifecycleStep::SetActive(true),
        LifecycleStep::Log {
            from: StepName::Marker(INIT_MARKER),
            to: StepName::State(initial),
        },
        LifecycleStep::Telemetry(initial),
    ];
    let stop = vec![
        LifecycleStep::SetActive(false),
        LifecycleStep::Log {
            from: StepName::Marker(ACTIVE_MARKER),
            to: StepName::Marker(STOPPED_MARKER),
        },
    ];

    let attributes = component
        .attributes
        .iter()
        .map(|a| AttributeEntry {
            ident: a.name.ident.clone(),
            member: format!("m_{}", a.name.ident),
            scalar: a.scalar,
        })
        .collect();

    debug!(
        component = %component.name.raw,
        states = states.len(),
        transitions = transitions.len(),
        guards = guards.len(),
        "state machine synthesized"
    );

    ComponentStateMachine {
        component: component.name.ident.clone(),
        component_raw: component.name.raw.clone(),
        machine: machine.name.ident.clone(),
        states,
        initial,
        transitions,
        guards,
        dispatch: Dispatch {
            arms,
            default: DispatchDefault::Fatal,
        },
        commands,
        start,
        stop,
        attributes,
        telemetry_channel: component.telemetry_channel.clone(),
        transition_event: component.transition_event.clone(),
    }
}
