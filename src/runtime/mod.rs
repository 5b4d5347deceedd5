//! Reference executor for a synthesized [`ComponentStateMachine`].
//!
//! Drives the same structure the emitter renders, with every side effect routed through
//! an injected [`Sink`]. The lifecycle commands, the trigger commands and the per-tick
//! dispatch behave as the emitted component does, so call contracts can be checked
//! without building C++.

mod sink;

pub use sink::{CommandResponse, RecordingSink, Sink, SinkCall, TracingSink};

use crate::ast::Value;
use crate::compiler::ActivityLibrary;
use crate::error::RuntimeError;
use crate::interpreter::{Interpreter, evaluate};
use crate::model::CommandKind;
use crate::synth::{ComponentStateMachine, LifecycleStep, StepName};
use ahash::AHashMap;
use tracing::{debug, error};

pub struct StateMachineRuntime<'a, S: Sink> {
    machine: &'a ComponentStateMachine,
    library: Option<&'a ActivityLibrary>,
    sink: S,
    current: u32,
    active: bool,
    attributes: AHashMap<String, Value>,
    invoked: Vec<String>,
}

impl<'a, S: Sink> StateMachineRuntime<'a, S> {
    /// A stopped instance sitting in the initial state, attributes zeroed.
    pub fn new(machine: &'a ComponentStateMachine, sink: S) -> Self {
        let attributes = machine
            .attributes
            .iter()
            .map(|a| (a.ident.clone(), a.scalar.zero()))
            .collect();
        Self {
            machine,
            library: None,
            sink,
            current: machine.states[machine.initial].value,
            active: false,
            attributes,
            invoked: Vec::new(),
        }
    }

    /// Executes state activities through the interpreter instead of only recording them.
    pub fn with_library(mut self, library: &'a ActivityLibrary) -> Self {
        self.library = Some(library);
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn current_value(&self) -> u32 {
        self.current
    }

    /// Sanitized name of the current state, `None` when the value is corrupt.
    pub fn current_state(&self) -> Option<&str> {
        self.machine
            .state_by_value(self.current)
            .map(|s| self.machine.state_name(s))
    }

    /// Qualified names of the state activities run so far, in call order.
    pub fn invoked(&self) -> &[String] {
        &self.invoked
    }

    /// Returns false when the component has no such attribute.
    pub fn set_attribute(&mut self, ident: &str, value: Value) -> bool {
        match self.attributes.get_mut(ident) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn attribute(&self, ident: &str) -> Option<Value> {
        self.attributes.get(ident).copied()
    }

    /// Overwrites the recorded state value without any side effect.
    pub fn force_state(&mut self, value: u32) {
        self.current = value;
    }

    pub fn start(&mut self) {
        let machine = self.machine;
        self.run_lifecycle(&machine.start);
    }

    pub fn stop(&mut self) {
        let machine = self.machine;
        self.run_lifecycle(&machine.stop);
    }

    fn run_lifecycle(&mut self, steps: &[LifecycleStep]) {
        for step in steps {
            match *step {
                LifecycleStep::SetCurrent(state) => self.current = self.machine.states[state].value,
                LifecycleStep::SetActive(active) => self.active = active,
                LifecycleStep::Log { from, to } => {
                    let from = self.step_name(from);
                    let to = self.step_name(to);
                    self.sink.log_transition(from, to);
                }
                LifecycleStep::Telemetry(state) => {
                    let name = self.machine.state_name(state);
                    self.sink.telemetry_current_state(name);
                }
            }
        }
    }

    fn step_name(&self, name: StepName) -> &'a str {
        match name {
            StepName::Marker(marker) => marker,
            StepName::State(state) => self.machine.state_name(state),
        }
    }

    /// Handles a command the way the emitted handler does: lifecycle commands always
    /// respond OK, trigger commands respond `ExecutionError` while stopped.
    pub fn command(&mut self, mnemonic: &str, opcode: u32, sequence: u32) -> Result<(), RuntimeError> {
        let machine = self.machine;
        let command = machine
            .command(mnemonic)
            .ok_or_else(|| RuntimeError::UnknownCommand {
                component: machine.component.clone(),
                command: mnemonic.to_string(),
            })?;

        let response = match command.kind {
            CommandKind::Start => {
                self.start();
                CommandResponse::Ok
            }
            CommandKind::Stop => {
                self.stop();
                CommandResponse::Ok
            }
            CommandKind::Trigger(_) if !self.active => CommandResponse::ExecutionError,
            CommandKind::Trigger(_) => {
                let state = self.current_state_id()?;
                if let Some((_, transitions)) = command.arms.iter().find(|(s, _)| *s == state) {
                    self.fire_first(transitions)?;
                }
                CommandResponse::Ok
            }
        };
        self.sink.command_response(opcode, sequence, response);
        Ok(())
    }

    /// One scheduler tick. A no-op while stopped.
    pub fn tick(&mut self) -> Result<(), RuntimeError> {
        if !self.active {
            return Ok(());
        }
        let machine = self.machine;
        let state = self.current_state_id()?;
        let arm = &machine.dispatch.arms[state];

        for activity in &arm.activities {
            debug!(component = %machine.component, activity = %activity.qualified, "run state activity");
            if let Some(library) = self.library {
                Interpreter::new(library).run(&activity.qualified, Vec::new())?;
            }
            self.invoked.push(activity.qualified.clone());
        }

        self.fire_first(&arm.transitions)?;
        Ok(())
    }

    fn current_state_id(&self) -> Result<usize, RuntimeError> {
        self.machine.state_by_value(self.current).ok_or_else(|| {
            error!(component = %self.machine.component, value = self.current, "unreachable state");
            RuntimeError::UnreachableState {
                component: self.machine.component.clone(),
                value: self.current,
            }
        })
    }

    /// Fires the first transition in `candidates` whose guard permits it.
    fn fire_first(&mut self, candidates: &[usize]) -> Result<(), RuntimeError> {
        for &index in candidates {
            if self.permits(index)? {
                self.transition(index);
                return Ok(());
            }
        }
        Ok(())
    }

    fn permits(&self, transition: usize) -> Result<bool, RuntimeError> {
        let Some(guard) = self.machine.transitions[transition].guard else {
            return Ok(true);
        };
        let expression = &self.machine.guards[guard].expression;
        let value = evaluate(expression, &|name| self.attributes.get(name).copied())?;
        Ok(matches!(value, Value::Bool(true)))
    }

    fn transition(&mut self, index: usize) {
        let machine = self.machine;
        let transition = &machine.transitions[index];
        if transition.source == transition.target {
            return;
        }
        let from = machine.state_name(transition.source);
        let to = machine.state_name(transition.target);
        self.sink.log_transition(from, to);
        self.sink.telemetry_current_state(to);
        self.current = machine.states[transition.target].value;
    }
}
