use std::fmt;
use tracing::info;

/// The standard response code a command handler yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResponse {
    Ok,
    ExecutionError,
}

impl fmt::Display for CommandResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandResponse::Ok => write!(f, "OK"),
            CommandResponse::ExecutionError => write!(f, "EXECUTION_ERROR"),
        }
    }
}

/// Every observable side effect of a component goes through a sink: the state
/// transition event, the current-state telemetry channel and command responses.
pub trait Sink {
    fn log_transition(&mut self, from: &str, to: &str);
    fn telemetry_current_state(&mut self, state: &str);
    fn command_response(&mut self, opcode: u32, sequence: u32, response: CommandResponse);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    Log { from: String, to: String },
    Telemetry(String),
    CommandResponse {
        opcode: u32,
        sequence: u32,
        response: CommandResponse,
    },
}

/// Records every call in order; used to check call contracts.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub calls: Vec<SinkCall>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains the recorded calls.
    pub fn take(&mut self) -> Vec<SinkCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn telemetry_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, SinkCall::Telemetry(_)))
            .count()
    }
}

impl Sink for RecordingSink {
    fn log_transition(&mut self, from: &str, to: &str) {
        self.calls.push(SinkCall::Log {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    fn telemetry_current_state(&mut self, state: &str) {
        self.calls.push(SinkCall::Telemetry(state.to_string()));
    }

    fn command_response(&mut self, opcode: u32, sequence: u32, response: CommandResponse) {
        self.calls.push(SinkCall::CommandResponse {
            opcode,
            sequence,
            response,
        });
    }
}

/// Routes side effects to `tracing` under the component's name.
#[derive(Debug, Clone)]
pub struct TracingSink {
    component: String,
}

impl TracingSink {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }
}

impl Sink for TracingSink {
    fn log_transition(&mut self, from: &str, to: &str) {
        info!(component = %self.component, from, to, "StateTransition");
    }

    fn telemetry_current_state(&mut self, state: &str) {
        info!(component = %self.component, state, "CurrentState");
    }

    fn command_response(&mut self, opcode: u32, sequence: u32, response: CommandResponse) {
        info!(component = %self.component, opcode, sequence, %response, "command response");
    }
}
