//! Tests for the reference state machine runtime and its sink contract.
mod common;
use common::*;
use katachi::prelude::*;
use katachi::runtime::{CommandResponse, SinkCall};
use proptest::prelude::*;

fn log(from: &str, to: &str) -> SinkCall {
    SinkCall::Log {
        from: from.to_string(),
        to: to.to_string(),
    }
}

fn telemetry(state: &str) -> SinkCall {
    SinkCall::Telemetry(state.to_string())
}

fn response(opcode: u32, sequence: u32, response: CommandResponse) -> SinkCall {
    SinkCall::CommandResponse {
        opcode,
        sequence,
        response,
    }
}

#[test]
fn test_start_logs_then_reports_initial_state() {
    let model = toggle_model();
    let machine = synthesize(&model.components[0]);
    let mut runtime = StateMachineRuntime::new(&machine, RecordingSink::new());
    assert!(!runtime.is_active());

    runtime.start();
    assert!(runtime.is_active());
    assert_eq!(runtime.current_state(), Some("OFF"));
    assert_eq!(runtime.sink().calls, vec![log("INIT", "OFF"), telemetry("OFF")]);
}

#[test]
fn test_stop_logs_without_telemetry() {
    let model = toggle_model();
    let machine = synthesize(&model.components[0]);
    let mut runtime = StateMachineRuntime::new(&machine, RecordingSink::new());
    runtime.start();
    runtime.sink_mut().take();

    runtime.command("STOP_STATE_MACHINE", 1, 7).unwrap();
    assert!(!runtime.is_active());
    assert_eq!(
        runtime.sink().calls,
        vec![log("ACTIVE", "STOPPED"), response(1, 7, CommandResponse::Ok)]
    );
    assert_eq!(runtime.sink().telemetry_count(), 0);
}

#[test]
fn test_trigger_while_stopped_is_rejected() {
    let model = toggle_model();
    let machine = synthesize(&model.components[0]);
    let mut runtime = StateMachineRuntime::new(&machine, RecordingSink::new());

    runtime.command("TURN_ON", 2, 3).unwrap();
    assert_eq!(
        runtime.sink().calls,
        vec![response(2, 3, CommandResponse::ExecutionError)]
    );
    assert_eq!(runtime.current_state(), Some("OFF"));
}

#[test]
fn test_trigger_fires_transition_before_response() {
    let model = toggle_model();
    let machine = synthesize(&model.components[0]);
    let mut runtime = StateMachineRuntime::new(&machine, RecordingSink::new());
    runtime.start();
    runtime.sink_mut().take();

    runtime.command("TURN_ON", 2, 4).unwrap();
    assert_eq!(runtime.current_state(), Some("ON"));
    assert_eq!(
        runtime.sink().calls,
        vec![
            log("OFF", "ON"),
            telemetry("ON"),
            response(2, 4, CommandResponse::Ok)
        ]
    );

    // No transition from ON carries the signal: the command still succeeds.
    runtime.sink_mut().take();
    runtime.command("TURN_ON", 2, 5).unwrap();
    assert_eq!(runtime.sink().calls, vec![response(2, 5, CommandResponse::Ok)]);
}

#[test]
fn test_denying_guard_has_no_side_effects() {
    let model = toggle_model();
    let machine = synthesize(&model.components[0]);
    let mut runtime = StateMachineRuntime::new(&machine, RecordingSink::new());
    runtime.start();
    runtime.command("TURN_ON", 2, 1).unwrap();
    assert!(runtime.set_attribute("enabled", Value::Bool(true)));
    runtime.sink_mut().take();

    runtime.tick().unwrap();
    assert_eq!(runtime.current_state(), Some("ON"));
    assert!(runtime.sink().calls.is_empty());

    runtime.set_attribute("enabled", Value::Bool(false));
    runtime.tick().unwrap();
    assert_eq!(runtime.current_state(), Some("OFF"));
    assert_eq!(runtime.sink().calls, vec![log("ON", "OFF"), telemetry("OFF")]);
}

#[test]
fn test_self_transition_is_silent() {
    let model = model_of(vec![component(
        "Beacon",
        vec![state("IDLE", &[])],
        vec![transition("IDLE", "IDLE", None, None)],
        vec![],
    )]);
    let machine = synthesize(&model.components[0]);
    let mut runtime = StateMachineRuntime::new(&machine, RecordingSink::new());
    runtime.start();
    runtime.sink_mut().take();

    runtime.tick().unwrap();
    assert!(runtime.sink().calls.is_empty());
    assert_eq!(runtime.current_state(), Some("IDLE"));
}

#[test]
fn test_tick_while_stopped_does_nothing() {
    let model = slew_model();
    let machine = synthesize(&model.components[0]);
    let mut runtime = StateMachineRuntime::new(&machine, RecordingSink::new());

    runtime.tick().unwrap();
    assert!(runtime.invoked().is_empty());
    assert!(runtime.sink().calls.is_empty());
}

#[test]
fn test_corrupt_state_value_is_fatal() {
    let model = toggle_model();
    let machine = synthesize(&model.components[0]);
    let mut runtime = StateMachineRuntime::new(&machine, RecordingSink::new());
    runtime.start();
    runtime.force_state(99);

    assert_eq!(runtime.current_state(), None);
    let err = runtime.tick().unwrap_err();
    assert_eq!(
        err,
        RuntimeError::UnreachableState {
            component: "Toggle_Switch".to_string(),
            value: 99,
        }
    );
    assert!(runtime.command("TURN_ON", 2, 1).is_err());
}

#[test]
fn test_unknown_command_is_an_error() {
    let model = toggle_model();
    let machine = synthesize(&model.components[0]);
    let mut runtime = StateMachineRuntime::new(&machine, RecordingSink::new());
    let err = runtime.command("SELF_DESTRUCT", 9, 9).unwrap_err();
    assert!(matches!(err, RuntimeError::UnknownCommand { .. }));
    assert!(runtime.sink().calls.is_empty());
}

#[test]
fn test_slew_use_case_runs_activities_through_interpreter() {
    let model = slew_model();
    let mut compiler = ActivityCompiler::new(&model);
    for name in ["Hold Attitude", "Slew For Optical Comm"] {
        compiler.compile_by_name("SlewUseCaseBlock", name).unwrap();
    }
    let library = compiler.library();
    let machine = synthesize(&model.components[0]);
    let mut runtime = StateMachineRuntime::new(&machine, RecordingSink::new()).with_library(&library);

    runtime.start();
    runtime.tick().unwrap();
    assert_eq!(runtime.invoked(), ["SlewUseCaseBlock::Hold_Attitude"]);

    runtime.command("BEGIN_SLEW", 2, 1).unwrap();
    assert_eq!(runtime.current_state(), Some("SLEWING"));

    // Slewing stays put while enabled.
    runtime.set_attribute("slewEnabled", Value::Bool(true));
    runtime.tick().unwrap();
    assert_eq!(runtime.current_state(), Some("SLEWING"));

    runtime.set_attribute("slewEnabled", Value::Bool(false));
    runtime.tick().unwrap();
    assert_eq!(runtime.current_state(), Some("IDLE"));
    assert_eq!(
        runtime.invoked(),
        [
            "SlewUseCaseBlock::Hold_Attitude",
            "SlewUseCaseBlock::Slew_For_Optical_Comm",
            "SlewUseCaseBlock::Slew_For_Optical_Comm"
        ]
    );

    let transitions: Vec<SinkCall> = runtime
        .into_sink()
        .calls
        .into_iter()
        .filter(|c| matches!(c, SinkCall::Log { .. }))
        .collect();
    assert_eq!(
        transitions,
        vec![
            log("INIT", "IDLE"),
            log("IDLE", "SLEWING"),
            log("SLEWING", "IDLE")
        ]
    );
}

#[test]
fn test_tracing_sink_accepts_every_call() {
    let model = toggle_model();
    let machine = synthesize(&model.components[0]);
    let mut runtime = StateMachineRuntime::new(&machine, TracingSink::new("Toggle Switch"));
    runtime.start();
    runtime.command("TURN_ON", 2, 1).unwrap();
    runtime.tick().unwrap();
    assert_eq!(runtime.current_state(), Some("OFF"));
}

proptest! {
    #[test]
    fn unguarded_transition_logs_once_then_reports(
        count in 1usize..6,
        source_seed in 0usize..6,
        target_seed in 0usize..6,
        triggered in any::<bool>(),
    ) {
        let (source, target) = (source_seed % count, target_seed % count);
        let states = (0..count).map(|i| state(&format!("S{}", i), &[])).collect();
        let signal = triggered.then_some("go");
        let model = model_of(vec![component(
            "Arbitrary",
            states,
            vec![transition(&format!("S{}", source), &format!("S{}", target), None, signal)],
            vec![],
        )]);
        let machine = synthesize(&model.components[0]);
        let mut runtime = StateMachineRuntime::new(&machine, RecordingSink::new());
        runtime.start();
        runtime.force_state(source as u32);
        runtime.sink_mut().take();

        let mut expected = Vec::new();
        if source != target {
            expected.push(log(&format!("S{}", source), &format!("S{}", target)));
            expected.push(telemetry(&format!("S{}", target)));
        }
        if triggered {
            runtime.command("GO", 2, 1).unwrap();
            expected.push(response(2, 1, CommandResponse::Ok));
        } else {
            runtime.tick().unwrap();
        }

        prop_assert_eq!(&runtime.sink().calls, &expected);
        let target_name = format!("S{}", target);
        prop_assert_eq!(runtime.current_state(), Some(target_name.as_str()));
    }
}
