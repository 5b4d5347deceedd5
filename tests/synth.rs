//! Tests for state machine synthesis.
mod common;
use common::*;
use katachi::model::CommandKind;
use katachi::prelude::*;
use katachi::synth::{DispatchDefault, INIT_MARKER, LifecycleStep, StepName};
use proptest::prelude::*;

/// A machine over states `S0..Sn` with arbitrary, possibly triggered transitions.
fn arbitrary_machine() -> impl Strategy<Value = ModelDefinition> {
    (1usize..8)
        .prop_flat_map(|count| {
            let edge = (0..count, 0..count, proptest::option::of(0usize..3));
            (Just(count), proptest::collection::vec(edge, 0..12))
        })
        .prop_map(|(count, transitions)| {
            let states = (0..count).map(|i| state(&format!("S{}", i), &[])).collect();
            let transitions = transitions
                .into_iter()
                .map(|(source, target, signal)| {
                    let signal = signal.map(|s| format!("signal {}", s));
                    transition(
                        &format!("S{}", source),
                        &format!("S{}", target),
                        None,
                        signal.as_deref(),
                    )
                })
                .collect();
            ModelDefinition {
                components: vec![component("Arbitrary", states, transitions, vec![])],
                record_types: vec![],
            }
        })
}

proptest! {
    #[test]
    fn every_state_has_one_case_plus_a_fatal_default(definition in arbitrary_machine()) {
        let count = definition.components[0].state_machine.states.len();
        let model = Model::build(definition).unwrap();
        let machine = synthesize(&model.components[0]);

        prop_assert_eq!(machine.dispatch.arms.len(), count);
        prop_assert_eq!(machine.dispatch.case_count(), count + 1);
        prop_assert_eq!(machine.dispatch.default, DispatchDefault::Fatal);
        for (value, arm) in machine.dispatch.arms.iter().enumerate() {
            prop_assert_eq!(arm.state, value);
            prop_assert_eq!(machine.states[value].value as usize, value);
        }

        let library = ActivityCompiler::new(&model).library();
        let artifacts = Emitter::new(BindingProfile::Production)
            .emit(&machine, &library, &[])
            .unwrap();
        let cpp = &artifacts.implementation.text;
        let start = cpp.find("::processStateMachine()").unwrap();
        let end = cpp[start..].find("_cmdHandler(").unwrap() + start;
        let dispatcher = &cpp[start..end];
        prop_assert_eq!(dispatcher.matches("case STATE_").count(), count);
        prop_assert_eq!(dispatcher.matches("default:").count(), 1);
    }
}

#[test]
fn test_states_enumerate_in_declaration_order() {
    let model = slew_model();
    let machine = synthesize(&model.components[0]);

    let constants: Vec<(&str, u32)> = machine
        .states
        .iter()
        .map(|s| (s.constant.as_str(), s.value))
        .collect();
    assert_eq!(constants, vec![("STATE_IDLE", 0), ("STATE_SLEWING", 1)]);
    assert_eq!(machine.initial, 0);
    assert_eq!(machine.dispatch.case_count(), machine.states.len() + 1);
}

#[test]
fn test_dispatch_arms_hold_untriggered_transitions_only() {
    let model = slew_model();
    let machine = synthesize(&model.components[0]);

    let idle = &machine.dispatch.arms[0];
    assert!(idle.transitions.is_empty());
    assert_eq!(idle.activities[0].qualified, "SlewUseCaseBlock::Hold_Attitude");

    let slewing = &machine.dispatch.arms[1];
    assert_eq!(slewing.transitions, vec![1]);
    assert_eq!(machine.transitions[1].guard, Some(0));
    assert_eq!(machine.guards[0].method, "guard_0");
    assert_eq!(machine.guards[0].source, "!slewEnabled");
}

#[test]
fn test_trigger_commands_follow_lifecycle_commands() {
    let model = slew_model();
    let machine = synthesize(&model.components[0]);

    let mnemonics: Vec<&str> = machine.commands.iter().map(|c| c.mnemonic.as_str()).collect();
    assert_eq!(
        mnemonics,
        vec!["START_STATE_MACHINE", "STOP_STATE_MACHINE", "BEGIN_SLEW", "ABORT"]
    );

    let begin = machine.command("BEGIN_SLEW").unwrap();
    assert_eq!(begin.kind, CommandKind::Trigger("begin slew".to_string()));
    assert_eq!(begin.handler, "BEGIN_SLEW_cmdHandler");
    assert_eq!(begin.arms, vec![(0, vec![0])]);

    let abort = machine.command("ABORT").unwrap();
    assert_eq!(abort.arms, vec![(1, vec![2])]);
}

#[test]
fn test_start_sequence_logs_then_reports() {
    let model = toggle_model();
    let machine = synthesize(&model.components[0]);
    assert_eq!(
        machine.start,
        vec![
            LifecycleStep::SetCurrent(0),
            LifecycleStep::SetActive(true),
            LifecycleStep::Log {
                from: StepName::Marker(INIT_MARKER),
                to: StepName::State(0),
            },
            LifecycleStep::Telemetry(0),
        ]
    );
    assert!(
        !machine
            .stop
            .iter()
            .any(|s| matches!(s, LifecycleStep::Telemetry(_)))
    );
}

#[test]
fn test_guards_are_numbered_in_declaration_order() {
    let mut definition = create_toggle_definition();
    let toggle = &mut definition.components[0];
    toggle.attributes.push(bool_attribute("locked"));
    toggle
        .state_machine
        .transitions
        .push(transition("OFF", "ON", Some("!locked"), None));
    let model = Model::build(definition).unwrap();
    let machine = synthesize(&model.components[0]);

    let methods: Vec<(&str, &str)> = machine
        .guards
        .iter()
        .map(|g| (g.method.as_str(), g.source.as_str()))
        .collect();
    assert_eq!(methods, vec![("guard_0", "!enabled"), ("guard_1", "!locked")]);
    assert_eq!(machine.referenced_activities(), Vec::<String>::new());
}

#[test]
fn test_non_boolean_guard_is_rejected() {
    let mut definition = create_toggle_definition();
    definition.components[0]
        .state_machine
        .transitions
        .push(transition("OFF", "ON", Some("enabled + 1"), None));
    let err = Model::build(definition).unwrap_err();
    assert!(matches!(err, ModelError::InvalidExpression { .. }));
}

#[test]
fn test_guard_on_unknown_attribute_is_rejected() {
    let mut definition = create_toggle_definition();
    definition.components[0]
        .state_machine
        .transitions
        .push(transition("OFF", "ON", Some("armed"), None));
    let err = Model::build(definition).unwrap_err();
    assert!(matches!(
        err,
        ModelError::UnresolvedReference { kind: "attribute", ref reference, .. } if reference == "armed"
    ));
}
