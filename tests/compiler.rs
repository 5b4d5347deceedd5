//! Tests for the activity flow compiler and the reference interpreter.
mod common;
use common::*;
use katachi::compiler::Statement;
use katachi::error::ModelError;
use katachi::prelude::*;
use proptest::prelude::*;

fn slew_record(design: f64, rate: f64, step: f64) -> Datum {
    let model = slew_model();
    let record = RecordValue::from_type(&model.record_types[0])
        .with("DesignT2D", Value::Number(design))
        .with("slewRate", Value::Number(rate))
        .with("timeStep", Value::Number(step));
    Datum::Record(record)
}

#[test]
fn test_decrement_t2d_computes_slew() {
    let model = slew_model();
    let mut compiler = ActivityCompiler::new(&model);
    let compiled = compiler
        .compile_by_name("SlewUseCaseBlock", "Decrement T2D")
        .expect("Failed to compile Decrement T2D");
    assert_eq!(compiled.qualified, "SlewUseCaseBlock::Decrement_T2D");
    assert_eq!(compiled.inputs.len(), 1);
    assert_eq!(compiled.outputs.len(), 1);

    let library = compiler.library();
    let outputs = Interpreter::new(&library)
        .run(&compiled.qualified, vec![slew_record(100.0, 2.0, 5.0)])
        .expect("Interpretation failed");

    let result = outputs[0].as_record().expect("Expected a record output");
    assert_eq!(result.get("timeStep"), Some(Value::Number(6.0)));
    assert_eq!(result.get("aoa"), Some(Value::Number(12.0)));
    assert_eq!(result.get("slewRate"), Some(Value::Number(2.0)));
    match result.get("T2D") {
        Some(Value::Number(t2d)) => assert!((t2d - 68.0).abs() < 1e-9, "T2D was {}", t2d),
        other => panic!("Unexpected T2D value {:?}", other),
    }
}

#[test]
fn test_reads_precede_body_and_writes_follow() {
    let model = slew_model();
    let mut compiler = ActivityCompiler::new(&model);
    let compiled = compiler
        .compile_by_name("SlewUseCaseBlock", "Decrement T2D")
        .unwrap();

    let position = |id: &str| compiled.position_of(id).expect(id);
    assert_eq!(position("in_data"), 0);
    for read in ["read_design", "read_rate", "read_step"] {
        assert!(position(read) < position("compute"));
    }
    for write in ["write_step", "write_aoa", "write_t2d"] {
        assert!(position("compute") < position(write));
        assert!(position("new_data") < position(write));
        assert!(position(write) < position("out_data"));
    }
    assert_eq!(position("out_data"), compiled.statements.len() - 1);
}

#[test]
fn test_fork_branches_run_before_call() {
    let model = slew_model();
    let mut compiler = ActivityCompiler::new(&model);
    let compiled = compiler
        .compile_by_name("SlewUseCaseBlock", "Slew For Optical Comm")
        .unwrap();

    let order = compiled.order();
    let position = |id: &str| order.iter().position(|n| *n == id).expect(id);
    assert!(position("seed") < position("fork"));
    for branch in ["seed_design", "seed_rate", "seed_step"] {
        assert!(position("fork") < position(branch));
        assert!(position(branch) < position("join"));
    }
    assert!(position("join") < position("decrement"));
    assert!(
        compiled
            .calls
            .contains("SlewUseCaseBlock::Decrement_T2D")
    );
}

#[test]
fn test_shared_activity_compiles_once() {
    let model = slew_model();
    let mut compiler = ActivityCompiler::new(&model);
    compiler
        .compile_by_name("SlewUseCaseBlock", "Slew For Optical Comm")
        .unwrap();
    compiler
        .compile_by_name("SlewUseCaseBlock", "Hold Attitude")
        .unwrap();
    assert_eq!(compiler.compile_count(), 3);

    compiler
        .compile_by_name("SlewUseCaseBlock", "Decrement T2D")
        .unwrap();
    assert_eq!(compiler.compile_count(), 3);
    assert_eq!(compiler.library().len(), 3);
}

#[test]
fn test_compilation_is_deterministic() {
    let model = slew_model();
    let mut first = ActivityCompiler::new(&model);
    let mut second = ActivityCompiler::new(&model);
    for name in ["Slew For Optical Comm", "Hold Attitude", "Decrement T2D"] {
        let a = first.compile_by_name("SlewUseCaseBlock", name).unwrap();
        let b = second.compile_by_name("SlewUseCaseBlock", name).unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn test_state_activity_runs_callee() {
    let model = slew_model();
    let mut compiler = ActivityCompiler::new(&model);
    let compiled = compiler
        .compile_by_name("SlewUseCaseBlock", "Slew For Optical Comm")
        .unwrap();
    assert!(compiled.outputs.is_empty());

    let library = compiler.library();
    let outputs = Interpreter::new(&library)
        .run(&compiled.qualified, vec![])
        .expect("Interpretation failed");
    assert!(outputs.is_empty());
}

#[test]
fn test_unsupported_language_names_the_activity() {
    let model = model_of(vec![create_unsupported_component("Pump")]);
    let mut compiler = ActivityCompiler::new(&model);

    let err = compiler.compile_by_name("Pump", "Main").unwrap_err();
    match &err {
        CompileError::DependencyFailed {
            activity,
            dependency,
            ..
        } => {
            assert_eq!(activity, "Pump::Main");
            assert_eq!(dependency, "Pump::Calc");
        }
        other => panic!("Expected a dependency failure, got {:?}", other),
    }
    match err.root_cause() {
        CompileError::UnsupportedLanguage(UnsupportedLanguageError {
            activity,
            node,
            language,
        }) => {
            assert_eq!(activity, "Pump::Calc");
            assert_eq!(node, "script");
            assert_eq!(language, "python");
        }
        other => panic!("Expected an unsupported language error, got {:?}", other),
    }

    // The cached failure is reported again without recompiling.
    let count = compiler.compile_count();
    assert!(compiler.compile_by_name("Pump", "Calc").is_err());
    assert_eq!(compiler.compile_count(), count);
}

#[test]
fn test_write_forced_before_create_is_rejected() {
    let mut body = activity(
        "Reset",
        vec![
            node(
                "obj",
                NodeKindDefinition::CreateObject {
                    record_type: "Sample".to_string(),
                },
            ),
            literal("zero", 0.0),
            node(
                "store",
                NodeKindDefinition::AddStructuralFeatureValue {
                    object: value_ref("obj"),
                    attribute: "rate".to_string(),
                    value: value_ref("zero"),
                },
            ),
        ],
    );
    body.edges.push(EdgeDefinition {
        source: "store".to_string(),
        target: "obj".to_string(),
    });
    let definition = ModelDefinition {
        components: vec![create_single_activity_component("Sampler", body)],
        record_types: vec![RecordTypeDefinition {
            name: "Sample".to_string(),
            fields: vec![katachi::model::FieldDefinition {
                name: "rate".to_string(),
                scalar: ScalarType::Float,
            }],
        }],
    };
    let model = Model::build(definition).unwrap();

    let err = ActivityCompiler::new(&model)
        .compile_by_name("Sampler", "Reset")
        .unwrap_err();
    assert!(matches!(
        err,
        CompileError::Model(ModelError::DependencyOrderViolation { ref object, .. }) if object == "obj"
    ));
}

#[test]
fn test_cyclic_data_flow_is_rejected() {
    let body = activity(
        "Loop",
        vec![
            opaque("a", "y = x + 1", &[("x", "b.y")], &["y"]),
            opaque("b", "y = x + 1", &[("x", "a.y")], &["y"]),
        ],
    );
    let model = model_of(vec![create_single_activity_component("Looper", body)]);

    let err = ActivityCompiler::new(&model)
        .compile_by_name("Looper", "Loop")
        .unwrap_err();
    match err {
        CompileError::Model(ModelError::CyclicDependency { nodes, .. }) => {
            assert_eq!(nodes, vec!["a", "b"]);
        }
        other => panic!("Expected a cyclic dependency, got {:?}", other),
    }
}

#[test]
fn test_recursive_activities_are_rejected() {
    let model = model_of(vec![component(
        "Echo",
        vec![state("RUN", &["Ping"])],
        vec![],
        vec![
            activity("Ping", vec![call("to_pong", "Pong", &[])]),
            activity("Pong", vec![call("to_ping", "Ping", &[])]),
        ],
    )]);

    let err = ActivityCompiler::new(&model)
        .compile_by_name("Echo", "Ping")
        .unwrap_err();
    match err.root_cause() {
        CompileError::Model(ModelError::RecursiveActivity { chain, .. }) => {
            assert_eq!(chain, &vec!["Echo::Ping", "Echo::Pong", "Echo::Ping"]);
        }
        other => panic!("Expected a recursion error, got {:?}", other),
    }
}

#[test]
fn test_opaque_outputs_are_exported_to_outer_variables() {
    let body = activity(
        "Scale",
        vec![
            literal("gain", 3.0),
            opaque("mul", "y = x * 2", &[("x", "gain")], &["y"]),
            output("result", "scaled", "Real", "mul.y"),
        ],
    );
    let model = model_of(vec![create_single_activity_component("Scaler", body)]);
    let mut compiler = ActivityCompiler::new(&model);
    let compiled = compiler.compile_by_name("Scaler", "Scale").unwrap();

    let exports = compiled
        .statements
        .iter()
        .find_map(|s| match s {
            Statement::Opaque { exports, .. } => Some(exports.clone()),
            _ => None,
        })
        .expect("Expected an opaque statement");
    assert_eq!(exports.len(), 1);
    assert_eq!(exports[0].0, "mul_y");
    assert_eq!(exports[0].1, "y");

    let library = compiler.library();
    let outputs = Interpreter::new(&library).run("Scaler::Scale", vec![]).unwrap();
    assert_eq!(outputs, vec![Datum::Scalar(Value::Number(6.0))]);
}

fn counter_definition(body: ActivityDefinition) -> ModelDefinition {
    let field = |name: &str| katachi::model::FieldDefinition {
        name: name.to_string(),
        scalar: ScalarType::Float,
    };
    ModelDefinition {
        components: vec![create_single_activity_component("Tally", body)],
        record_types: vec![RecordTypeDefinition {
            name: "Counter".to_string(),
            fields: vec![field("n"), field("m")],
        }],
    }
}

fn create_counter(id: &str) -> NodeDefinition {
    node(
        id,
        NodeKindDefinition::CreateObject {
            record_type: "Counter".to_string(),
        },
    )
}

fn read_field(id: &str, attribute: &str) -> NodeDefinition {
    node(
        id,
        NodeKindDefinition::ReadStructuralFeature {
            object: value_ref("obj"),
            attribute: attribute.to_string(),
        },
    )
}

fn write_field(id: &str, attribute: &str, from: &str) -> NodeDefinition {
    node(
        id,
        NodeKindDefinition::AddStructuralFeatureValue {
            object: value_ref("obj"),
            attribute: attribute.to_string(),
            value: value_ref(from),
        },
    )
}

#[test]
fn test_parallel_read_modify_write_branches_are_serialized() {
    let body = activity(
        "Count",
        vec![
            create_counter("obj"),
            node(
                "fork",
                NodeKindDefinition::Fork {
                    branches: vec!["r1".to_string(), "r2".to_string()],
                },
            ),
            read_field("r1", "n"),
            opaque("inc1", "y = x + 1", &[("x", "r1")], &["y"]),
            write_field("w1", "n", "inc1.y"),
            read_field("r2", "n"),
            opaque("inc2", "y = x + 1", &[("x", "r2")], &["y"]),
            write_field("w2", "n", "inc2.y"),
            output("out", "counter", "Counter", "obj"),
        ],
    );
    let model = Model::build(counter_definition(body)).unwrap();
    let mut compiler = ActivityCompiler::new(&model);
    let compiled = compiler
        .compile_by_name("Tally", "Count")
        .expect("Parallel branches should compile");

    assert_eq!(
        compiled.order(),
        vec!["obj", "fork", "r1", "inc1", "w1", "r2", "inc2", "w2", "out"]
    );

    let library = compiler.library();
    let outputs = Interpreter::new(&library).run("Tally::Count", vec![]).unwrap();
    let counter = outputs[0].as_record().expect("Expected a record output");
    assert_eq!(counter.get("n"), Some(Value::Number(2.0)));
}

/// One step of an arbitrary straight-line activity over a `Counter` object.
#[derive(Debug, Clone)]
enum Step {
    Read(&'static str),
    Write(&'static str, f64),
    Scale(usize),
}

fn arbitrary_steps() -> impl Strategy<Value = Vec<Step>> {
    let attribute = proptest::sample::select(vec!["n", "m"]);
    let step = prop_oneof![
        attribute.clone().prop_map(Step::Read),
        (attribute, -50i32..50).prop_map(|(a, v)| Step::Write(a, v as f64)),
        (0usize..16).prop_map(Step::Scale),
    ];
    proptest::collection::vec(step, 1..14)
}

/// Builds the activity declared by `steps`: every write takes its value from its own
/// literal, every opaque step scales an earlier literal or read.
fn steps_activity(steps: &[Step]) -> ActivityDefinition {
    let mut nodes = vec![create_counter("obj"), literal("base", 1.0)];
    let mut values = vec!["base".to_string()];
    for (i, step) in steps.iter().enumerate() {
        match step {
            Step::Read(attribute) => {
                let id = format!("read{}", i);
                nodes.push(read_field(&id, attribute));
                values.push(id);
            }
            Step::Write(attribute, value) => {
                let source = format!("lit{}", i);
                nodes.push(literal(&source, *value));
                nodes.push(write_field(&format!("write{}", i), attribute, &source));
            }
            Step::Scale(pick) => {
                let from = values[pick % values.len()].clone();
                nodes.push(opaque(&format!("scale{}", i), "y = x * 2", &[("x", &from)], &["y"]));
            }
        }
    }
    nodes.push(output("out", "counter", "Counter", "obj"));
    activity("Count", nodes)
}

proptest! {
    #[test]
    fn compilation_and_emission_are_repeatable(steps in arbitrary_steps()) {
        let model = Model::build(counter_definition(steps_activity(&steps))).unwrap();
        let mut first = ActivityCompiler::new(&model);
        let mut second = ActivityCompiler::new(&model);
        let a = first.compile_by_name("Tally", "Count").unwrap();
        let b = second.compile_by_name("Tally", "Count").unwrap();
        prop_assert_eq!(&a, &b);

        let machine = synthesize(&model.components[0]);
        let records: Vec<katachi::emitter::RecordLayout> = model
            .record_types
            .iter()
            .map(katachi::emitter::RecordLayout::from)
            .collect();
        let emitter = Emitter::new(BindingProfile::Mock);
        let first_text = emitter.emit(&machine, &first.library(), &records).unwrap();
        let second_text = emitter.emit(&machine, &second.library(), &records).unwrap();
        prop_assert_eq!(first_text, second_text);
    }

    #[test]
    fn every_read_follows_the_writes_it_observes(steps in arbitrary_steps()) {
        let model = Model::build(counter_definition(steps_activity(&steps))).unwrap();
        let mut compiler = ActivityCompiler::new(&model);
        let compiled = compiler.compile_by_name("Tally", "Count").unwrap();
        let position = |id: &str| compiled.position_of(id).unwrap();

        for (i, step) in steps.iter().enumerate() {
            let Step::Read(read_attribute) = step else { continue };
            let read = position(format!("read{}", i).as_str());
            prop_assert!(position("obj") < read);
            for (j, other) in steps.iter().enumerate() {
                if let Step::Write(write_attribute, _) = other {
                    if write_attribute == read_attribute {
                        let write = position(format!("write{}", j).as_str());
                        prop_assert!(write < read);
                    }
                }
            }
        }

        // The returned record holds the last declared write to each attribute.
        let library = compiler.library();
        let outputs = Interpreter::new(&library).run("Tally::Count", vec![]).unwrap();
        let counter = outputs[0].as_record().unwrap();
        for attribute in ["n", "m"] {
            let last = steps.iter().rev().find_map(|s| match s {
                Step::Write(a, v) if *a == attribute => Some(*v),
                _ => None,
            });
            prop_assert_eq!(counter.get(attribute), Some(Value::Number(last.unwrap_or(0.0))));
        }
    }
}
