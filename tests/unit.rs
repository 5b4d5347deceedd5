//! Unit tests for core Katachi functionality.
use katachi::ast::{parse_expression, parse_statements};
use katachi::error::{InterpretError, ModelError};
use katachi::prelude::*;
use std::collections::BTreeSet;

#[test]
fn test_value_display() {
    assert_eq!(format!("{}", Value::Number(42.0)), "42");
    assert_eq!(format!("{}", Value::Number(0.4)), "0.4");
    assert_eq!(format!("{}", Value::Bool(true)), "true");
}

#[test]
fn test_scalar_types_from_uml_names() {
    assert_eq!(ScalarType::from_uml_name("Real"), Some(ScalarType::Float));
    assert_eq!(ScalarType::from_uml_name("Boolean"), Some(ScalarType::Bool));
    assert_eq!(ScalarType::from_uml_name("String"), None);
    assert_eq!(ScalarType::Float.zero(), Value::Number(0.0));
}

#[test]
fn test_guard_collects_variables() {
    let expr = parse_expression("armed && (altitude > 10 || override)").unwrap();
    let mut variables = BTreeSet::new();
    expr.collect_variables(&mut variables);
    let variables: Vec<&str> = variables.iter().map(String::as_str).collect();
    assert_eq!(variables, vec!["altitude", "armed", "override"]);
    assert!(expr.is_boolean());
}

#[test]
fn test_render_keeps_needed_parentheses() {
    let expr = parse_expression("a - (b - c) * 2").unwrap();
    assert_eq!(
        expr.render(&|name| format!("m_{}", name)),
        "m_a - (m_b - m_c) * 2.0"
    );
}

#[test]
fn test_opaque_body_parses_into_assignments() {
    let statements =
        parse_statements("timeStep = timeStep + 1;\naoa = slewRate*timeStep;").unwrap();
    assert_eq!(statements.len(), 2);
    assert_eq!(statements[1].target, "aoa");
    assert!(parse_statements("aoa = ").is_err());
}

#[test]
fn test_error_display() {
    let err = ModelError::UnresolvedReference {
        path: "Pump::Main::node 'n1'".to_string(),
        kind: "activity",
        reference: "Prime".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "Pump::Main::node 'n1': unresolved activity reference 'Prime'"
    );

    let err = ModelError::CyclicDependency {
        path: "Pump::Main".to_string(),
        nodes: vec!["a".to_string(), "b".to_string()],
    };
    assert!(err.to_string().contains("[a, b]"));

    let eval_err = InterpretError::TypeMismatch {
        operation: "+".to_string(),
        expected: "Number".to_string(),
        found: Value::Bool(false),
    };
    assert!(eval_err.to_string().contains('+'));
    assert!(eval_err.to_string().contains("Number"));
    assert!(eval_err.to_string().contains("false"));

    let unsupported = UnsupportedLanguageError {
        activity: "Pump::Calc".to_string(),
        node: "script".to_string(),
        language: "python".to_string(),
    };
    assert!(unsupported.to_string().contains("Pump::Calc"));
    assert!(unsupported.to_string().contains("python"));
}

#[test]
fn test_binding_profile_parsing() {
    assert_eq!("Mock".parse::<BindingProfile>(), Ok(BindingProfile::Mock));
    assert_eq!("production".parse::<BindingProfile>(), Ok(BindingProfile::Production));
    assert!("staging".parse::<BindingProfile>().is_err());
    assert_eq!(BindingProfile::Mock.to_string(), "mock");
}
