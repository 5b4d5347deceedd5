use crate::ast::Value;
use thiserror::Error;

/// Malformed, unresolved or ambiguous model content.
///
/// Every variant carries the fully-qualified path of the offending entity
/// (`Component::Activity::node 'id'`). A `ModelError` raised while building the
/// model aborts the run before anything is emitted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("{path}: unresolved {kind} reference '{reference}'")]
    UnresolvedReference {
        path: String,
        kind: &'static str,
        reference: String,
    },

    #[error("{path}: duplicate {kind} name '{name}'")]
    DuplicateName {
        path: String,
        kind: &'static str,
        name: String,
    },

    #[error("{path}: state machine declares no states")]
    EmptyStateMachine { path: String },

    #[error("{path}: name '{raw}' cannot be rendered as an identifier")]
    InvalidIdentifier { path: String, raw: String },

    #[error("{path}: record type '{record}' declares no attribute '{attribute}'")]
    UndeclaredAttribute {
        path: String,
        record: String,
        attribute: String,
    },

    #[error("{path}: invalid expression: {message}")]
    InvalidExpression { path: String, message: String },

    #[error("{path}: write to '{object}' is ordered before the object is created or received")]
    DependencyOrderViolation { path: String, object: String },

    #[error("{path}: cyclic dependency between nodes [{}]", .nodes.join(", "))]
    CyclicDependency { path: String, nodes: Vec<String> },

    #[error("{path}: recursive activity invocation [{}]", .chain.join(" -> "))]
    RecursiveActivity { path: String, chain: Vec<String> },

    #[error("{path}: {count} output parameters, but the target supports a single return channel")]
    MultipleOutputs { path: String, count: usize },

    #[error("{path}: no argument bound for input parameter '{parameter}'")]
    MissingArgument { path: String, parameter: String },

    #[error("{path}: expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: String,
        found: String,
    },

    #[error("{path}: output parameter has no incoming value")]
    UnboundOutput { path: String },
}

/// An opaque action declared a transformation language the compiler does not lower.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("activity '{activity}': node '{node}' declares unsupported language '{language}'")]
pub struct UnsupportedLanguageError {
    pub activity: String,
    pub node: String,
    pub language: String,
}

/// Errors raised while compiling a single activity.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    UnsupportedLanguage(#[from] UnsupportedLanguageError),

    #[error("activity '{activity}' depends on '{dependency}', which failed to compile: {cause}")]
    DependencyFailed {
        activity: String,
        dependency: String,
        cause: Box<CompileError>,
    },
}

impl CompileError {
    /// The error at the bottom of a `DependencyFailed` chain.
    pub fn root_cause(&self) -> &CompileError {
        match self {
            CompileError::DependencyFailed { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

/// Errors raised while rendering synthesized structures to text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmitError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("component '{component}' references activity '{activity}', which was not compiled")]
    MissingActivity { component: String, activity: String },

    #[error("namespace '{namespace}': segment '{segment}' is not a C++ identifier")]
    InvalidNamespace { namespace: String, segment: String },
}

/// Why a component produced no artifacts in a generation run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Emit(#[from] EmitError),
}

/// Fatal or rejected conditions inside the reference state machine runtime.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("component '{component}': dispatch value {value} matches no known state")]
    UnreachableState { component: String, value: u32 },

    #[error("component '{component}' exposes no command '{command}'")]
    UnknownCommand { component: String, command: String },

    #[error(transparent)]
    Interpret(#[from] InterpretError),
}

/// Errors raised by the reference activity interpreter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpretError {
    #[error("activity '{0}' is not part of the compiled program")]
    UnknownActivity(String),

    #[error("activity '{activity}' expects {expected} arguments, received {received}")]
    ArgumentCount {
        activity: String,
        expected: usize,
        received: usize,
    },

    #[error("variable '{0}' is not bound")]
    UnboundVariable(String),

    #[error("'{variable}' does not hold a record")]
    NotARecord { variable: String },

    #[error("'{variable}' holds a record where a scalar is expected")]
    NotAScalar { variable: String },

    #[error("record '{record}' has no attribute '{attribute}'")]
    UnknownAttribute { record: String, attribute: String },

    #[error("opaque body of node '{node}' is not executable: {message}")]
    OpaqueBody { node: String, message: String },

    #[error(
        "type mismatch during operation '{operation}': expected {expected}, but found value '{found}'"
    )]
    TypeMismatch {
        operation: String,
        expected: String,
        found: Value,
    },
}

/// Errors that can occur when converting an external export format into a `ModelDefinition`.
#[derive(Error, Debug, Clone)]
pub enum ConversionError {
    #[error("Invalid export data: {0}")]
    ValidationError(String),

    #[error("Element '{element}' has an unsupported type '{type_name}'")]
    UnsupportedElement { element: String, type_name: String },
}

/// Errors loading a generator configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid namespace '{namespace}': segment '{segment}' is not a C++ identifier")]
    InvalidNamespace { namespace: String, segment: String },
}

/// Errors raised while parsing guard expressions and opaque action bodies.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("at offset {offset}: {message}")]
pub struct ParseError {
    pub offset: usize,
    pub message: String,
}
