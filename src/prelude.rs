//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from the katachi crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use katachi::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let json = std::fs::read_to_string("path/to/model.json")?;
//! let model = Model::build(ExportedModel::from_json(&json)?.into_definition()?)?;
//!
//! let config = GeneratorConfig::from_file("path/to/katachi.json")?;
//! let report = Generator::builder(model).with_config(config).build().run();
//! println!("{} components generated", report.components.len());
//! # Ok(())
//! # }
//! ```

// Model input
pub use crate::model::{
    ActivityDefinition, ComponentDefinition, EdgeDefinition, ExportedModel, IntoDefinition,
    Model, ModelDefinition, NodeDefinition, NodeKindDefinition, RecordTypeDefinition,
    StateDefinition, StateMachineDefinition, TransitionDefinition,
};

// Generation
pub use crate::compiler::{ActivityCompiler, CompiledActivity};
pub use crate::config::GeneratorConfig;
pub use crate::emitter::{BindingProfile, EmittedArtifacts, Emitter};
pub use crate::engine::{GenerationReport, Generator};
pub use crate::synth::{ComponentStateMachine, synthesize};

// Reference executors
pub use crate::interpreter::{Datum, Interpreter, RecordValue};
pub use crate::runtime::{RecordingSink, Sink, StateMachineRuntime, TracingSink};

// Expressions
pub use crate::ast::{Expression, ScalarType, Value};

// Error types
pub use crate::error::{
    CompileError, EmitError, GenerationError, ModelError, RuntimeError,
    UnsupportedLanguageError,
};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
