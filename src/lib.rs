//! # Katachi - UML to F Prime Component Generator
//!
//! **Katachi** turns UML state machines and activities into flight-software component
//! code: a C++ interface/implementation pair per component, plus its FPP component
//! model. State machines become a tick-driven dispatcher with guarded transitions,
//! state-transition events and current-state telemetry. Activities become
//! straight-line methods over fixed-layout data records, ordered by their data and
//! control dependencies.
//!
//! ## Core Workflow
//!
//! The engine is format-agnostic. It operates on a resolved object graph, the
//! [`ModelDefinition`](model::ModelDefinition). The primary workflow is:
//!
//! 1.  **Load Your Model**: Read your exporter's output into your own Rust structs, or use
//!     the bundled JSON format, [`ExportedModel`](model::ExportedModel).
//! 2.  **Convert to Katachi's Model**: Implement [`IntoDefinition`](model::IntoDefinition)
//!     for your structs to translate them into a `ModelDefinition`.
//! 3.  **Build**: [`Model::build`](model::Model::build) resolves every reference and
//!     sanitizes every name. Any problem aborts here, before anything is emitted.
//! 4.  **Generate**: Configure a [`Generator`](engine::Generator) with a binding profile
//!     and run it. The report holds the emitted files and every component that failed,
//!     with the chain of artifacts behind the failure.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use katachi::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let json = std::fs::read_to_string("demos/slew_use_case.json")?;
//!     let definition = ExportedModel::from_json(&json)?.into_definition()?;
//!     let model = Model::build(definition)?;
//!
//!     let report = Generator::builder(model)
//!         .with_binding(BindingProfile::Mock)
//!         .build()
//!         .run();
//!
//!     for failure in &report.failures {
//!         eprintln!("{}: {}", failure.chain.join(" -> "), failure.error);
//!     }
//!     report.write_all("generated")?;
//!     Ok(())
//! }
//! ```

pub mod ast;
pub mod compiler;
pub mod config;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod interpreter;
pub mod model;
pub mod prelude;
pub mod runtime;
pub mod sanitize;
pub mod synth;
