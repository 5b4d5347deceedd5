//! One generation run: synthesize, compile and emit every component of a [`Model`].

use crate::compiler::ActivityCompiler;
use crate::config::GeneratorConfig;
use crate::emitter::{BindingProfile, EmittedArtifacts, Emitter, RecordLayout};
use crate::error::{CompileError, GenerationError};
use crate::model::Model;
use crate::synth::{ComponentStateMachine, synthesize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct Generator {
    model: Model,
    config: GeneratorConfig,
}

pub struct GeneratorBuilder {
    model: Model,
    config: GeneratorConfig,
}

impl GeneratorBuilder {
    pub fn new(model: Model) -> Self {
        Self {
            model,
            config: GeneratorConfig::default(),
        }
    }

    /// Replaces every setting. Later `with_*` calls override single fields.
    pub fn with_config(mut self, config: GeneratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_binding(mut self, binding: BindingProfile) -> Self {
        self.config.binding = binding;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    pub fn with_component_model(mut self, enabled: bool) -> Self {
        self.config.emit_component_model = enabled;
        self
    }

    pub fn build(self) -> Generator {
        Generator {
            model: self.model,
            config: self.config,
        }
    }
}

/// The artifacts of one component that generated cleanly.
#[derive(Debug, Clone)]
pub struct ComponentArtifacts {
    pub component: String,
    pub state_machine: ComponentStateMachine,
    pub artifacts: EmittedArtifacts,
}

/// A component that could not be emitted. A component with several failing state
/// activities yields one failure per activity.
#[derive(Debug, Clone)]
pub struct GenerationFailure {
    pub component: String,
    /// The component, then every artifact down to the one that actually failed.
    pub chain: Vec<String>,
    pub error: GenerationError,
}

#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    pub components: Vec<ComponentArtifacts>,
    pub failures: Vec<GenerationFailure>,
    /// Number of activities lowered in this run; each one at most once.
    pub activities_compiled: usize,
}

impl GenerationReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Writes every emitted file into `dir`, creating it if needed.
    pub fn write_all(&self, dir: impl AsRef<Path>) -> io::Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        for component in &self.components {
            for file in component.artifacts.files() {
                let path = dir.join(&file.name);
                fs::write(&path, &file.text)?;
                written.push(path);
            }
        }
        Ok(written)
    }
}

impl Generator {
    pub fn builder(model: Model) -> GeneratorBuilder {
        GeneratorBuilder::new(model)
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Runs the whole batch. A failing component is reported and skipped; the others
    /// are still emitted.
    pub fn run(&self) -> GenerationReport {
        let model = &self.model;
        let mut compiler = ActivityCompiler::new(model);
        let emitter = Emitter::new(self.config.binding)
            .with_namespace(self.config.namespace.clone())
            .with_component_model(self.config.emit_component_model);
        let records: Vec<RecordLayout> = model.record_types.iter().map(RecordLayout::from).collect();

        info!(
            components = model.components.len(),
            profile = %self.config.binding,
            namespace = %self.config.namespace,
            "generation started"
        );

        let mut report = GenerationReport::default();
        for (component_id, component) in model.components.iter().enumerate() {
            let machine = synthesize(component);

            // Every state activity is compiled, so each failing root is reported.
            let mut failed = false;
            let mut visited = BTreeSet::new();
            for state in &component.state_machine.states {
                for &activity in &state.activities {
                    if !visited.insert(activity) {
                        continue;
                    }
                    if let Err(error) = compiler.compile(component_id, activity) {
                        let root = format!(
                            "{}::{}",
                            component.name.raw, component.activities[activity].name.raw
                        );
                        let chain = failure_chain(&component.name.raw, &root, &error);
                        warn!(component = %component.name.raw, chain = ?chain, error = %error, "activity failed");
                        report.failures.push(GenerationFailure {
                            component: component.name.raw.clone(),
                            chain,
                            error: error.into(),
                        });
                        failed = true;
                    }
                }
            }
            if failed {
                warn!(component = %component.name.raw, "component skipped");
                continue;
            }

            match emitter.emit(&machine, &compiler.library(), &records) {
                Ok(artifacts) => {
                    info!(
                        component = %component.name.raw,
                        files = artifacts.files().count(),
                        "component generated"
                    );
                    report.components.push(ComponentArtifacts {
                        component: component.name.raw.clone(),
                        state_machine: machine,
                        artifacts,
                    });
                }
                Err(error) => {
                    warn!(component = %component.name.raw, error = %error, "component skipped");
                    report.failures.push(GenerationFailure {
                        component: component.name.raw.clone(),
                        chain: vec![component.name.raw.clone()],
                        error: error.into(),
                    });
                }
            }
        }

        report.activities_compiled = compiler.compile_count();
        info!(
            generated = report.components.len(),
            failed = report.failures.len(),
            activities = report.activities_compiled,
            "generation finished"
        );
        report
    }
}

fn failure_chain(component: &str, root: &str, error: &CompileError) -> Vec<String> {
    let mut chain = vec![component.to_string(), root.to_string()];
    let mut current = error;
    while let CompileError::DependencyFailed {
        activity,
        dependency,
        cause,
    } = current
    {
        if chain.last() != Some(activity) {
            chain.push(activity.clone());
        }
        chain.push(dependency.clone());
        current = cause.as_ref();
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ModelError, UnsupportedLanguageError};

    #[test]
    fn test_failure_chain_follows_dependencies() {
        let error = CompileError::DependencyFailed {
            activity: "Pump::Cycle".to_string(),
            dependency: "Pump::Prime".to_string(),
            cause: Box::new(CompileError::DependencyFailed {
                activity: "Pump::Prime".to_string(),
                dependency: "Pump::Vent".to_string(),
                cause: Box::new(CompileError::UnsupportedLanguage(UnsupportedLanguageError {
                    activity: "Pump::Vent".to_string(),
                    node: "n1".to_string(),
                    language: "python".to_string(),
                })),
            }),
        };
        assert_eq!(
            failure_chain("Pump", "Pump::Cycle", &error),
            vec!["Pump", "Pump::Cycle", "Pump::Prime", "Pump::Vent"]
        );
    }

    #[test]
    fn test_direct_failure_chain() {
        let error = CompileError::Model(ModelError::UnboundOutput {
            path: "Pump::Cycle::node 'out'".to_string(),
        });
        assert_eq!(failure_chain("Pump", "Pump::Cycle", &error), vec!["Pump", "Pump::Cycle"]);
    }
}
