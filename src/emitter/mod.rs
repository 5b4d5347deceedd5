//! Code Emitter.
//!
//! Renders a [`ComponentStateMachine`] and the [`CompiledActivity`] values it reaches into
//! a paired C++ interface and implementation, plus an optional FPP component model. The
//! selected [`BindingProfile`] changes the call targets of log, telemetry, command
//! response and assertion statements and nothing else.
//!
//! Rendering is pure: the same inputs and profile always produce byte-identical text.

mod binding;
mod component_model;
mod implementation;
mod interface;
mod writer;

pub use binding::BindingProfile;

use crate::ast::{ScalarType, Value, format_number};
use crate::compiler::{ActivityLibrary, CompiledActivity, Statement, ValueType};
use crate::error::{EmitError, ModelError};
use crate::model::RecordType;
use crate::sanitize::invalid_namespace_segment;
use crate::synth::ComponentStateMachine;
use binding::Binding;
use itertools::Itertools;
use std::collections::BTreeSet;
use tracing::debug;

pub const DEFAULT_NAMESPACE: &str = "Components";

/// The fixed-layout shape of a data record, as the emitted struct declares it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordLayout {
    pub ident: String,
    pub fields: Vec<(String, ScalarType)>,
}

impl From<&RecordType> for RecordLayout {
    fn from(record: &RecordType) -> Self {
        Self {
            ident: record.name.ident.clone(),
            fields: record
                .fields
                .iter()
                .map(|f| (f.name.ident.clone(), f.scalar))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub text: String,
}

/// Everything emitted for one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedArtifacts {
    pub component: String,
    pub interface: SourceFile,
    pub implementation: SourceFile,
    pub component_model: Option<SourceFile>,
}

impl EmittedArtifacts {
    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        [&self.interface, &self.implementation]
            .into_iter()
            .chain(self.component_model.as_ref())
    }
}

#[derive(Debug, Clone)]
pub struct Emitter {
    profile: BindingProfile,
    namespace: String,
    component_model: bool,
}

impl Emitter {
    pub fn new(profile: BindingProfile) -> Self {
        Self {
            profile,
            namespace: DEFAULT_NAMESPACE.to_string(),
            component_model: true,
        }
    }

    /// C++ namespace (and FPP module) of the emitted code. `::` nests.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_component_model(mut self, enabled: bool) -> Self {
        self.component_model = enabled;
        self
    }

    pub fn profile(&self) -> BindingProfile {
        self.profile
    }

    /// Renders one component. Every activity a state reaches, directly or through
    /// call-behavior actions, must be present in `library`.
    pub fn emit(
        &self,
        machine: &ComponentStateMachine,
        library: &ActivityLibrary,
        records: &[RecordLayout],
    ) -> Result<EmittedArtifacts, EmitError> {
        check_namespace(&self.namespace)?;
        let activities = reachable_activities(machine, library)?;
        for activity in &activities {
            if activity.outputs.len() > 1 {
                return Err(ModelError::MultipleOutputs {
                    path: format!("{}::{}", machine.component_raw, activity.raw),
                    count: activity.outputs.len(),
                }
                .into());
            }
        }

        let used = used_records(&activities);
        let records: Vec<&RecordLayout> = records
            .iter()
            .filter(|r| used.contains(&r.ident))
            .collect();

        let unit = EmitUnit {
            machine,
            activities,
            records,
            namespace: &self.namespace,
            binding: self.profile.binding(),
        };

        let interface = SourceFile {
            name: format!("{}.hpp", unit.class_name()),
            text: interface::render(&unit),
        };
        let implementation = SourceFile {
            name: format!("{}.cpp", unit.class_name()),
            text: implementation::render(&unit),
        };
        let component_model = self.component_model.then(|| SourceFile {
            name: format!("{}.fpp", machine.component),
            text: component_model::render(&unit),
        });

        debug!(
            component = %machine.component_raw,
            profile = %self.profile,
            activities = unit.activities.len(),
            records = unit.records.len(),
            "component emitted"
        );
        Ok(EmittedArtifacts {
            component: machine.component.clone(),
            interface,
            implementation,
            component_model,
        })
    }
}

/// The inputs of one rendering pass, shared by the three renderers.
pub(crate) struct EmitUnit<'a> {
    pub machine: &'a ComponentStateMachine,
    pub activities: Vec<&'a CompiledActivity>,
    pub records: Vec<&'a RecordLayout>,
    pub namespace: &'a str,
    pub binding: &'static dyn Binding,
}

impl EmitUnit<'_> {
    pub fn class_name(&self) -> String {
        format!("{}ComponentImpl", self.machine.component)
    }

    pub fn base_name(&self) -> String {
        format!("{}ComponentBase", self.machine.component)
    }

    pub fn namespaces(&self) -> Vec<&str> {
        self.namespace
            .split("::")
            .filter(|s| !s.is_empty())
            .collect()
    }
}

fn check_namespace(namespace: &str) -> Result<(), EmitError> {
    match invalid_namespace_segment(namespace) {
        Some(segment) => Err(EmitError::InvalidNamespace {
            namespace: namespace.to_string(),
            segment: segment.to_string(),
        }),
        None => Ok(()),
    }
}

/// Activities reached from the dispatch arms, closed over their calls, sorted by
/// qualified name.
fn reachable_activities<'l>(
    machine: &ComponentStateMachine,
    library: &'l ActivityLibrary,
) -> Result<Vec<&'l CompiledActivity>, EmitError> {
    let mut seen = BTreeSet::new();
    let mut pending = machine.referenced_activities();
    while let Some(qualified) = pending.pop() {
        if !seen.insert(qualified.clone()) {
            continue;
        }
        let activity = library
            .get(&qualified)
            .ok_or_else(|| EmitError::MissingActivity {
                component: machine.component_raw.clone(),
                activity: qualified.clone(),
            })?;
        pending.extend(activity.calls.iter().cloned());
    }

    seen.iter()
        .map(|q| {
            library
                .get(q)
                .map(|a| a.as_ref())
                .ok_or_else(|| EmitError::MissingActivity {
                    component: machine.component_raw.clone(),
                    activity: q.clone(),
                })
        })
        .collect()
}

fn used_records(activities: &[&CompiledActivity]) -> BTreeSet<String> {
    let mut used = BTreeSet::new();
    let mut note = |ty: &ValueType| {
        if let ValueType::Record(r) = ty {
            used.insert(r.clone());
        }
    };
    for activity in activities {
        for slot in activity.inputs.iter().chain(&activity.outputs) {
            note(&slot.ty);
        }
        for statement in &activity.statements {
            match statement {
                Statement::Receive { ty, .. } => note(ty),
                Statement::Call {
                    variable: Some((_, ty)),
                    ..
                } => note(ty),
                Statement::CreateObject { record, .. } => {
                    note(&ValueType::Record(record.clone()));
                }
                _ => {}
            }
        }
    }
    used
}

pub(crate) fn cpp_scalar(scalar: ScalarType) -> &'static str {
    match scalar {
        ScalarType::Float => "F64",
        ScalarType::Bool => "bool",
    }
}

pub(crate) fn cpp_type(ty: &ValueType) -> &str {
    match ty {
        ValueType::Scalar(s) => cpp_scalar(*s),
        ValueType::Record(r) => r,
    }
}

pub(crate) fn cpp_literal(value: Value) -> String {
    match value {
        Value::Number(n) => format_number(n),
        Value::Bool(b) => b.to_string(),
    }
}

pub(crate) fn cpp_string(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/// `Ret name(const T& a, const U& b)`, without the class qualifier.
pub(crate) fn activity_signature(activity: &CompiledActivity, qualifier: &str) -> String {
    let ret = activity
        .outputs
        .first()
        .map(|s| cpp_type(&s.ty))
        .unwrap_or("void");
    let params = activity
        .inputs
        .iter()
        .map(|s| format!("const {}& {}", cpp_type(&s.ty), s.ident))
        .join(", ");
    format!("{} {}{}({})", ret, qualifier, activity.ident, params)
}
