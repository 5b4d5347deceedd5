//! Reference executor for lowered activities.
//!
//! Runs a [`CompiledActivity`] statement by statement over [`Datum`] values, so the
//! semantics of a lowering can be checked without a C++ toolchain. Opaque bodies are
//! executed when written in the assignment language of [`parse_statements`].

mod evaluate;

pub use evaluate::evaluate;

use crate::ast::{ScalarType, Value, parse_statements};
use crate::compiler::{ActivityLibrary, CompiledActivity, Statement};
use crate::error::InterpretError;
use crate::model::RecordType;
use ahash::AHashMap;
use tracing::trace;

/// A runtime value: a scalar or a whole data record.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Scalar(Value),
    Record(RecordValue),
}

impl Datum {
    pub fn as_record(&self) -> Option<&RecordValue> {
        match self {
            Datum::Record(r) => Some(r),
            Datum::Scalar(_) => None,
        }
    }
}

/// A data record instance. Fields are keyed by identifier and keep declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordValue {
    pub record: String,
    pub fields: Vec<(String, Value)>,
}

impl RecordValue {
    /// A record with every field zero/false.
    pub fn zeroed(record: &str, fields: &[(String, ScalarType)]) -> Self {
        Self {
            record: record.to_string(),
            fields: fields.iter().map(|(n, s)| (n.clone(), s.zero())).collect(),
        }
    }

    pub fn from_type(record: &RecordType) -> Self {
        Self {
            record: record.name.ident.clone(),
            fields: record
                .fields
                .iter()
                .map(|f| (f.name.ident.clone(), f.scalar.zero()))
                .collect(),
        }
    }

    /// Builder-style field assignment. Unknown fields are ignored.
    pub fn with(mut self, field: &str, value: Value) -> Self {
        self.set(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, v)| *v)
    }

    /// Returns false when the record has no such field.
    pub fn set(&mut self, field: &str, value: Value) -> bool {
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some(slot) => {
                slot.1 = value;
                true
            }
            None => false,
        }
    }
}

pub struct Interpreter<'l> {
    library: &'l ActivityLibrary,
}

impl<'l> Interpreter<'l> {
    pub fn new(library: &'l ActivityLibrary) -> Self {
        Self { library }
    }

    /// Runs the activity with the given qualified name and returns its outputs.
    pub fn run(&self, qualified: &str, arguments: Vec<Datum>) -> Result<Vec<Datum>, InterpretError> {
        let activity = self
            .library
            .get(qualified)
            .ok_or_else(|| InterpretError::UnknownActivity(qualified.to_string()))?;
        self.run_compiled(activity, arguments)
    }

    pub fn run_compiled(
        &self,
        activity: &CompiledActivity,
        arguments: Vec<Datum>,
    ) -> Result<Vec<Datum>, InterpretError> {
        if arguments.len() != activity.inputs.len() {
            return Err(InterpretError::ArgumentCount {
                activity: activity.qualified.clone(),
                expected: activity.inputs.len(),
                received: arguments.len(),
            });
        }

        let mut env: AHashMap<String, Datum> = AHashMap::new();
        let mut outputs: Vec<Option<Datum>> = vec![None; activity.outputs.len()];

        for statement in &activity.statements {
            trace!(activity = %activity.qualified, node = statement.node(), "execute");
            match statement {
                Statement::Receive {
                    parameter,
                    variable,
                    ..
                } => {
                    let index = activity
                        .inputs
                        .iter()
                        .position(|s| &s.ident == parameter)
                        .ok_or_else(|| InterpretError::UnboundVariable(parameter.clone()))?;
                    env.insert(variable.clone(), arguments[index].clone());
                }
                Statement::CreateObject {
                    variable,
                    record,
                    fields,
                    ..
                } => {
                    env.insert(
                        variable.clone(),
                        Datum::Record(RecordValue::zeroed(record, fields)),
                    );
                }
                Statement::Literal {
                    variable, value, ..
                } => {
                    env.insert(variable.clone(), Datum::Scalar(*value));
                }
                Statement::ReadFeature {
                    variable,
                    object,
                    attribute,
                    ..
                } => {
                    let record = record_of(&env, object)?;
                    let value =
                        record
                            .get(attribute)
                            .ok_or_else(|| InterpretError::UnknownAttribute {
                                record: record.record.clone(),
                                attribute: attribute.clone(),
                            })?;
                    env.insert(variable.clone(), Datum::Scalar(value));
                }
                Statement::WriteFeature {
                    object,
                    attribute,
                    value,
                    ..
                } => {
                    let value = scalar_of(&env, value)?;
                    let record = match env.get_mut(object) {
                        Some(Datum::Record(r)) => r,
                        _ => {
                            return Err(InterpretError::NotARecord {
                                variable: object.clone(),
                            });
                        }
                    };
                    if !record.set(attribute, value) {
                        return Err(InterpretError::UnknownAttribute {
                            record: record.record.clone(),
                            attribute: attribute.clone(),
                        });
                    }
                }
                Statement::Opaque {
                    node,
                    locals,
                    body,
                    exports,
                } => {
                    let mut scope: AHashMap<String, Value> = AHashMap::new();
                    for local in locals {
                        let value = match &local.source {
                            Some(source) => scalar_of(&env, source)?,
                            None => local.scalar.zero(),
                        };
                        scope.insert(local.name.clone(), value);
                    }

                    let assignments =
                        parse_statements(&body.join("\n")).map_err(|e| InterpretError::OpaqueBody {
                            node: node.clone(),
                            message: e.to_string(),
                        })?;
                    for assignment in &assignments {
                        let value = evaluate(&assignment.value, &|name| scope.get(name).copied())?;
                        scope.insert(assignment.target.clone(), value);
                    }

                    for (outer, local, _) in exports {
                        let value = scope
                            .get(local)
                            .copied()
                            .ok_or_else(|| InterpretError::UnboundVariable(local.clone()))?;
                        env.insert(outer.clone(), Datum::Scalar(value));
                    }
                }
                Statement::Call {
                    variable,
                    target,
                    arguments: call_arguments,
                    ..
                } => {
                    let values = call_arguments
                        .iter()
                        .map(|a| {
                            env.get(a)
                                .cloned()
                                .ok_or_else(|| InterpretError::UnboundVariable(a.clone()))
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    let mut results = self.run(target, values)?;
                    if let Some((name, _)) = variable {
                        if results.is_empty() {
                            return Err(InterpretError::UnboundVariable(name.clone()));
                        }
                        env.insert(name.clone(), results.swap_remove(0));
                    }
                }
                Statement::Fork { .. } | Statement::Join { .. } => {}
                Statement::Return { slot, variable, .. } => {
                    let value = env
                        .get(variable)
                        .cloned()
                        .ok_or_else(|| InterpretError::UnboundVariable(variable.clone()))?;
                    if let Some(output) = outputs.get_mut(*slot) {
                        *output = Some(value);
                    }
                }
            }
        }

        outputs
            .into_iter()
            .zip(&activity.outputs)
            .map(|(value, slot)| value.ok_or_else(|| InterpretError::UnboundVariable(slot.ident.clone())))
            .collect()
    }
}

fn record_of<'e>(
    env: &'e AHashMap<String, Datum>,
    variable: &str,
) -> Result<&'e RecordValue, InterpretError> {
    match env.get(variable) {
        Some(Datum::Record(r)) => Ok(r),
        Some(Datum::Scalar(_)) => Err(InterpretError::NotARecord {
            variable: variable.to_string(),
        }),
        None => Err(InterpretError::UnboundVariable(variable.to_string())),
    }
}

fn scalar_of(env: &AHashMap<String, Datum>, variable: &str) -> Result<Value, InterpretError> {
    match env.get(variable) {
        Some(Datum::Scalar(v)) => Ok(*v),
        Some(Datum::Record(_)) => Err(InterpretError::NotAScalar {
            variable: variable.to_string(),
        }),
        None => Err(InterpretError::UnboundVariable(variable.to_string())),
    }
}
