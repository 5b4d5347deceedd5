//! Activity Flow Compiler.
//!
//! Orders an activity's node graph by its data and control dependencies and lowers it
//! into straight-line [`Statement`]s. Compilation is memoized per qualified activity
//! name: an activity reached from several call sites or states is lowered once, and a
//! failure is cached and reported to every dependent.

mod compiled;
mod graph;
mod lowering;

pub use compiled::*;

use crate::error::{CompileError, ModelError};
use crate::model::{ActivityId, ComponentId, Model, NodeKind};
use ahash::AHashMap;
use lowering::ActivityLowering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Every successfully compiled activity of a run, by qualified name.
pub type ActivityLibrary = BTreeMap<String, Arc<CompiledActivity>>;

pub struct ActivityCompiler<'m> {
    model: &'m Model,
    cache: AHashMap<String, Result<Arc<CompiledActivity>, CompileError>>,
    in_progress: Vec<String>,
    compile_count: usize,
}

impl<'m> ActivityCompiler<'m> {
    pub fn new(model: &'m Model) -> Self {
        Self {
            model,
            cache: AHashMap::new(),
            in_progress: Vec::new(),
            compile_count: 0,
        }
    }

    /// How many activities were actually lowered (cache hits excluded).
    pub fn compile_count(&self) -> usize {
        self.compile_count
    }

    /// Compiles an activity by component and activity name, as written in the model.
    pub fn compile_by_name(
        &mut self,
        component: &str,
        activity: &str,
    ) -> Result<Arc<CompiledActivity>, CompileError> {
        let component_id = self
            .model
            .components
            .iter()
            .position(|c| c.name.raw == component)
            .ok_or_else(|| ModelError::UnresolvedReference {
                path: "model".to_string(),
                kind: "component",
                reference: component.to_string(),
            })?;
        let activity_id = self.model.components[component_id]
            .activities
            .iter()
            .position(|a| a.name.raw == activity)
            .ok_or_else(|| ModelError::UnresolvedReference {
                path: component.to_string(),
                kind: "activity",
                reference: activity.to_string(),
            })?;
        self.compile(component_id, activity_id)
    }

    /// Compiles an activity, reusing the cached result when it was compiled before.
    pub fn compile(
        &mut self,
        component: ComponentId,
        activity: ActivityId,
    ) -> Result<Arc<CompiledActivity>, CompileError> {
        let model = self.model;
        let qualified = model.components[component].qualified_activity(activity);

        if let Some(cached) = self.cache.get(&qualified) {
            return cached.clone();
        }
        if let Some(start) = self.in_progress.iter().position(|q| q == &qualified) {
            let mut chain = self.in_progress[start..].to_vec();
            chain.push(qualified.clone());
            return Err(ModelError::RecursiveActivity {
                path: qualified,
                chain,
            }
            .into());
        }

        self.in_progress.push(qualified.clone());
        let result = self.compile_uncached(component, activity).map(Arc::new);
        self.in_progress.pop();

        match &result {
            Ok(compiled) => debug!(
                activity = %qualified,
                statements = compiled.statements.len(),
                calls = compiled.calls.len(),
                "activity compiled"
            ),
            Err(e) => warn!(activity = %qualified, error = %e, "activity failed to compile"),
        }
        self.cache.insert(qualified, result.clone());
        result
    }

    fn compile_uncached(
        &mut self,
        component_id: ComponentId,
        activity_id: ActivityId,
    ) -> Result<CompiledActivity, CompileError> {
        let model = self.model;
        let component = &model.components[component_id];
        let activity = &component.activities[activity_id];
        let path = format!("{}::{}", component.name.raw, activity.name.raw);

        lowering::check_languages(&path, activity)?;

        let mut callees = AHashMap::new();
        for (index, node) in activity.nodes.iter().enumerate() {
            if let NodeKind::CallBehavior { target, .. } = &node.kind {
                let compiled = self.compile(component_id, *target).map_err(|cause| {
                    CompileError::DependencyFailed {
                        activity: path.clone(),
                        dependency: format!(
                            "{}::{}",
                            component.name.raw, component.activities[*target].name.raw
                        ),
                        cause: Box::new(cause),
                    }
                })?;
                callees.insert(index, compiled);
            }
        }

        self.compile_count += 1;
        ActivityLowering::new(model, component, activity, path, callees).lower()
    }

    /// Every activity compiled successfully so far.
    pub fn library(&self) -> ActivityLibrary {
        self.cache
            .iter()
            .filter_map(|(name, result)| {
                result
                    .as_ref()
                    .ok()
                    .map(|compiled| (name.clone(), Arc::clone(compiled)))
            })
            .collect()
    }
}
