use super::definition::ModelDefinition;
use crate::error::ConversionError;

/// A trait for external export formats that can be converted into a `ModelDefinition`.
///
/// This is the extension point that keeps the generator format-agnostic: parsing the
/// interchange format stays with the caller, who only has to hand over an already
/// resolved object graph.
///
/// # Example
///
/// ```rust,no_run
/// use katachi::prelude::*;
/// use katachi::error::ConversionError;
///
/// struct MyState { name: String }
/// struct MyMachine { component: String, states: Vec<MyState> }
///
/// impl IntoDefinition for MyMachine {
///     fn into_definition(self) -> std::result::Result<ModelDefinition, ConversionError> {
///         let initial = self
///             .states
///             .first()
///             .map(|s| s.name.clone())
///             .ok_or_else(|| ConversionError::ValidationError("no states".into()))?;
///
///         Ok(ModelDefinition {
///             components: vec![ComponentDefinition {
///                 name: self.component,
///                 state_machine: StateMachineDefinition {
///                     name: "Main".into(),
///                     states: self
///                         .states
///                         .into_iter()
///                         .map(|s| StateDefinition { name: s.name, activities: vec![] })
///                         .collect(),
///                     initial,
///                     transitions: vec![],
///                 },
///                 activities: vec![],
///                 attributes: vec![],
///             }],
///             record_types: vec![],
///         })
///     }
/// }
/// ```
pub trait IntoDefinition {
    /// Consumes the object and converts it into a generator-ready model definition.
    fn into_definition(self) -> Result<ModelDefinition, ConversionError>;
}

impl IntoDefinition for ModelDefinition {
    fn into_definition(self) -> Result<ModelDefinition, ConversionError> {
        Ok(self)
    }
}
