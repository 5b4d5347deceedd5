//! The model layer: the resolved object graph accepted from an external source
//! ([`definition`]), conversion into it ([`conversion`], [`export`]), and the validated
//! immutable IR ([`ir`]) built from it.

mod builder;
pub mod conversion;
pub mod definition;
pub mod export;
pub mod ir;

pub use conversion::*;
pub use definition::*;
pub use export::ExportedModel;
pub use ir::*;
