//! Schema validation

pub mod registry;
pub mod report;
pub mod validator;

pub use registry::{ActionRegistry, ActionSchema, InputSpec};
pub use report::{SchemaError, SchemaWarning, ValidationReport};
pub use validator::{validate, ValidatedWorkflow, Validator};
