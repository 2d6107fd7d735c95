//! Schema system - document validation and template generation

pub mod draft;
pub mod registry;
pub mod template;
pub mod validator;

pub use draft::{validate_equipment, validate_package, validate_variant, EquipmentDocument};
pub use registry::SchemaRegistry;
pub use template::{TemplateContext, TemplateGenerator};
pub use validator::{DocumentError, ValidationError, Validator};
