//! Configuration entities
//!
//! The configuration tree is fully owned and denormalized:
//!
//! - [`EquipmentConfig`] - one record per piece of equipment
//! - [`PackageConfig`] - variants under one base package code and selection mask
//! - [`ValidationVariant`] - the leaf rule for one package-selection identifier

pub mod equipment;
pub mod package;
pub mod variant;

pub use equipment::EquipmentConfig;
pub use package::PackageConfig;
pub use variant::{AllowToolIds, MatchOptions, MatchRule, ToolPosition, ValidateType, ValidationVariant};
