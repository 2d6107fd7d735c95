//! Core module - fundamental types and utilities

pub mod config;
pub mod error;
pub mod identity;
pub mod loader;
pub mod logging;
pub mod project;
pub mod repository;
pub mod selection;
pub mod store;

pub use config::Config;
pub use error::{ConfigError, ErrorKind, FieldPath, ValidationReport, Violation};
pub use identity::{ConfigId, IdParseError};
pub use project::{Project, ProjectError};
pub use repository::{
    EquipmentFilter, EquipmentRepository, EquipmentUpdate, ListQuery, NewEquipmentConfig, Page,
    RepositoryOptions, SortField, SortOrder,
};
pub use selection::{
    decompose, derive_package_selection_code, PackageCodeParts, SelectionError, SelectionMask,
};
pub use store::{ConfigStore, MemoryStore, Mutation, YamlStore};
