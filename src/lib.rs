//! lotguard: equipment package-validation configuration
//!
//! Keeps per-equipment lot validation rules as plain YAML documents:
//! derives package-selection identifiers from 15-character package codes,
//! validates documents at the boundary and guards the store's invariants.

pub mod cli;
pub mod core;
pub mod entities;
pub mod schema;
pub mod yaml;
