//! YAML parsing helpers

pub mod diagnostics;

pub use diagnostics::YamlSyntaxError;
