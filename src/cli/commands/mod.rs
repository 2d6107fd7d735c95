//! CLI command implementations

pub mod completions;
pub mod derive;
pub mod eqp;
pub mod init;
pub mod validate;
