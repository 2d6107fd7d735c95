//! Diagnostic logging to stderr
//!
//! stdout carries command output only, so every log line goes to stderr.

use miette::Diagnostic;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Environment variable holding a filter directive
pub const LOG_ENV: &str = "LOTGUARD_LOG";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

impl Verbosity {
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => Verbosity::Quiet,
            (false, true) => Verbosity::Verbose,
            (false, false) => Verbosity::Normal,
        }
    }

    fn level(self) -> LevelFilter {
        match self {
            Verbosity::Quiet => LevelFilter::ERROR,
            Verbosity::Normal => LevelFilter::WARN,
            Verbosity::Verbose => LevelFilter::DEBUG,
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum LoggingError {
    #[error("invalid log filter '{directive}': {message}")]
    #[diagnostic(
        code(lotguard::logging::invalid_filter),
        help("use a level (warn, debug) or directives like lotguard=debug")
    )]
    InvalidFilter { directive: String, message: String },

    #[error("failed to install log subscriber: {0}")]
    #[diagnostic(code(lotguard::logging::init))]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Build the filter: an explicit directive wins, then `LOTGUARD_LOG`, then verbosity
pub fn build_filter(verbosity: Verbosity, directive: Option<&str>) -> Result<EnvFilter, LoggingError> {
    let builder = EnvFilter::builder().with_default_directive(verbosity.level().into());
    match directive {
        Some(directive) => builder.parse(directive).map_err(|e| LoggingError::InvalidFilter {
            directive: directive.to_string(),
            message: e.to_string(),
        }),
        None => Ok(builder.with_env_var(LOG_ENV).from_env_lossy()),
    }
}

/// Install the global subscriber
pub fn init(verbosity: Verbosity, directive: Option<&str>) -> Result<(), LoggingError> {
    let filter = build_filter(verbosity, directive)?;
    Registry::default()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_flags() {
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
    }

    #[test]
    fn test_explicit_directive() {
        assert!(build_filter(Verbosity::Normal, Some("lotguard=debug")).is_ok());
        let err = build_filter(Verbosity::Normal, Some("lotguard=loud")).unwrap_err();
        assert!(matches!(err, LoggingError::InvalidFilter { .. }));
    }
}
