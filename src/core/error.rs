//! Error taxonomy shared by validation and repository operations

use miette::Diagnostic;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::core::selection::SelectionError;

/// Machine-readable error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    InvalidLength,
    InvalidMask,
    MissingField,
    EmptyField,
    InvalidFieldType,
    UnexpectedField,
    UnknownToolPosition,
    InvalidValidateType,
    EmptyConfig,
    DuplicatePackageSelectionCode,
    DuplicatePackage8Digit,
    SelectionCodeMismatch,
    AlreadyExists,
    NotFound,
    StorageUnavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidLength => "InvalidLength",
            ErrorKind::InvalidMask => "InvalidMask",
            ErrorKind::MissingField => "MissingField",
            ErrorKind::EmptyField => "EmptyField",
            ErrorKind::InvalidFieldType => "InvalidFieldType",
            ErrorKind::UnexpectedField => "UnexpectedField",
            ErrorKind::UnknownToolPosition => "UnknownToolPosition",
            ErrorKind::InvalidValidateType => "InvalidValidateType",
            ErrorKind::EmptyConfig => "EmptyConfig",
            ErrorKind::DuplicatePackageSelectionCode => "DuplicatePackageSelectionCode",
            ErrorKind::DuplicatePackage8Digit => "DuplicatePackage8Digit",
            ErrorKind::SelectionCodeMismatch => "SelectionCodeMismatch",
            ErrorKind::AlreadyExists => "AlreadyExists",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::StorageUnavailable => "StorageUnavailable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&SelectionError> for ErrorKind {
    fn from(err: &SelectionError) -> Self {
        match err {
            SelectionError::InvalidLength { .. } => ErrorKind::InvalidLength,
            SelectionError::InvalidMask { .. } => ErrorKind::InvalidMask,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PathSegment {
    Field(String),
    Index(usize),
}

/// Location of a field inside an equipment document
///
/// Displays as `config[0].data_with_selection_code[2].recipe_name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// A child path naming a field
    pub fn field(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Field(name.to_string()));
        Self(segments)
    }

    /// A child path indexing into a sequence
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    /// Parse a JSON pointer; all-digit segments become indexes
    pub fn from_pointer(pointer: &str) -> Self {
        Self(
            pointer
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| match s.parse::<usize>() {
                    Ok(i) => PathSegment::Index(i),
                    Err(_) => PathSegment::Field(s.replace("~1", "/").replace("~0", "~")),
                })
                .collect(),
        )
    }

    /// JSON-pointer form (`/config/0/recipe_name`), used to locate spans
    pub fn pointer(&self) -> String {
        self.0
            .iter()
            .map(|segment| match segment {
                PathSegment::Field(name) => format!("/{}", name),
                PathSegment::Index(i) => format!("/{}", i),
            })
            .collect()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("document");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if i == 0 => write!(f, "{}", name)?,
                PathSegment::Field(name) => write!(f, ".{}", name)?,
                PathSegment::Index(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

impl Serialize for FieldPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// A single rule violation with its location
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic, Serialize)]
#[error("{kind} at {path}: {detail}")]
pub struct Violation {
    pub kind: ErrorKind,
    pub path: FieldPath,
    pub detail: String,
}

impl Violation {
    pub fn new(kind: ErrorKind, path: FieldPath, detail: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            detail: detail.into(),
        }
    }

    pub fn missing(path: FieldPath) -> Self {
        Self::new(ErrorKind::MissingField, path, "required field is missing")
    }

    pub fn empty(path: FieldPath) -> Self {
        Self::new(ErrorKind::EmptyField, path, "value must not be empty")
    }

    pub fn selection(path: FieldPath, err: &SelectionError) -> Self {
        Self::new(ErrorKind::from(err), path, err.to_string())
    }
}

/// Every violation found in one candidate, in discovery order
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("configuration rejected: {}", summarize(.violations))]
#[diagnostic(code(lotguard::validation::rejected))]
pub struct ValidationReport {
    #[related]
    violations: Vec<Violation>,
}

fn summarize(violations: &[Violation]) -> String {
    match violations {
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
        [] => "no violations".to_string(),
    }
}

impl ValidationReport {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    pub fn single(violation: Violation) -> Self {
        Self::new(vec![violation])
    }

    /// `Ok(())` when nothing was found, otherwise the report
    pub fn check(violations: Vec<Violation>) -> Result<(), ValidationReport> {
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Self::new(violations))
        }
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn first(&self) -> Option<&Violation> {
        self.violations.first()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Whether any violation has the given kind
    pub fn has(&self, kind: ErrorKind) -> bool {
        self.violations.iter().any(|v| v.kind == kind)
    }
}

/// Errors returned by repository operations
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Invalid(#[from] ValidationReport),

    #[error("equipment '{name}' already exists")]
    #[diagnostic(
        code(lotguard::repository::already_exists),
        help("equipment names are unique; choose another name or update the existing config")
    )]
    AlreadyExists { name: String },

    #[error("no equipment config matches '{reference}'")]
    #[diagnostic(code(lotguard::repository::not_found))]
    NotFound { reference: String },

    #[error("storage unavailable: {message}")]
    #[diagnostic(
        code(lotguard::repository::storage_unavailable),
        help("the store may be locked by another writer; retry the operation")
    )]
    StorageUnavailable { message: String },
}

impl ConfigError {
    pub fn storage(message: impl Into<String>) -> Self {
        ConfigError::StorageUnavailable {
            message: message.into(),
        }
    }

    pub fn not_found(reference: impl fmt::Display) -> Self {
        ConfigError::NotFound {
            reference: reference.to_string(),
        }
    }

    /// The machine-readable kind; a report yields the kind of its first violation
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::Selection(err) => ErrorKind::from(err),
            ConfigError::Invalid(report) => report
                .first()
                .map(|v| v.kind)
                .unwrap_or(ErrorKind::MissingField),
            ConfigError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            ConfigError::NotFound { .. } => ErrorKind::NotFound,
            ConfigError::StorageUnavailable { .. } => ErrorKind::StorageUnavailable,
        }
    }

    /// Field path of the first violation, when the error points at one
    pub fn path(&self) -> Option<&FieldPath> {
        match self {
            ConfigError::Invalid(report) => report.first().map(|v| &v.path),
            _ => None,
        }
    }

    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            ConfigError::Invalid(report) => Some(report),
            _ => None,
        }
    }

    /// Only storage failures are worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConfigError::StorageUnavailable { .. })
    }
}
