//! Document validation with source-annotated error reporting
//!
//! A document passes three stages in order: YAML syntax, the embedded JSON
//! Schema (value types only), then the content rules in [`crate::schema::draft`].
//! Each stage reports every problem it finds; a later stage only runs when
//! the earlier ones passed.

use jsonschema::{validator_for, Validator as JsonValidator};
use miette::{Diagnostic, NamedSource, SourceSpan};
use serde_json::Value as JsonValue;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::error::{ErrorKind, FieldPath, ValidationReport, Violation};
use crate::schema::draft::{validate_equipment, EquipmentDocument};
use crate::schema::registry::SchemaRegistry;
use crate::yaml::YamlSyntaxError;

/// Validation error with source location information
#[derive(Debug, Error, Diagnostic)]
#[error("{filename}: {summary}")]
#[diagnostic(code(lotguard::validation::document))]
pub struct ValidationError {
    filename: String,
    summary: String,

    #[source_code]
    src: NamedSource<String>,

    #[related]
    violations: Vec<SchemaViolation>,
}

/// A single violation located in the source text
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct SchemaViolation {
    #[label("{}", self.kind)]
    span: SourceSpan,

    message: String,
    kind: ErrorKind,
    path: FieldPath,

    #[help]
    help: Option<String>,
}

impl SchemaViolation {
    fn locate(content: &str, violation: &Violation) -> Self {
        Self {
            span: find_path_span(content, &violation.path.pointer()),
            message: violation.to_string(),
            kind: violation.kind,
            path: violation.path.clone(),
            help: help_for(violation.kind, &violation.path),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl ValidationError {
    pub fn new(filename: &str, source: &str, violations: Vec<SchemaViolation>) -> Self {
        let count = violations.len();
        let summary = if count == 1 {
            "1 error".to_string()
        } else {
            format!("{} errors", count)
        };
        Self {
            filename: filename.to_string(),
            summary,
            src: NamedSource::new(filename, source.to_string()),
            violations,
        }
    }

    /// Locate every violation of `report` in `source`
    pub fn from_report(filename: &str, source: &str, report: &ValidationReport) -> Self {
        let violations = report
            .violations()
            .iter()
            .map(|v| SchemaViolation::locate(source, v))
            .collect();
        Self::new(filename, source, violations)
    }

    /// Get the number of violations
    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }

    pub fn violations(&self) -> &[SchemaViolation] {
        &self.violations
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }
}

/// Everything that can stop a document from validating
#[derive(Debug, Error, Diagnostic)]
pub enum DocumentError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] YamlSyntaxError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Invalid(#[from] ValidationError),

    #[error("failed to read {path}: {source}")]
    #[diagnostic(code(lotguard::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl DocumentError {
    /// Number of individual problems this error stands for
    pub fn violation_count(&self) -> usize {
        match self {
            DocumentError::Invalid(err) => err.violation_count(),
            _ => 1,
        }
    }
}

/// Equipment document validator with the compiled schema
pub struct Validator {
    compiled: Option<JsonValidator>,
}

impl Validator {
    /// Create a new validator with the schema from the registry
    pub fn new(registry: &SchemaRegistry) -> Self {
        let compiled = registry
            .equipment()
            .and_then(|text| serde_json::from_str::<JsonValue>(&text).ok())
            .and_then(|schema| match validator_for(&schema) {
                Ok(compiled) => Some(compiled),
                Err(e) => {
                    warn!(error = %e, "equipment schema failed to compile; shape checks disabled");
                    None
                }
            });
        Self { compiled }
    }

    /// Validate YAML content, returning the typed document
    pub fn validate(&self, content: &str, filename: &str) -> Result<EquipmentDocument, DocumentError> {
        let yaml_value: serde_yml::Value = serde_yml::from_str(content)
            .map_err(|e| YamlSyntaxError::from_serde_error(&e, content, filename))?;

        let json_value: JsonValue = match serde_json::to_value(&yaml_value) {
            Ok(v) => v,
            Err(e) => {
                let violation = Violation::new(
                    ErrorKind::InvalidFieldType,
                    FieldPath::root(),
                    format!("document cannot be represented as JSON: {}", e),
                );
                let report = ValidationReport::single(violation);
                return Err(ValidationError::from_report(filename, content, &report).into());
            }
        };

        let shape = self.shape_violations(&json_value);
        if !shape.is_empty() {
            debug!(filename, count = shape.len(), "document failed shape check");
            let report = ValidationReport::new(shape);
            return Err(ValidationError::from_report(filename, content, &report).into());
        }

        validate_equipment(&json_value).map_err(|report| {
            debug!(filename, count = report.len(), "document failed content rules");
            ValidationError::from_report(filename, content, &report).into()
        })
    }

    /// Validate a file directly
    pub fn validate_file(&self, path: &Path) -> Result<EquipmentDocument, DocumentError> {
        let content = std::fs::read_to_string(path).map_err(|e| DocumentError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        self.validate(&content, &path.display().to_string())
    }

    fn shape_violations(&self, value: &JsonValue) -> Vec<Violation> {
        let Some(schema) = self.compiled.as_ref() else {
            return Vec::new();
        };
        schema
            .iter_errors(value)
            .map(|error| {
                Violation::new(
                    ErrorKind::InvalidFieldType,
                    FieldPath::from_pointer(error.instance_path.as_str()),
                    error.to_string(),
                )
            })
            .collect()
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(&SchemaRegistry)
    }
}

/// Suggest a fix for a violation
fn help_for(kind: ErrorKind, path: &FieldPath) -> Option<String> {
    let field = path.pointer();
    let help = match kind {
        ErrorKind::InvalidFieldType if field.ends_with("/selection_code") => {
            "quote the mask so YAML keeps it as text: selection_code: \"1100\""
        }
        ErrorKind::InvalidFieldType if field.ends_with("/package8digit") => {
            "quote the package code so YAML keeps it as text"
        }
        ErrorKind::InvalidLength => "package8digit is the first 8 characters of the 15-character package code",
        ErrorKind::InvalidMask => "selection_code is four characters, each 0 or 1, e.g. \"1100\"",
        ErrorKind::MissingField => "add the field; every variant carries all eight fields",
        ErrorKind::InvalidValidateType => "use validate_type: recipe or validate_type: tool_id",
        ErrorKind::UnknownToolPosition => "tool positions are position_1 through position_4",
        ErrorKind::UnexpectedField => "remove the field or check its spelling",
        ErrorKind::EmptyConfig => "add at least one entry under data_with_selection_code",
        ErrorKind::DuplicatePackageSelectionCode => {
            "each package_selection_code may appear once per package"
        }
        ErrorKind::DuplicatePackage8Digit => "merge the variants into a single package entry",
        _ => return None,
    };
    Some(help.to_string())
}

fn first_line_span(content: &str) -> SourceSpan {
    let len = content.find('\n').unwrap_or(content.len());
    (0, len).into()
}

/// Lines paired with the byte offset where each starts
fn lines_with_offsets(content: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    content.split_inclusive('\n').map(move |raw| {
        let start = offset;
        offset += raw.len();
        (start, raw.trim_end_matches(['\n', '\r']))
    })
}

/// Find the span for a JSON pointer in YAML content
///
/// Walks the pointer one segment at a time, searching inside the block of
/// the previous match. When a segment cannot be found (a missing field, say) the
/// deepest parent that was found is returned.
fn find_path_span(content: &str, pointer: &str) -> SourceSpan {
    let mut found: Option<SourceSpan> = None;

    for part in pointer.split('/').filter(|s| !s.is_empty()) {
        let parent = found.map(|span| span.offset());
        let span = match (part.parse::<usize>(), parent) {
            (Ok(index), Some(parent)) => find_item_span(content, parent, index),
            _ => find_key_span(content, parent, part),
        };
        match span {
            Some(span) => found = Some(span),
            None => break,
        }
    }

    found.unwrap_or_else(|| first_line_span(content))
}

/// Offset of the start of the line holding `offset`
fn line_start(content: &str, offset: usize) -> usize {
    content[..offset].rfind('\n').map_or(0, |i| i + 1)
}

/// Find `key:` inside the block opened at `parent`, or anywhere without a parent
///
/// The block ends at the first later line indented no deeper than the parent,
/// so a key missing from one list item is never matched in a sibling.
fn find_key_span(content: &str, parent: Option<usize>, key: &str) -> Option<SourceSpan> {
    let plain = format!("{}:", key);
    let quoted = format!("\"{}\":", key);
    let (from, column) = match parent {
        Some(offset) => {
            let start = line_start(content, offset);
            (start, Some(offset - start))
        }
        None => (0, None),
    };

    for (start, line) in lines_with_offsets(content).filter(|(start, _)| *start >= from) {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut column_at = line.len() - trimmed.len();
        if column.is_some_and(|column| start > from && column_at <= column) {
            return None;
        }
        let mut body = trimmed;
        if let Some(rest) = body.strip_prefix('-') {
            let rest_trimmed = rest.trim_start();
            column_at += body.len() - rest_trimmed.len();
            body = rest_trimmed;
        }
        if body.starts_with(&plain) || body.starts_with(&quoted) {
            return Some((start + column_at, body.len()).into());
        }
    }
    None
}

/// Find the `index`-th block sequence entry below the key at `parent`
///
/// Entries may sit at the key's own indent (compact sequences) or deeper.
fn find_item_span(content: &str, parent: usize, index: usize) -> Option<SourceSpan> {
    let from = line_start(content, parent);
    let column = parent - from;
    let mut item_indent = None;
    let mut count = 0;

    for (start, line) in lines_with_offsets(content).filter(|(start, _)| *start > from) {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let indent = line.len() - trimmed.len();
        let is_item = trimmed.starts_with('-');
        if indent < column || (indent == column && !is_item) {
            return None;
        }
        let expected = *item_indent.get_or_insert(indent);

        if indent < expected || (indent == expected && !is_item) {
            return None;
        }
        if indent > expected {
            continue;
        }
        if count == index {
            return Some((start + indent, trimmed.len()).into());
        }
        count += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"equipment_name: TNF-61
config:
  - package8digit: SOICW16U
    selection_code: "1100"
    data_with_selection_code:
      - package_selection_code: SOICW16UA
        operation_code: OP100
        on_operation: DIE_ATTACH
        validate_type: recipe
        recipe_name: RCP-SOIC16
        product_name: PRODUCT-A
        options:
          use_operation_code: true
          use_on_operation: false
          use_lot_hold: true
        allow_tool_id:
          position_1: [T-01, T-02]
          position_2: []
      - package_selection_code: SOICW16UB
        operation_code: OP100
        on_operation: DIE_ATTACH
        validate_type: tool_id
        recipe_name: RCP-SOIC16
        product_name: PRODUCT-B
        options:
          use_operation_code: true
          use_on_operation: true
          use_lot_hold: false
        allow_tool_id: {}
"#;

    fn validator() -> Validator {
        Validator::default()
    }

    fn invalid(result: Result<EquipmentDocument, DocumentError>) -> ValidationError {
        match result {
            Err(DocumentError::Invalid(err)) => err,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_schema_compiles() {
        assert!(validator().compiled.is_some());
    }

    #[test]
    fn test_valid_document() {
        let document = validator().validate(VALID, "tnf-61.yaml").unwrap();
        assert_eq!(document.equipment_name, "TNF-61");
        assert_eq!(document.config[0].data_with_selection_code.len(), 2);
    }

    #[test]
    fn test_syntax_error() {
        let result = validator().validate("equipment_name: [oops\n", "bad.yaml");
        assert!(matches!(result, Err(DocumentError::Syntax(_))));
    }

    #[test]
    fn test_unquoted_mask_is_a_type_error_with_help() {
        let content = VALID.replace("selection_code: \"1100\"", "selection_code: 1100");
        let err = invalid(validator().validate(&content, "tnf-61.yaml"));

        assert_eq!(err.violation_count(), 1);
        let violation = &err.violations()[0];
        assert_eq!(violation.kind(), ErrorKind::InvalidFieldType);
        assert_eq!(violation.path().to_string(), "config[0].selection_code");
        assert!(violation.help.as_deref().unwrap().contains("quote"));
    }

    #[test]
    fn test_content_errors_are_all_reported() {
        let content = VALID
            .replace("package8digit: SOICW16U", "package8digit: SOIC")
            .replace("validate_type: tool_id", "validate_type: both")
            .replace("position_2: []", "position_5: []");
        let err = invalid(validator().validate(&content, "tnf-61.yaml"));

        let kinds: Vec<ErrorKind> = err.violations().iter().map(|v| v.kind()).collect();
        assert!(kinds.contains(&ErrorKind::InvalidLength));
        assert!(kinds.contains(&ErrorKind::InvalidValidateType));
        assert!(kinds.contains(&ErrorKind::UnknownToolPosition));
        assert_eq!(err.violation_count(), 3);
    }

    #[test]
    fn test_violation_span_points_at_field() {
        let content = VALID.replacen("recipe_name: RCP-SOIC16", "recipe_name: \"\"", 1);
        let err = invalid(validator().validate(&content, "tnf-61.yaml"));

        let span = err.violations()[0].span;
        let at = &content[span.offset()..span.offset() + span.len()];
        assert!(at.starts_with("recipe_name:"), "span covered {:?}", at);
    }

    #[test]
    fn test_find_path_span_follows_indexes() {
        let span = find_path_span(VALID, "/config/0/data_with_selection_code/1/product_name");
        let at = &VALID[span.offset()..span.offset() + span.len()];
        assert_eq!(at, "product_name: PRODUCT-B");

        let missing = find_path_span(VALID, "/config/0/data_with_selection_code/1/nothing");
        let at = &VALID[missing.offset()..missing.offset() + missing.len()];
        assert!(at.starts_with("- package_selection_code: SOICW16UB"));
    }

    #[test]
    fn test_find_key_span() {
        let content = "equipment_name: TNF-61\nconfig: []\n";
        let span = find_key_span(content, None, "config").unwrap();
        assert_eq!(span.offset(), 23);
        assert!(find_key_span(content, None, "missing").is_none());
    }

    const MISSING_OPERATION: &str = r#"equipment_name: TNF-61
config:
  - package8digit: SOICW16U
    selection_code: "1100"
    data_with_selection_code:
      - package_selection_code: SOICW16UA
        on_operation: DIE_ATTACH
      - package_selection_code: SOICW16UB
        operation_code: OP200
        on_operation: DIE_ATTACH
"#;

    fn span_text(content: &str, span: SourceSpan) -> &str {
        &content[span.offset()..span.offset() + span.len()]
    }

    #[test]
    fn test_missing_key_stays_inside_its_item() {
        let span = find_path_span(
            MISSING_OPERATION,
            "/config/0/data_with_selection_code/0/operation_code",
        );
        assert_eq!(span_text(MISSING_OPERATION, span), "- package_selection_code: SOICW16UA");

        let span = find_path_span(
            MISSING_OPERATION,
            "/config/0/data_with_selection_code/1/operation_code",
        );
        assert_eq!(span_text(MISSING_OPERATION, span), "operation_code: OP200");
    }

    #[test]
    fn test_item_search_stops_at_inline_empty_list() {
        let content = "config:\n  - package8digit: A\n    data_with_selection_code: []\n  - package8digit: B\n";
        let span = find_path_span(content, "/config/0/data_with_selection_code/0");
        assert_eq!(span_text(content, span), "data_with_selection_code: []");
    }
}
