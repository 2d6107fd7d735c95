//! YAML syntax errors with source spans

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// YAML syntax error with source location
#[derive(Debug, Error, Diagnostic)]
#[error("YAML syntax error: {message}")]
#[diagnostic(code(lotguard::yaml::syntax))]
pub struct YamlSyntaxError {
    #[source_code]
    src: NamedSource<String>,

    #[label("error here")]
    span: SourceSpan,

    #[help]
    help: Option<String>,

    message: String,
}

impl YamlSyntaxError {
    /// Create a syntax error from a serde_yml error
    pub fn from_serde_error(err: &serde_yml::Error, source: &str, filename: &str) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((1, 1));

        let offset = line_col_to_offset(source, line, column);
        let message = err.to_string();
        let help = generate_help(&message);

        Self {
            src: NamedSource::new(filename, source.to_string()),
            span: SourceSpan::from(offset..(offset + 1).min(source.len()).max(offset)),
            help,
            message,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Convert a 1-based line/column to a byte offset, clamped to the source
pub(crate) fn line_col_to_offset(source: &str, line: usize, column: usize) -> usize {
    let mut line_start = 0;
    for (i, text) in source.split_inclusive('\n').enumerate() {
        if i + 1 == line {
            let body = text.trim_end_matches(['\n', '\r']);
            let col = body
                .char_indices()
                .nth(column.saturating_sub(1))
                .map(|(j, _)| j)
                .unwrap_or(body.len());
            return line_start + col;
        }
        line_start += text.len();
    }
    source.len()
}

/// Suggest a fix for common mistakes in hand-written equipment documents
fn generate_help(message: &str) -> Option<String> {
    let msg_lower = message.to_lowercase();

    if msg_lower.contains("tab") {
        return Some("YAML requires spaces for indentation, not tabs".to_string());
    }

    if msg_lower.contains("duplicate") && msg_lower.contains("key") {
        return Some(
            "Each key may appear once per mapping; start a new '- ' entry for another variant"
                .to_string(),
        );
    }

    if msg_lower.contains("did not find expected '-'") || msg_lower.contains("expected block end") {
        return Some(
            "Check indentation: list entries under data_with_selection_code must line up".to_string(),
        );
    }

    if msg_lower.contains("mapping values are not allowed") {
        return Some("You may be missing a space after ':' or have incorrect indentation".to_string());
    }

    if msg_lower.contains("expected ','") {
        return Some("Separate tool ids with commas: [T-01, T-02]".to_string());
    }

    None
}
