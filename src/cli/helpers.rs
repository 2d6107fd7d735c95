//! Shared helper functions for CLI commands
//!
//! This module contains utility functions that are used across multiple
//! command modules to avoid code duplication.

use miette::Result;

use crate::cli::GlobalOpts;
use crate::core::identity::ConfigId;
use crate::core::project::Project;
use crate::core::repository::EquipmentRepository;
use crate::core::store::YamlStore;
use crate::core::Config;

/// Repository backed by the project's equipment directory
pub type ProjectRepository = EquipmentRepository<YamlStore>;

/// Find the project from `--project` or by walking up from the working directory
pub fn open_project(global: &GlobalOpts) -> Result<Project> {
    let project = match global.project {
        Some(ref path) => Project::discover_from(path),
        None => Project::discover(),
    };
    project.map_err(|e| miette::miette!("{}", e))
}

/// Open the project, its layered config and the equipment repository
pub fn open_repository(global: &GlobalOpts) -> Result<(Project, Config, ProjectRepository)> {
    let project = open_project(global)?;
    let config = Config::load_for(Some(&project));
    let store = YamlStore::for_project(&project, config.lock_timeout());
    let repo = EquipmentRepository::with_options(store, config.repository_options());
    Ok((project, config, repo))
}

/// Format a ConfigId for display, truncating if too long
///
/// IDs are 30 characters; tables show the first 13 with a "..." suffix.
pub fn format_short_id(id: &ConfigId) -> String {
    let s = id.to_string();
    if s.len() > 16 {
        format!("{}...", &s[..13])
    } else {
        s
    }
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Escape a string for CSV output
///
/// Handles commas, quotes, and newlines according to RFC 4180.
pub fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_short_id() {
        let id = ConfigId::new();
        let formatted = format_short_id(&id);
        assert_eq!(formatted.len(), 16);
        assert!(formatted.starts_with("EQP-"));
        assert!(formatted.ends_with("..."));
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hi", 2), "hi");
        assert_eq!(truncate_str("ÄÖÜÄÖÜ", 5), "ÄÖ...");
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv("with\"quote"), "\"with\"\"quote\"");
        assert_eq!(escape_csv("with\nnewline"), "\"with\nnewline\"");
    }
}
