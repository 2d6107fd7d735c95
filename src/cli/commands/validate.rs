//! `lotguard validate` command - Validate equipment documents
//!
//! Each document goes through the YAML parser, the embedded JSON Schema and
//! the domain rules; names are then checked for uniqueness across documents.

use console::style;
use miette::Result;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::cli::helpers::open_project;
use crate::cli::GlobalOpts;
use crate::core::loader::document_files;
use crate::core::Config;
use crate::schema::registry::SchemaRegistry;
use crate::schema::validator::Validator;

#[derive(clap::Args, Debug)]
pub struct ValidateArgs {
    /// Files or directories to validate (default: the project's equipment documents)
    #[arg()]
    pub paths: Vec<PathBuf>,

    /// Continue validation after first error
    #[arg(long)]
    pub keep_going: bool,

    /// Show summary only, don't show individual errors
    #[arg(long)]
    pub summary: bool,
}

/// Validation statistics
#[derive(Default)]
struct ValidationStats {
    files_checked: usize,
    files_passed: usize,
    files_failed: usize,
    total_errors: usize,
}

impl ValidationStats {
    fn fail(&mut self, errors: usize) {
        self.files_failed += 1;
        self.total_errors += errors;
    }
}

pub fn run(args: ValidateArgs, global: &GlobalOpts) -> Result<()> {
    let (files, config) = if args.paths.is_empty() {
        let project = open_project(global)?;
        let config = Config::load_for(Some(&project));
        (document_files(&project.equipment_dir()), config)
    } else {
        let config = Config::load_for(open_project(global).ok().as_ref());
        (expand_paths(&args.paths), config)
    };

    let options = config.repository_options();
    let validator = Validator::new(&SchemaRegistry::default());
    let mut stats = ValidationStats::default();
    let mut seen_names: Vec<(String, PathBuf)> = Vec::new();

    if !global.quiet {
        println!(
            "{} Validating {} file(s)...\n",
            style("→").blue(),
            files.len()
        );
    }

    for path in &files {
        stats.files_checked += 1;

        match validator.validate_file(path) {
            Ok(doc) => {
                let clash = seen_names
                    .iter()
                    .find(|(name, _)| options.same_name(name, &doc.equipment_name))
                    .map(|(_, first)| first.clone());

                match clash {
                    Some(first) => {
                        stats.fail(1);
                        if !args.summary {
                            println!(
                                "{} {} - equipment_name '{}' already used by {}",
                                style("✗").red(),
                                path.display(),
                                doc.equipment_name,
                                first.display()
                            );
                        }
                        if !args.keep_going {
                            break;
                        }
                    }
                    None => {
                        debug!(path = %path.display(), name = %doc.equipment_name, "document valid");
                        seen_names.push((doc.equipment_name, path.clone()));
                        stats.files_passed += 1;
                        if !args.summary && !global.quiet {
                            println!("{} {}", style("✓").green(), path.display());
                        }
                    }
                }
            }
            Err(e) => {
                stats.fail(e.violation_count());

                if !args.summary {
                    println!(
                        "{} {} - {} error(s)",
                        style("✗").red(),
                        path.display(),
                        e.violation_count()
                    );

                    let report = miette::Report::new(e);
                    println!("{:?}", report);
                }

                if !args.keep_going {
                    break;
                }
            }
        }
    }

    if !global.quiet {
        print_summary(&stats);
    }

    match stats.files_failed {
        0 => {
            if !global.quiet {
                println!(
                    "{} All files passed validation!",
                    style("✓").green().bold()
                );
            }
            Ok(())
        }
        1 => Err(miette::miette!("Validation failed: 1 file has errors")),
        n => Err(miette::miette!("Validation failed: {} files have errors", n)),
    }
}

fn print_summary(stats: &ValidationStats) {
    println!();
    println!("{}", style("─".repeat(60)).dim());
    println!("{}", style("Validation Summary").bold());
    println!("{}", style("─".repeat(60)).dim());
    println!("  Files checked:  {}", style(stats.files_checked).cyan());
    println!("  Files passed:   {}", style(stats.files_passed).green());
    println!("  Files failed:   {}", style(stats.files_failed).red());
    println!("  Total errors:   {}", style(stats.total_errors).red());
    println!();
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Expand paths - if a directory is given, find all YAML files in it
fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.') || e.depth() == 0)
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_yaml(e.path()))
                .map(|e| e.path().to_path_buf())
                .collect();
            found.sort();
            files.extend(found);
        } else {
            // Missing files are reported as read errors by the validator
            files.push(path.clone());
        }
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_expand_paths_finds_yaml_and_skips_hidden() {
        let tmp = tempdir().unwrap();
        std::fs::write(tmp.path().join("b.lg.yaml"), "").unwrap();
        std::fs::write(tmp.path().join("a.yml"), "").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "").unwrap();
        std::fs::create_dir(tmp.path().join(".hidden")).unwrap();
        std::fs::write(tmp.path().join(".hidden/c.yaml"), "").unwrap();

        let files = expand_paths(&[tmp.path().to_path_buf()]);
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.yml", "b.lg.yaml"]);
    }

    #[test]
    fn test_expand_paths_keeps_explicit_files() {
        let files = expand_paths(&[PathBuf::from("missing.yaml")]);
        assert_eq!(files, vec![PathBuf::from("missing.yaml")]);
    }
}
