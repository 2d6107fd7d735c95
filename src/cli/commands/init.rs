//! `lotguard init` command - Initialize a new lotguard project

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::{Path, PathBuf};

use crate::core::project::{Project, ProjectError, EQUIPMENT_DIR, MARKER_DIR};

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Reinitialize even if .lotguard/ already exists (documents are kept)
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).into_diagnostic()?;
        println!(
            "{} Created directory {}",
            style("✓").green(),
            style(path.display()).cyan()
        );
    }

    let project = if args.force {
        Project::init_force(&path)
    } else {
        Project::init(&path)
    };

    match project {
        Ok(project) => {
            println!(
                "{} Initialized lotguard project at {}",
                style("✓").green(),
                style(project.root().display()).cyan()
            );
            println!();
            println!("Created project structure:");
            print_structure(project.root());
            println!();
            println!("Next steps:");
            println!(
                "  {} Scaffold an equipment document",
                style("lotguard eqp template --name <NAME>").yellow()
            );
            println!(
                "  {} Register it",
                style("lotguard eqp new --file <DOC.yaml>").yellow()
            );
            println!(
                "  {} Validate stored documents",
                style("lotguard validate").yellow()
            );
            Ok(())
        }
        Err(ProjectError::AlreadyExists(path)) => {
            println!(
                "{} lotguard project already exists at {}",
                style("!").yellow(),
                style(path.display()).cyan()
            );
            println!();
            println!(
                "Use {} to reinitialize",
                style("lotguard init --force").yellow()
            );
            Ok(())
        }
        Err(e) => Err(miette::miette!("{}", e)),
    }
}

fn print_structure(root: &Path) {
    let entries = [
        format!("{}/", MARKER_DIR),
        format!("{}/config.yaml", MARKER_DIR),
        format!("{}/", EQUIPMENT_DIR),
    ];

    for entry in &entries {
        if root.join(entry).exists() {
            let prefix = if entry.ends_with('/') { "📁" } else { "📄" };
            println!("  {} {}", prefix, style(entry).dim());
        }
    }
}
