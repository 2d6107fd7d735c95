//! `lotguard eqp` command - Equipment config management

use clap::Subcommand;
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::cli::helpers::{format_short_id, open_repository};
use crate::cli::output::{print_page, print_record};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::error::ConfigError;
use crate::core::repository::{EquipmentFilter, EquipmentUpdate, ListQuery, SortField, SortOrder};
use crate::core::selection::{decompose, PackageCodeParts, SelectionMask};
use crate::entities::{PackageConfig, ValidateType, ValidationVariant};
use crate::schema::draft::EquipmentDocument;
use crate::schema::registry::SchemaRegistry;
use crate::schema::template::{TemplateContext, TemplateGenerator};
use crate::schema::validator::Validator;

#[derive(Subcommand, Debug)]
pub enum EqpCommands {
    /// List equipment configs with filtering, sorting and paging
    List(ListArgs),

    /// Register a new equipment config from a YAML document
    New(NewArgs),

    /// Show an equipment config
    Show(ShowArgs),

    /// Replace the name and/or package list of an equipment config
    Update(UpdateArgs),

    /// Delete an equipment config (irreversible)
    Delete(DeleteArgs),

    /// Find the variant that applies to a 15-character package code
    Resolve(ResolveArgs),

    /// Print a scaffold document for a new equipment config
    Template(TemplateArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Case-insensitive substring of the equipment name
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Only configs containing this package8digit
    #[arg(long, short = 'p')]
    pub package: Option<String>,

    /// Sort field
    #[arg(long, value_enum, default_value_t = SortField::Created)]
    pub sort: SortField,

    /// Reverse sort order
    #[arg(long, short = 'r')]
    pub reverse: bool,

    /// Page number (1-based)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub page: u32,

    /// Rows per page (default: page_size from config)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub page_size: Option<u32>,

    /// Show count only
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Equipment document to register ("-" reads stdin)
    #[arg(long, short = 'F')]
    pub file: PathBuf,

    /// Override the document's equipment_name
    #[arg(long, short = 'n')]
    pub name: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Equipment config ID or equipment name
    pub target: String,
}

#[derive(clap::Args, Debug)]
#[command(group(
    clap::ArgGroup::new("change")
        .required(true)
        .multiple(true)
        .args(["file", "name"])
))]
pub struct UpdateArgs {
    /// Equipment config ID or equipment name
    pub target: String,

    /// Document whose package list replaces the stored one ("-" reads stdin)
    #[arg(long, short = 'F')]
    pub file: Option<PathBuf>,

    /// New equipment name (default: the document's equipment_name)
    #[arg(long, short = 'n')]
    pub name: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Equipment config ID or equipment name
    pub target: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(clap::Args, Debug)]
pub struct ResolveArgs {
    /// Equipment config ID or equipment name
    pub target: String,

    /// 15-character package code
    pub code: String,
}

#[derive(clap::Args, Debug)]
pub struct TemplateArgs {
    /// Equipment name for the scaffold
    #[arg(long, short = 'n')]
    pub name: String,

    /// Base package code (package8digit)
    #[arg(long, short = 'p', conflicts_with = "code")]
    pub package: Option<String>,

    /// Sample 15-character package code to derive the first identifier from
    #[arg(long, short = 'c')]
    pub code: Option<String>,

    /// Selection mask for the package
    #[arg(long, short = 'm')]
    pub mask: Option<String>,

    /// Validate type of the first variant (recipe or tool_id)
    #[arg(long, short = 't', default_value = "recipe")]
    pub validate_type: ValidateType,

    /// Write to this file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

pub fn run(cmd: EqpCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        EqpCommands::List(args) => run_list(args, global),
        EqpCommands::New(args) => run_new(args, global),
        EqpCommands::Show(args) => run_show(args, global),
        EqpCommands::Update(args) => run_update(args, global),
        EqpCommands::Delete(args) => run_delete(args, global),
        EqpCommands::Resolve(args) => run_resolve(args, global),
        EqpCommands::Template(args) => run_template(args),
    }
}

/// Read and fully validate a document from a file or stdin
fn read_document(path: &Path) -> Result<EquipmentDocument> {
    let validator = Validator::new(&SchemaRegistry::default());
    let doc = if path.as_os_str() == "-" {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .into_diagnostic()?;
        validator.validate(&content, "<stdin>")?
    } else {
        validator.validate_file(path)?
    };
    Ok(doc)
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let (_project, config, repo) = open_repository(global)?;

    let query = ListQuery {
        filter: EquipmentFilter {
            name_contains: args.search,
            package8digit: args.package,
        },
        page: args.page as usize,
        page_size: args
            .page_size
            .map(|n| n as usize)
            .unwrap_or_else(|| config.page_size()),
        sort: args.sort,
        order: if args.reverse {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        },
    };

    let page = repo.list(&query)?;

    if args.count {
        println!("{}", page.total);
        return Ok(());
    }

    if page.total == 0 {
        if !global.quiet {
            println!("No equipment configs found.");
        }
        return Ok(());
    }

    let format = global
        .format
        .resolve(config.default_format.as_deref(), OutputFormat::Auto);
    print_page(&page, format)
}

fn run_new(args: NewArgs, global: &GlobalOpts) -> Result<()> {
    let (_project, config, repo) = open_repository(global)?;

    let doc = read_document(&args.file)?;
    if let Some(ref id) = doc.id {
        warn!(%id, "ignoring id in document; a new id is assigned");
    }

    let mut input = doc.into_new();
    if let Some(name) = args.name {
        input.equipment_name = name;
    }

    let record = repo.create(input)?;

    let format = global
        .format
        .resolve(config.default_format.as_deref(), OutputFormat::Auto);
    match format {
        OutputFormat::Json | OutputFormat::Yaml | OutputFormat::Id => print_record(&record, format),
        _ => {
            if global.quiet {
                println!("{}", record.id);
            } else {
                println!(
                    "{} Created equipment config {} for {}",
                    style("✓").green(),
                    style(format_short_id(&record.id)).cyan(),
                    style(&record.equipment_name).yellow()
                );
                println!(
                    "   {} package(s), {} variant(s)",
                    record.config.len(),
                    record.variant_count()
                );
                println!("   {}", style(&record.id).dim());
            }
            Ok(())
        }
    }
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let (_project, config, repo) = open_repository(global)?;
    let record = repo.resolve(&args.target)?;

    let format = global
        .format
        .resolve(config.default_format.as_deref(), OutputFormat::Yaml);
    print_record(&record, format)
}

fn run_update(args: UpdateArgs, global: &GlobalOpts) -> Result<()> {
    let (_project, config, repo) = open_repository(global)?;
    let current = repo.resolve(&args.target)?;

    let mut update = EquipmentUpdate {
        equipment_name: args.name,
        config: None,
    };
    if let Some(ref path) = args.file {
        let doc = read_document(path)?;
        if let Some(id) = doc.id.filter(|id| *id != current.id) {
            warn!(%id, target = %current.id, "document id differs from the updated config");
        }
        update.equipment_name.get_or_insert(doc.equipment_name);
        update.config = Some(doc.config);
    }

    let record = repo.update(&current.id, update)?;

    let format = global
        .format
        .resolve(config.default_format.as_deref(), OutputFormat::Auto);
    match format {
        OutputFormat::Json | OutputFormat::Yaml | OutputFormat::Id => print_record(&record, format),
        _ => {
            if !global.quiet {
                println!(
                    "{} Updated {} ({}) to revision {}",
                    style("✓").green(),
                    style(format_short_id(&record.id)).cyan(),
                    style(&record.equipment_name).yellow(),
                    record.revision
                );
            }
            Ok(())
        }
    }
}

fn run_delete(args: DeleteArgs, global: &GlobalOpts) -> Result<()> {
    let (_project, _config, repo) = open_repository(global)?;
    let record = repo.resolve(&args.target)?;

    if !args.yes {
        if !console::user_attended() {
            return Err(miette::miette!(
                "refusing to delete {} without confirmation; pass --yes",
                record.id
            ));
        }
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "Delete {} ({}) permanently?",
                record.equipment_name,
                format_short_id(&record.id)
            ))
            .default(false)
            .interact()
            .into_diagnostic()?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    let removed = repo.delete(&record.id)?;
    if !global.quiet {
        println!(
            "{} Deleted {} ({})",
            style("✓").green(),
            style(&removed.id).cyan(),
            removed.equipment_name
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct Resolution<'a> {
    equipment_id: String,
    equipment_name: &'a str,
    code: &'a str,
    parts: PackageCodeParts,
    package8digit: &'a str,
    selection_code: SelectionMask,
    variant: &'a ValidationVariant,
}

fn run_resolve(args: ResolveArgs, global: &GlobalOpts) -> Result<()> {
    let (_project, _config, repo) = open_repository(global)?;
    let record = repo.resolve(&args.target)?;
    let parts = decompose(&args.code)?;

    let (package, variant) = match record.resolve_variant(&args.code)? {
        Some(found) => found,
        None => {
            let package = record.package(&parts.base);
            return Err(unresolved(&record.equipment_name, &args.code, &parts, package).into());
        }
    };

    let resolution = Resolution {
        equipment_id: record.id.to_string(),
        equipment_name: &record.equipment_name,
        code: &args.code,
        parts,
        package8digit: &package.package8digit,
        selection_code: package.selection_code,
        variant,
    };

    match global.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&resolution).into_diagnostic()?;
            println!("{}", json);
        }
        OutputFormat::Yaml => {
            let yaml = serde_yml::to_string(&resolution).into_diagnostic()?;
            print!("{}", yaml);
        }
        _ => {
            println!("{}", variant.package_selection_code);
            if !global.quiet {
                println!(
                    "  {:<16} {} (mask {})",
                    style("package").dim(),
                    package.package8digit,
                    package.selection_code
                );
                println!("  {:<16} {}", style("validate type").dim(), variant.validate_type);
                println!("  {:<16} {}", style("operation").dim(), variant.operation_code);
                println!("  {:<16} {}", style("on operation").dim(), variant.on_operation);
            }
        }
    }
    Ok(())
}

fn unresolved(
    equipment_name: &str,
    code: &str,
    parts: &PackageCodeParts,
    package: Option<&PackageConfig>,
) -> ConfigError {
    match package {
        None => ConfigError::not_found(format!(
            "package {} on equipment {}",
            parts.base, equipment_name
        )),
        Some(package) => ConfigError::not_found(format!(
            "variant {} (from {}) on equipment {}",
            parts.selection_code(package.selection_code),
            code,
            equipment_name
        )),
    }
}

fn run_template(args: TemplateArgs) -> Result<()> {
    let mask = args
        .mask
        .as_deref()
        .map(SelectionMask::parse)
        .transpose()?;

    let mut ctx = TemplateContext::new(&args.name).with_validate_type(args.validate_type);
    if let Some(ref code) = args.code {
        ctx = ctx.with_source_code(code, mask.unwrap_or(SelectionMask::BASE_ONLY))?;
    } else if let Some(ref package) = args.package {
        ctx = ctx.with_package(package);
        if let Some(mask) = mask.filter(|m| *m != SelectionMask::BASE_ONLY) {
            // The identifier needs a sample code to derive; leave it for the author
            ctx.selection_code = mask;
            ctx.package_selection_code.clear();
        }
    } else if let Some(mask) = mask {
        ctx.selection_code = mask;
    }

    let generator = TemplateGenerator::new().map_err(|e| miette::miette!("{}", e))?;
    let yaml = generator
        .generate_equipment(&ctx)
        .map_err(|e| miette::miette!("{}", e))?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, &yaml).into_diagnostic()?;
            println!(
                "{} Wrote scaffold to {}",
                style("✓").green(),
                style(path.display()).cyan()
            );
        }
        None => print!("{}", yaml),
    }
    Ok(())
}
