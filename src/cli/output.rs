//! Rendering of equipment records in the supported output formats

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{escape_csv, format_short_id, truncate_str};
use crate::cli::OutputFormat;
use crate::core::repository::Page;
use crate::entities::{EquipmentConfig, MatchRule};

/// Print a single record; `format` must already be resolved
pub fn print_record(record: &EquipmentConfig, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(record).into_diagnostic()?;
            println!("{}", json);
        }
        OutputFormat::Id => println!("{}", record.id),
        OutputFormat::Yaml | OutputFormat::Auto => {
            let yaml = serde_yml::to_string(record).into_diagnostic()?;
            print!("{}", yaml);
        }
        OutputFormat::Tsv => print_tsv(std::slice::from_ref(record)),
        OutputFormat::Csv | OutputFormat::Md => print_summary(record),
    }
    Ok(())
}

/// Human-readable breakdown of one record
pub fn print_summary(record: &EquipmentConfig) {
    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("ID").bold(), style(&record.id).cyan());
    println!(
        "{}: {}",
        style("Equipment").bold(),
        style(&record.equipment_name).yellow()
    );
    println!(
        "{}: {}  {}: {}",
        style("Packages").bold(),
        record.config.len(),
        style("Variants").bold(),
        record.variant_count()
    );
    println!(
        "{}: {} (rev {})",
        style("Updated").bold(),
        record.updated.format("%Y-%m-%d %H:%M:%S UTC"),
        record.revision
    );
    println!("{}", style("─".repeat(60)).dim());

    for package in &record.config {
        println!();
        println!(
            "{} {}  mask {}",
            style("Package").bold(),
            style(&package.package8digit).cyan(),
            package.selection_code
        );
        for variant in &package.data_with_selection_code {
            let rule = match variant.rule() {
                MatchRule::Recipe {
                    recipe_name,
                    product_name,
                } => format!("recipe {} / product {}", recipe_name, product_name),
                MatchRule::ToolId { allow } => {
                    let restricted = allow
                        .iter()
                        .filter(|(_, ids)| !ids.is_empty())
                        .map(|(position, ids)| format!("{}={}", position.as_str(), ids.join("|")))
                        .collect::<Vec<_>>();
                    if restricted.is_empty() {
                        "tool id (unrestricted)".to_string()
                    } else {
                        format!("tool id {}", restricted.join(" "))
                    }
                }
            };
            println!(
                "  {:<16} op {:<8} on {:<8} {}",
                variant.package_selection_code, variant.operation_code, variant.on_operation, rule
            );
        }
    }
}

/// Print one page of a listing
pub fn print_page(page: &Page<EquipmentConfig>, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(page).into_diagnostic()?;
            println!("{}", json);
        }
        OutputFormat::Yaml => {
            let yaml = serde_yml::to_string(page).into_diagnostic()?;
            print!("{}", yaml);
        }
        OutputFormat::Id => {
            for record in &page.items {
                println!("{}", record.id);
            }
        }
        OutputFormat::Csv => {
            println!("id,equipment_name,packages,variants,revision,updated");
            for record in &page.items {
                println!(
                    "{},{},{},{},{},{}",
                    record.id,
                    escape_csv(&record.equipment_name),
                    escape_csv(&package_codes(record)),
                    record.variant_count(),
                    record.revision,
                    record.updated.to_rfc3339()
                );
            }
        }
        OutputFormat::Md => {
            println!("| ID | Equipment | Packages | Variants | Rev |");
            println!("|---|---|---|---|---|");
            for record in &page.items {
                println!(
                    "| {} | {} | {} | {} | {} |",
                    format_short_id(&record.id),
                    record.equipment_name,
                    package_codes(record),
                    record.variant_count(),
                    record.revision
                );
            }
        }
        OutputFormat::Tsv => print_tsv(&page.items),
        OutputFormat::Auto => {
            println!(
                "{:<17} {:<24} {:<28} {:<8} {:<4}",
                style("ID").bold(),
                style("EQUIPMENT").bold(),
                style("PACKAGES").bold(),
                style("VARIANTS").bold(),
                style("REV").bold()
            );
            println!("{}", "-".repeat(85));
            for record in &page.items {
                println!(
                    "{:<17} {:<24} {:<28} {:<8} {:<4}",
                    format_short_id(&record.id),
                    truncate_str(&record.equipment_name, 22),
                    truncate_str(&package_codes(record), 26),
                    record.variant_count(),
                    record.revision
                );
            }
            println!();
            println!(
                "{} of {} equipment config(s), page {}/{}",
                style(page.items.len()).cyan(),
                page.total,
                page.page,
                page.page_count().max(1)
            );
        }
    }
    Ok(())
}

/// Tab-separated rows with a header, for piping
fn print_tsv(records: &[EquipmentConfig]) {
    println!("id\tequipment_name\tpackages\tvariants\trevision\tupdated");
    for record in records {
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            record.id,
            tsv_field(&record.equipment_name),
            package_codes(record),
            record.variant_count(),
            record.revision,
            record.updated.to_rfc3339()
        );
    }
}

/// Tabs and newlines would break the row layout
fn tsv_field(s: &str) -> String {
    s.replace(['\t', '\n', '\r'], " ")
}

fn package_codes(record: &EquipmentConfig) -> String {
    record
        .config
        .iter()
        .map(|p| p.package8digit.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
