//! `lotguard derive` command - package-selection identifier from a package code

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::selection::{
    decompose, derive_package_selection_code, PackageCodeParts, SelectionMask,
};

#[derive(clap::Args, Debug)]
pub struct DeriveArgs {
    /// 15-character package code (e.g. SOICW16U0001AB1)
    pub code: String,

    /// 4-digit selection mask: base, special mold, depopulate pin, plate type
    pub mask: String,

    /// Also show how the code was split
    #[arg(long, short = 'e')]
    pub explain: bool,
}

#[derive(Serialize)]
struct Derivation<'a> {
    code: &'a str,
    mask: SelectionMask,
    package_selection_code: String,
    parts: PackageCodeParts,
}

pub fn run(args: DeriveArgs, global: &GlobalOpts) -> Result<()> {
    let package_selection_code = derive_package_selection_code(&args.code, &args.mask)?;
    let mask = SelectionMask::parse(&args.mask)?;
    let derived = Derivation {
        code: &args.code,
        mask,
        package_selection_code,
        parts: decompose(&args.code)?,
    };

    match global.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&derived).into_diagnostic()?;
            println!("{}", json);
        }
        OutputFormat::Yaml => {
            let yaml = serde_yml::to_string(&derived).into_diagnostic()?;
            print!("{}", yaml);
        }
        _ => {
            println!("{}", derived.package_selection_code);
            if args.explain && !global.quiet {
                let p = &derived.parts;
                eprintln!();
                eprintln!("  {:<16} {}", style("base").dim(), p.base);
                eprintln!("  {:<16} {}", style("sequence").dim(), p.sequence);
                eprintln!(
                    "  {:<16} {} {}",
                    style("special mold").dim(),
                    p.special_mold,
                    used(mask.uses_special_mold())
                );
                eprintln!(
                    "  {:<16} {} {}",
                    style("depopulate pin").dim(),
                    p.depopulate_pin,
                    used(mask.uses_depopulate_pin())
                );
                eprintln!(
                    "  {:<16} {} {}",
                    style("plate type").dim(),
                    p.plate_type,
                    used(mask.uses_plate_type())
                );
            }
        }
    }
    Ok(())
}

fn used(selected: bool) -> console::StyledObject<&'static str> {
    if selected {
        style("✓").green()
    } else {
        style("-").dim()
    }
}
