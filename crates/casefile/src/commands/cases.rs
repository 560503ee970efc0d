//! List registered cases and their exhibits

use clap::Args;

use casefile::CaseRegistry;

use super::{CommandResult, StoreArgs};

/// List registered cases and their exhibits
#[derive(Args, Debug)]
pub struct CasesArgs {
    /// Print the listing as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    stores: StoreArgs,
}

pub fn run(args: CasesArgs) -> CommandResult {
    let rows = args.stores.open_rows()?;
    let registry = CaseRegistry::new(&rows);
    registry.create_schema()?;
    let listing = registry.list_cases_and_exhibits()?;

    if args.json {
        let entries: Vec<_> = listing
            .iter()
            .map(|(case, exhibits)| serde_json::json!({ "case": case, "exhibits": exhibits }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if listing.is_empty() {
        eprintln!("No cases registered");
    }

    for (case, exhibits) in &listing {
        println!(
            "Case {}: {}{}{}",
            case.id,
            case.number,
            case.name
                .as_deref()
                .map(|n| format!(" \"{n}\""))
                .unwrap_or_default(),
            case.examiner
                .as_deref()
                .map(|e| format!(" (examiner: {e})"))
                .unwrap_or_default(),
        );

        for exhibit in exhibits {
            println!(
                "  Exhibit {}: {} imported {} -> {}",
                exhibit.id,
                exhibit.name.as_deref().unwrap_or("(unnamed)"),
                exhibit.import_date,
                exhibit.base_path,
            );
            if let Some(totals) = exhibit.totals {
                println!(
                    "    {} rows, {} inline ({} bytes), {} external ({} bytes), {} failed",
                    totals.rows,
                    totals.inline_files,
                    totals.inline_bytes,
                    totals.external_files,
                    totals.external_bytes,
                    totals.failed_files,
                );
            }
        }
    }

    Ok(())
}
