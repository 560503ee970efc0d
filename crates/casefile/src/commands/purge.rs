//! Remove a case with all its exhibits and data rows

use clap::Args;

use casefile::CaseRegistry;

use super::{CommandResult, StoreArgs, finish};

/// Remove a case with all its exhibits and data rows
#[derive(Args, Debug)]
pub struct PurgeArgs {
    /// Case id (as shown by `casefile cases`)
    case_id: String,

    /// Confirm the purge
    #[arg(long)]
    yes: bool,

    #[command(flatten)]
    stores: StoreArgs,
}

pub fn run(args: PurgeArgs) -> CommandResult {
    if !args.yes {
        return Err(format!("Refusing to purge case {} without --yes", args.case_id).into());
    }

    let rows = args.stores.open_rows()?;
    let result = CaseRegistry::new(&rows).purge_case(&args.case_id);
    let report = finish(result, rows.close())?;

    eprintln!("Purged case {}", args.case_id);
    eprintln!("  Exhibits: {}", report.exhibits.len());
    eprintln!("  Data rows: {}", report.data_rows);
    for path in &report.blob_paths {
        eprintln!("  Blob content left at: {path}");
    }

    Ok(())
}
