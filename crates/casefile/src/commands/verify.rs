//! Check data rows for missing content

use clap::Args;

use casefile::verify;

use super::{CommandResult, StoreArgs, finish};

/// Check data rows for missing content and dangling blob pointers
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Only check rows of this exhibit
    exhibit_id: Option<String>,

    #[command(flatten)]
    stores: StoreArgs,
}

pub fn run(args: VerifyArgs) -> CommandResult {
    let rows = args.stores.open_rows()?;
    let blobs = args.stores.open_blobs()?;

    let report = finish(verify(&rows, &blobs, args.exhibit_id.as_deref()), rows.close())?;

    eprintln!("Checked {} regular file rows", report.checked);
    for key in &report.missing_content {
        println!("missing-content\t{key}");
    }
    for key in &report.missing_blobs {
        println!("missing-blob\t{key}");
    }

    if !report.is_clean() {
        return Err(format!(
            "{} rows need repair",
            report.missing_content.len() + report.missing_blobs.len()
        )
        .into());
    }
    Ok(())
}
