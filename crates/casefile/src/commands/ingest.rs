//! Ingest a directory tree as a new exhibit

use std::path::PathBuf;

use clap::Args;
use tracing::{info, warn};

use casefile::{
    CancelFlag, DEFAULT_DESTINATION, DEFAULT_WORKERS, ImportRequest, Pipeline, run_import,
};

use super::{CommandResult, StoreArgs, finish};

/// Ingest a directory tree as a new exhibit
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Directory to ingest
    input_dir: PathBuf,

    /// Blob-store base path for content too large to keep inline
    #[arg(long, short = 'd', default_value = DEFAULT_DESTINATION)]
    dest: String,

    /// Case number; a new one is generated if omitted
    #[arg(long, short = 'c')]
    case_number: Option<String>,

    /// Display name of the case
    #[arg(long)]
    case_name: Option<String>,

    /// Examiner responsible for the case
    #[arg(long, short = 'e')]
    examiner: Option<String>,

    /// Name of this exhibit (e.g. the disk image label)
    #[arg(long, short = 'x')]
    exhibit_name: Option<String>,

    /// Number of upload workers
    #[arg(long, short = 'w', default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    #[command(flatten)]
    stores: StoreArgs,
}

pub fn run(args: IngestArgs) -> CommandResult {
    if !args.input_dir.is_dir() {
        return Err(format!("Input directory not found: {:?}", args.input_dir).into());
    }

    let rows = args.stores.open_rows()?;
    let blobs = args.stores.open_blobs()?;

    let request = ImportRequest {
        input_dir: args.input_dir,
        destination: args.dest,
        case_number: args.case_number,
        case_name: args.case_name,
        examiner: args.examiner,
        exhibit_name: args.exhibit_name,
    };
    let pipeline = Pipeline::new(args.workers);
    cancel_on_interrupt(pipeline.cancel_flag())?;

    let report = finish(run_import(&rows, &blobs, &request, &pipeline), rows.close())?;

    let summary = &report.summary;
    let stats = &summary.stats;
    info!(exhibit_id = %report.exhibit.id, "Import complete");
    eprintln!("Imported {:?}", request.input_dir);
    eprintln!("  Case: {} ({})", report.case_id, report.case_number);
    eprintln!("  Exhibit: {}", report.exhibit.id);
    eprintln!("  Blob path: {}", report.exhibit.base_path);
    eprintln!("  Rows written: {}", stats.rows);
    eprintln!(
        "  Inline: {} files, {} bytes ({:.1}% of stored bytes)",
        stats.inline_files,
        stats.inline_bytes,
        stats.inline_pct()
    );
    eprintln!(
        "  External: {} files, {} bytes",
        stats.external_files, stats.external_bytes
    );
    if summary.failed > 0 {
        eprintln!("  Failed: {} (see log for paths)", summary.failed);
    }
    if summary.skipped > 0 {
        eprintln!("  Skipped: {}", summary.skipped);
    }
    if summary.cancelled > 0 {
        eprintln!("  Cancelled: {} entries not ingested", summary.cancelled);
    }

    Ok(())
}

/// On Ctrl-C, stop dispatching new entries and let in-flight uploads finish.
fn cancel_on_interrupt(flag: CancelFlag) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        warn!("Interrupted, finishing uploads already in progress");
        flag.cancel();
    })
}

#[cfg(test)]
mod tests {
    use std::thread::sleep;
    use std::time::Duration;

    use nix::sys::signal::{Signal, raise};

    use super::*;

    #[test]
    fn interrupt_raises_cancel_flag() {
        let pipeline = Pipeline::new(1);
        let flag = pipeline.cancel_flag();
        cancel_on_interrupt(pipeline.cancel_flag()).unwrap();

        raise(Signal::SIGINT).unwrap();
        for _ in 0..200 {
            if flag.is_cancelled() {
                break;
            }
            sleep(Duration::from_millis(10));
        }
        assert!(flag.is_cancelled());
    }
}
