use clap::{Parser, Subcommand};
use lloggs::LoggingArgs;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "casefile")]
#[command(about = "Ingest forensic evidence into a tiered row/blob store")]
struct Args {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    logging: LoggingArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ingest(commands::ingest::IngestArgs),
    Cases(commands::cases::CasesArgs),
    Schema(commands::schema::SchemaArgs),
    Purge(commands::purge::PurgeArgs),
    Verify(commands::verify::VerifyArgs),
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    let _guard = args.logging.setup(|v| match v {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    })?;

    match args.command {
        Command::Ingest(args) => commands::ingest::run(args),
        Command::Cases(args) => commands::cases::run(args),
        Command::Schema(args) => commands::schema::run(args),
        Command::Purge(args) => commands::purge::run(args),
        Command::Verify(args) => commands::verify::run(args),
    }
}
