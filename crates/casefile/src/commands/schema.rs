//! Create or drop the row-store tables

use clap::{Args, Subcommand};

use casefile::CaseRegistry;

use super::{CommandResult, StoreArgs, finish};

/// Create or drop the row-store tables
#[derive(Args, Debug)]
pub struct SchemaArgs {
    #[command(subcommand)]
    action: SchemaAction,

    #[command(flatten)]
    stores: StoreArgs,
}

#[derive(Subcommand, Debug)]
enum SchemaAction {
    /// Create the case, exhibit and data tables
    Create,
    /// Drop the case, exhibit and data tables with all their rows
    Drop {
        /// Confirm dropping every table
        #[arg(long)]
        yes: bool,
    },
}

pub fn run(args: SchemaArgs) -> CommandResult {
    let rows = args.stores.open_rows()?;
    let registry = CaseRegistry::new(&rows);

    let result = match args.action {
        SchemaAction::Create => registry.create_schema(),
        SchemaAction::Drop { yes } => {
            if !yes {
                return Err("Refusing to drop tables without --yes".into());
            }
            registry.drop_schema()
        }
    };

    finish(result, rows.close())
}
