pub mod cache;
pub mod catalog;
pub mod chart;
pub mod commands;
pub mod config;
pub mod errors;
pub mod logging;
pub mod normalize;
pub mod query;
pub mod result_set;
pub mod session;
pub mod store;
pub mod viewer;
pub mod window;

#[cfg(test)]
mod testing;

use clap::{Parser, Subcommand};

pub use errors::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Exit code for a query that matched nothing.
pub const EXIT_NO_DATA: i32 = 2;

#[derive(Parser)]
#[clap(name = "sensorview")]
#[clap(about = "Browse and chart sensor readings stored in InfluxDB")]
#[clap(version)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List selectable sources
    Sources(commands::sources::SourcesArgs),
    /// List the tables of a source
    Tables(commands::tables::TablesArgs),
    /// List the plottable fields of a table within a window
    Fields(commands::fields::FieldsArgs),
    /// Draw one field over a window as PNG (or print it as JSON)
    Chart(commands::chart::ChartArgs),
    /// Interactive session
    Browse(commands::browse::BrowseArgs),
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    use logging::*;

    let log = DEFAULT.new(o!("function" => "run"));
    debug!(log, "starting");
    match cli.command {
        Commands::Sources(args) => commands::sources::run(args).await,
        Commands::Tables(args) => commands::tables::run(args).await,
        Commands::Fields(args) => commands::fields::run(args).await,
        Commands::Chart(args) => commands::chart::run(args).await,
        Commands::Browse(args) => commands::browse::run(args).await,
    }
}

/// Prints `err` for the user and returns the process exit code.
pub fn report(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<Error>() {
        Some(e) if e.is_no_data() => {
            eprintln!("No data found for the selected time range.");
            EXIT_NO_DATA
        }
        _ => {
            eprintln!("Error: {:#}", err);
            1
        }
    }
}
