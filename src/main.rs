use clap::Parser;
use sensorview::Cli;
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = sensorview::run(cli).await {
        process::exit(sensorview::report(&err));
    }
}
