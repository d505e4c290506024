use super::Context;
use anyhow::Result;
use clap::Args;
use std::io::Write;

#[derive(Debug, Args)]
pub struct TablesArgs {
    /// Source (database or bucket) to list
    #[arg(short, long)]
    pub source: String,
}

pub async fn run(args: TablesArgs) -> Result<()> {
    let context = Context::from_config()?;
    list(&context, &args.source, &mut std::io::stdout().lock()).await
}

pub async fn list<W: Write>(context: &Context, source: &str, out: &mut W) -> Result<()> {
    for table in context.catalog.list_tables(source).await? {
        writeln!(out, "{}", table)?;
    }
    Ok(())
}
