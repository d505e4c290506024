use super::Context;
use anyhow::Result;
use clap::Args;
use std::io::Write;

#[derive(Debug, Args)]
pub struct SourcesArgs {}

pub async fn run(_args: SourcesArgs) -> Result<()> {
    let context = Context::from_config()?;
    list(&context, &mut std::io::stdout().lock()).await
}

pub async fn list<W: Write>(context: &Context, out: &mut W) -> Result<()> {
    for source in context.catalog.list_sources().await? {
        writeln!(out, "{}", source)?;
    }
    Ok(())
}
