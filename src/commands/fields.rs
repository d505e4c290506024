use super::{Context, WindowArgs};
use anyhow::Result;
use clap::Args;
use std::io::Write;

#[derive(Debug, Args)]
pub struct FieldsArgs {
    #[arg(short, long)]
    pub source: String,

    /// Table to inspect; may be omitted when the source has only one
    #[arg(short, long)]
    pub table: Option<String>,

    #[command(flatten)]
    pub window: WindowArgs,
}

pub async fn run(args: FieldsArgs) -> Result<()> {
    let mut context = Context::from_config()?;
    list(&mut context, &args, &mut std::io::stdout().lock()).await
}

/// One line per plottable column: raw name, then its display label.
pub async fn list<W: Write>(context: &mut Context, args: &FieldsArgs, out: &mut W) -> Result<()> {
    let table = context
        .resolve_table(&args.source, args.table.as_deref())
        .await?;
    let (minutes, stop) = args
        .window
        .resolve(&context.range, context.viewer.policy())?;
    let fields = context
        .viewer
        .fields(&args.source, &table, minutes, stop)
        .await?;
    for field in fields {
        let rule = context.viewer.rules().lookup(&field);
        writeln!(out, "{}\t{}", field, rule.display_name)?;
    }
    Ok(())
}
