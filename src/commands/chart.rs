use super::{Context, WindowArgs};
use crate::chart::{default_output_path, parse_size, render_png, write_json};
use crate::config;
use crate::viewer::ViewRequest;
use anyhow::{Context as _, Result};
use clap::Args;
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct ChartArgs {
    #[arg(short, long)]
    pub source: String,

    /// Table to query; may be omitted when the source has only one
    #[arg(short, long)]
    pub table: Option<String>,

    /// Raw field name to plot
    #[arg(short, long)]
    pub field: String,

    #[command(flatten)]
    pub window: WindowArgs,

    /// PNG file to write (default: <source>_<table>_<field>.png)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Image size, WIDTHxHEIGHT (default from CHART_SIZE)
    #[arg(long)]
    pub size: Option<String>,

    /// Print the series as JSON instead of drawing it
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: ChartArgs) -> Result<()> {
    let mut context = Context::from_config()?;
    draw(&mut context, &args, &mut std::io::stdout().lock()).await
}

pub async fn draw<W: Write>(context: &mut Context, args: &ChartArgs, out: &mut W) -> Result<()> {
    let size = match &args.size {
        Some(size) => size.clone(),
        None => config::get("CHART_SIZE")?,
    };
    let (width, height) = parse_size(&size).map_err(crate::errors::Error::from)?;

    let table = context
        .resolve_table(&args.source, args.table.as_deref())
        .await?;
    let (duration_minutes, stop) = args
        .window
        .resolve(&context.range, context.viewer.policy())?;
    let request = ViewRequest {
        source: args.source.clone(),
        table,
        field: args.field.clone(),
        duration_minutes,
        stop,
    };
    let view = context.viewer.view(&request).await?;

    if args.json {
        write_json(&view, out)?;
        return Ok(());
    }

    let path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&view.source, &view.table, &view.field));
    render_png(&view, &path, width, height)
        .map_err(crate::errors::Error::from)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    writeln!(
        out,
        "{} ({} points, {}) -> {}",
        view.series.title(),
        view.series.points.len(),
        view.window,
        path.display()
    )?;
    Ok(())
}
