use super::Context;
use crate::chart::{parse_size, render_png};
use crate::config;
use crate::errors::Error;
use crate::session::{HELP, Session, SessionCommand};
use crate::viewer::{View, ViewRequest};
use anyhow::{Context as _, Result, bail};
use clap::Args;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

const PROMPT: &str = "sensorview> ";

#[derive(Debug, Args)]
pub struct BrowseArgs {
    /// Source to start with
    #[arg(short, long)]
    pub source: Option<String>,
}

enum Flow {
    Continue,
    Quit,
}

pub async fn run(args: BrowseArgs) -> Result<()> {
    let mut context = Context::from_config()?;
    let mut session = Session::new(context.range);
    let mut out = std::io::stdout();
    if let Some(source) = &args.source {
        select_source(&context, &mut session, source, &mut out).await?;
    }
    let input = BufReader::new(tokio::io::stdin());
    browse(&mut context, &mut session, input, &mut out).await
}

/// Reads commands until `quit` or end of input. Failed commands are
/// reported and the session goes on.
pub async fn browse<R, W>(
    context: &mut Context,
    session: &mut Session,
    input: R,
    out: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    writeln!(out, "type help for commands")?;
    loop {
        write!(out, "{}", PROMPT)?;
        out.flush()?;
        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        let outcome = match line.parse::<SessionCommand>() {
            Ok(command) => execute(context, session, command, out).await,
            Err(e) => Err(e.into()),
        };
        match outcome {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(e) => report(&e, out)?,
        }
    }
    Ok(())
}

fn report<W: Write>(err: &anyhow::Error, out: &mut W) -> Result<()> {
    match err.downcast_ref::<Error>() {
        Some(e) if e.is_no_data() => writeln!(out, "No data found for the selected time range.")?,
        _ => writeln!(out, "Error: {:#}", err)?,
    }
    Ok(())
}

async fn execute<W: Write>(
    context: &mut Context,
    session: &mut Session,
    command: SessionCommand,
    out: &mut W,
) -> Result<Flow> {
    match command {
        SessionCommand::Sources => {
            for source in context.catalog.list_sources().await? {
                writeln!(out, "{}", source)?;
            }
        }
        SessionCommand::Source(name) => {
            select_source(context, session, &name, out).await?;
        }
        SessionCommand::Tables => {
            let source = session.source().context("no source selected (source NAME)")?;
            for table in context.catalog.list_tables(source).await? {
                writeln!(out, "{}", table)?;
            }
        }
        SessionCommand::Table(name) => {
            let source = session.source().context("no source selected (source NAME)")?;
            let tables = context.catalog.list_tables(source).await?;
            if !tables.contains(&name) {
                bail!("{} has no table {}", source, name);
            }
            session.select_table(&name);
        }
        SessionCommand::Fields => {
            let (source, table) = selected_table(session)?;
            let stop = session.stop(context.viewer.policy().naive_now());
            let fields = context
                .viewer
                .fields(&source, &table, session.duration_minutes(), stop)
                .await?;
            for field in fields {
                let rule = context.viewer.rules().lookup(&field);
                writeln!(out, "{}\t{}", field, rule.display_name)?;
            }
        }
        SessionCommand::Field(name) => {
            selected_table(session)?;
            session.select_field(&name);
            show(context, session, None, out).await?;
        }
        SessionCommand::Minutes(minutes) => {
            session.set_duration(minutes)?;
            refresh(context, session, out).await?;
        }
        SessionCommand::Stop { date, time } => {
            session.set_stop(date, time);
            refresh(context, session, out).await?;
        }
        SessionCommand::Reset => {
            session.reset();
            refresh(context, session, out).await?;
        }
        SessionCommand::State => writeln!(out, "{}", session)?,
        SessionCommand::Show(path) => show(context, session, path.as_deref(), out).await?,
        SessionCommand::Help => writeln!(out, "{}", HELP)?,
        SessionCommand::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

async fn select_source<W: Write>(
    context: &Context,
    session: &mut Session,
    name: &str,
    out: &mut W,
) -> Result<()> {
    let sources = context.catalog.list_sources().await?;
    if !sources.iter().any(|s| s == name) {
        bail!("unknown source {} (sources: {})", name, sources.join(", "));
    }
    session.select_source(name);
    if let Some(table) = context.catalog.implicit_table(name).await? {
        session.select_table(&table);
        writeln!(out, "table: {}", table)?;
    }
    Ok(())
}

fn selected_table(session: &Session) -> Result<(String, String)> {
    let source = session.source().context("no source selected (source NAME)")?;
    let table = session.table().context("no table selected (table NAME)")?;
    Ok((source.to_string(), table.to_string()))
}

/// Redraws after a window change, once a field is chosen.
async fn refresh<W: Write>(context: &mut Context, session: &Session, out: &mut W) -> Result<()> {
    if session.field().is_some() {
        show(context, session, None, out).await?;
    }
    Ok(())
}

async fn show<W: Write>(
    context: &mut Context,
    session: &Session,
    path: Option<&Path>,
    out: &mut W,
) -> Result<()> {
    let (source, table) = selected_table(session)?;
    let field = session.field().context("no field selected (field NAME)")?;
    let request = ViewRequest {
        source,
        table,
        field: field.to_string(),
        duration_minutes: session.duration_minutes(),
        stop: session.stop(context.viewer.policy().naive_now()),
    };
    let view = context.viewer.view(&request).await?;

    match path {
        Some(path) => {
            let (width, height) = parse_size(&config::get("CHART_SIZE")?).map_err(Error::from)?;
            render_png(&view, path, width, height).map_err(Error::from)?;
            writeln!(out, "{} -> {}", view.series.title(), path.display())?;
        }
        None => {
            let decimals = context.viewer.rules().lookup(field).decimals as usize;
            print_table(&view, decimals, out)?;
        }
    }
    Ok(())
}

fn print_table<W: Write>(view: &View, decimals: usize, out: &mut W) -> Result<()> {
    let series = &view.series;
    writeln!(
        out,
        "{} {} ({} points)",
        series.title(),
        view.window,
        series.points.len()
    )?;
    writeln!(out, "{:<24}{}", series.time_label, series.value_label)?;
    for point in &series.points {
        writeln!(
            out,
            "{:<24}{:.*}",
            crate::window::format_instant(point.timestamp),
            decimals,
            point.value
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::session::DurationRange;
    use crate::testing::{RecordingStore, ambient_rows, test_viewer};

    fn context(store: std::sync::Arc<RecordingStore>) -> Context {
        Context::new(
            Box::new(StaticCatalog::default()),
            test_viewer(store),
            DurationRange::default(),
        )
    }

    async fn run_script(context: &mut Context, script: &str) -> String {
        let mut session = Session::new(context.range);
        let mut out: Vec<u8> = Vec::new();
        browse(context, &mut session, script.as_bytes(), &mut out)
            .await
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_browse_plot_and_no_data() {
        let store = RecordingStore::new(ambient_rows());
        let mut context = context(store.clone());
        let output = run_script(
            &mut context,
            "source temperature\n\
             stop 2024-01-01 12:00\n\
             field temperature\n\
             field visible_light_lux\n\
             quit\n",
        )
        .await;

        assert!(output.contains("table: ambient_data"));
        assert!(output.contains("Temperature (Celsius) [2024-01-01T06:00:00Z, 2024-01-01T12:00:00Z] (3 points)"));
        assert!(output.contains("2024-01-01T09:00:00Z    19.7"));
        assert!(output.contains("No data found for the selected time range."));
        assert_eq!(store.query_count(), 1);
    }

    #[tokio::test]
    async fn test_browse_errors_do_not_end_session() {
        let store = RecordingStore::new(ambient_rows());
        let mut context = context(store);
        let output = run_script(
            &mut context,
            "plot\n\
             tables\n\
             source garage\n\
             source pm\n\
             minutes 7\n\
             state\n",
        )
        .await;

        assert!(output.contains("Error: invalid command"));
        assert!(output.contains("Error: no source selected"));
        assert!(output.contains("Error: unknown source garage"));
        assert!(!output.contains("table: air_quality_data"));
        assert!(output.contains("Error: invalid duration"));
        assert!(output.contains("source:   pm"));
        assert!(output.contains("minutes:  360"));
    }

    #[tokio::test]
    async fn test_browse_lists_catalog_and_fields() {
        let store = RecordingStore::new(ambient_rows());
        let mut context = context(store);
        let output = run_script(
            &mut context,
            "sources\n\
             source pm\n\
             tables\n\
             table air_quality_data_1\n\
             fields\n",
        )
        .await;

        assert!(output.contains("temperature\nnoise\naqi\npm\nlight\n"));
        assert!(output.contains("air_quality_data_0\nair_quality_data_1\n"));
        assert!(output.contains("temperature\tTemperature (Celsius)"));
        assert!(output.contains("gas\tGas Resistance (kOhms)"));
    }

    #[tokio::test]
    async fn test_reset_returns_to_now() {
        let store = RecordingStore::new(ambient_rows());
        let mut context = context(store.clone());
        let output = run_script(
            &mut context,
            "source temperature\n\
             stop 2024-01-01 12:00\n\
             reset\n\
             state\n",
        )
        .await;
        assert!(output.contains("stop:     now now"));
        assert_eq!(store.query_count(), 0);
    }
}
