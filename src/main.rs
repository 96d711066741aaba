mod classifier;
mod classifier_context;
mod cli;
mod data_loader;
mod error;
mod filter;
mod report;
mod signals;
mod sweep;
mod util;

use chrono::Local;
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::classifier::classify_all;
use crate::classifier_context::{ClassifierContext, Settings};
use crate::cli::*;
use crate::data_loader::load_inputs;
use crate::error::Result;
use crate::filter::RowFilter;
use crate::report::*;
use crate::signals::combined_signals;
use crate::sweep::*;

/*
    Everything reads the same two exports (--nfl / --cfb) and runs them through one classifier context.
    The reference date is the only thing taken from the clock, and only here, when --reference-date is not given.
*/

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log_level))
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(cli) {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = match &cli.config {
        Some(path) => {
            info!("Reading settings from {}", path.display());
            Settings::from_file(path)?
        }
        None => Settings::default(),
    };

    let today = Local::now().date_naive();
    let ctx = settings.classifier_context(cli.reference_date, |key| std::env::var(key).ok(), today)?;
    info!("Reference date {}, rain cutoff {:?}", ctx.reference_date.unwrap_or(today), ctx.rain_cutoff);

    match cli.cmd {
        Command::Classify(args) => classify_cmd(args, &ctx),
        Command::Signals(args) => {
            let rows = load_inputs(args.input.nfl.as_deref(), args.input.cfb.as_deref())?;
            let signals = combined_signals(&rows, &settings.signals);
            info!("{} of {} games carry a wind signal", signals.len(), rows.len());

            let mut out = open_output(args.output)?;
            match args.format {
                OutputFormat::Table => {
                    writeln!(out, "{}", last_updated(&rows))?;
                    write_signals(&signals, &mut out)?;
                }
                OutputFormat::Csv => write_signals_csv(&signals, &mut out)?,
                OutputFormat::Json => write_json(&signals[..], &mut out)?,
            }
            out.flush()?;
            Ok(())
        }
        Command::Details(args) => {
            let rows = load_inputs(args.input.nfl.as_deref(), args.input.cfb.as_deref())?;
            let games = classify_all(rows, &ctx);
            let game = find_game(&games, &args.game)?;

            let mut out = io::stdout().lock();
            write_details(game, &mut out)?;
            Ok(())
        }
        Command::Sweep(args) => {
            let rows = load_inputs(args.input.nfl.as_deref(), args.input.cfb.as_deref())?;
            let points = threshold_sweep(&rows, &ctx, args.from, args.to, args.step)?;

            let mut out = io::stdout().lock();
            write_sweep(&points, &mut out)?;
            Ok(())
        }
    }
}

fn classify_cmd(args: ClassifyArgs, ctx: &ClassifierContext) -> Result<()> {
    let filter = RowFilter::from_bounds(
        args.league.map(Into::into),
        args.min_temp,
        args.max_temp,
        args.min_wind,
        args.max_wind,
    )?;

    let rows = load_inputs(args.input.nfl.as_deref(), args.input.cfb.as_deref())?;
    let loaded = rows.len();
    let rows = filter.apply(rows);
    if filter.is_active() {
        info!("Filter kept {} of {loaded} games", rows.len());
    }

    let games = classify_all(rows, ctx);

    let insufficient = games.iter().filter(|g| g.classification.insufficient_data).count();
    if insufficient > 0 {
        warn!("{insufficient} games are missing wind or temperature and were left as No Impact");
    }

    let mut out = open_output(args.output)?;
    match args.format {
        OutputFormat::Table => {
            writeln!(out, "{}", last_updated(games.iter().map(|g| &g.row)))?;
            write_table(&games, &mut out)?;
            writeln!(out)?;
            write_legend(&games, &mut out)?;
        }
        OutputFormat::Csv => write_csv(&games, &mut out)?,
        OutputFormat::Json => write_json(&games[..], &mut out)?,
    }
    out.flush()?;

    Ok(())
}

fn open_output(path: Option<PathBuf>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => {
            info!("Writing to {}", path.display());
            Box::new(BufWriter::new(File::create(path)?))
        }
        None => Box::new(io::stdout().lock()),
    })
}
