use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};
use std::path::PathBuf;

use crate::data_loader::League;

#[derive(Debug, Parser)]
#[command(name = "football-weather", version, about = "Weather impact triage for NFL and college football games.")]
pub struct Cli {
    /// JSON settings file with classifier and signal thresholds
    #[arg(long, env = "WEATHER_CONFIG", global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// Day the forecasts are being read on (YYYY-MM-DD), defaults to today
    #[arg(long, env = "WEATHER_REFERENCE_DATE", global = true)]
    pub reference_date: Option<NaiveDate>,
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Classify every game and print the board
    Classify(ClassifyArgs),
    /// Cross-league wind signals
    Signals(SignalsArgs),
    /// Drill down into one game
    Details(DetailsArgs),
    /// Show how the board changes across wind thresholds
    Sweep(SweepArgs),
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// NFL export (.csv or .json)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub nfl: Option<PathBuf>,
    /// College football export (.csv or .json)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub cfb: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LeagueArg {
    Nfl,
    Cfb,
}

impl From<LeagueArg> for League {
    fn from(arg: LeagueArg) -> Self {
        match arg {
            LeagueArg::Nfl => League::Nfl,
            LeagueArg::Cfb => League::Cfb,
        }
    }
}

#[derive(Debug, Args)]
pub struct ClassifyArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Only show one league
    #[arg(long, value_enum)]
    pub league: Option<LeagueArg>,
    #[arg(long)]
    pub min_temp: Option<f64>,
    #[arg(long)]
    pub max_temp: Option<f64>,
    #[arg(long)]
    pub min_wind: Option<f64>,
    #[arg(long)]
    pub max_wind: Option<f64>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
    /// Write to a file instead of stdout
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct SignalsArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DetailsArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Part of the game label, e.g. "Jets"
    #[arg(long)]
    pub game: String,
}

#[derive(Debug, Args)]
pub struct SweepArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[arg(long, default_value_t = 8.0)]
    pub from: f64,
    #[arg(long, default_value_t = 16.0)]
    pub to: f64,
    #[arg(long, default_value_t = 0.5)]
    pub step: f64,
}
