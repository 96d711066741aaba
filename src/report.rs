use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::*;
use std::io::Write;

use crate::classifier::{Category, ClassifiedGame};
use crate::data_loader::{GameWeatherRow, League, Level};
use crate::error::{AppError, Result};
use crate::signals::Signal;

const MISSING: &str = "-";

fn num(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| format!("{v:.decimals$}"))
}

fn degrees(value: Option<f64>) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| format!("{v:.1}°"))
}

// Fractions in the export (0.042) are shown as percentages (4.2%)
fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| format!("{:.1}%", v * 100.0))
}

fn text(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(MISSING)
}

fn level(value: Option<Level>) -> &'static str {
    value.map_or(MISSING, |l| l.as_str())
}

pub fn write_table<W: Write>(games: &[ClassifiedGame], w: &mut W) -> Result<()> {
    writeln!(w, "|{0:>4} | {1:30} | {2:3} | {3:16} | {4:11} | {5:>4} | {6:>4} | {7:>5} | {8:>5} | {9:>5} |",
        "#", "Game", "Lg", "Impact", "Color", "Size", "Opac", "Wind", "Temp", "Rain",
    )?;

    for (i, g) in games.iter().enumerate() {
        let c = &g.classification;
        writeln!(w, "|{0:3}. | {1:30} | {2:3} | {3:16} | {4:11} | {5:4} | {6:4.2} | {7:>5} | {8:>5} | {9:>5} |{10}",
            i + 1,
            truncate(&g.row.game, 30),
            g.row.league.as_str(),
            c.category.label(),
            c.color.name(),
            c.size,
            c.opacity,
            num(g.row.wind_fg, 1),
            num(g.row.temp_fg, 1),
            num(g.row.rain_fg, 2),
            if c.insufficient_data { " *" } else { "" },
        )?;
    }

    if games.iter().any(|g| g.classification.insufficient_data) {
        writeln!(w, "* missing wind or temperature, shown as No Impact")?;
    }

    Ok(())
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

pub fn category_counts(games: &[ClassifiedGame]) -> Vec<(Category, usize)> {
    Category::ALL
        .iter()
        .map(|&category| (category, games.iter().filter(|g| g.classification.category == category).count()))
        .collect()
}

// Legend: one line per category that actually shows up on the board
pub fn write_legend<W: Write>(games: &[ClassifiedGame], w: &mut W) -> Result<()> {
    writeln!(w, "Weather Conditions")?;
    for (category, count) in category_counts(games) {
        if count == 0 {
            continue;
        }
        writeln!(w, "  {0:16} {1:11} size {2:2} | {3:4} games", category.label(), category.color().name(), category.size(), count)?;
    }
    Ok(())
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

// Exports stamp every row with the same refresh time, the first one that parses is enough
pub fn last_updated<'a, I>(rows: I) -> String
where
    I: IntoIterator<Item = &'a GameWeatherRow>,
{
    rows.into_iter()
        .filter_map(|r| r.timestamp.as_deref())
        .find_map(parse_timestamp)
        .map_or_else(
            || "Timestamp not available".to_string(),
            |ts| format!("Last updated: {}", ts.format("%Y-%m-%d at %I:%M %p EST")),
        )
}

// Case-insensitive substring match on the game label, first hit wins
pub fn find_game<'a>(games: &'a [ClassifiedGame], needle: &str) -> Result<&'a ClassifiedGame> {
    let needle_lower = needle.to_lowercase();
    games
        .iter()
        .find(|g| g.row.game.to_lowercase().contains(&needle_lower))
        .ok_or_else(|| AppError::GameNotFound(needle.to_string()))
}

fn section<W: Write>(w: &mut W, title: &str, fields: &[(&str, String)]) -> Result<()> {
    writeln!(w, "{title}")?;
    for (label, value) in fields {
        writeln!(w, "  {label:14} {value}")?;
    }
    writeln!(w)?;
    Ok(())
}

pub fn write_details<W: Write>(game: &ClassifiedGame, w: &mut W) -> Result<()> {
    let r = &game.row;
    let c = &game.classification;

    writeln!(w, "Details for {} ({})", r.game, r.league)?;
    writeln!(w)?;

    section(w, "Classification", &[
        ("Impact", c.category.label().to_string()),
        ("Color", c.color.name().to_string()),
        ("Size", c.size.to_string()),
        ("Opacity", format!("{:.2}", c.opacity)),
        ("Rule", c.rule.unwrap_or(MISSING).to_string()),
        ("Data", if c.insufficient_data { "insufficient".to_string() } else { "ok".to_string() }),
    ])?;

    section(w, "Weather Information", &[
        ("Wind", num(r.wind_fg, 1)),
        ("Temp", degrees(r.temp_fg)),
        ("Rain", num(r.rain_fg, 1)),
        ("Impact", percent(r.gs_fg)),
        ("Volatility", level(r.wind_vol).to_string()),
        ("Relative Wind", num(r.wind_diff, 1)),
        ("Home_t", degrees(r.home_temp)),
        ("Away_t", degrees(r.away_temp)),
        ("Year", num(r.year_built, 0)),
    ])?;

    section(w, "Odds Information", &[
        ("Open", num(r.total_open, 1)),
        ("Price", num(r.under_open, 0)),
        ("Current", num(r.total_now, 1)),
        ("Price Now", num(r.under_now, 0)),
        ("Open_s", num(r.spread_open, 1)),
        ("Current_s", num(r.spread_now, 1)),
        ("Away tm", percent(r.away_fg)),
        ("My_total", num(r.my_total, 1)),
        ("Edge", num(r.edge, 1)),
    ])?;

    section(w, "Game Information", &[
        ("Orientation", text(&r.orient).to_string()),
        ("Wind Impact", level(r.wind_impact).to_string()),
        ("Wind_dir", text(&r.wind_dir_fg).to_string()),
        ("Weakest Wind", text(&r.weakest_wind_effect).to_string()),
        ("Date", r.date.map_or_else(|| MISSING.to_string(), |d| d.to_string())),
        ("Time", text(&r.time).to_string()),
        ("Game Location", text(&r.game_loc).to_string()),
    ])?;

    Ok(())
}

// Flat record for CSV consumers (map layers, spreadsheets). Inputs first, derived fields last.
#[derive(Debug, Serialize)]
struct ClassifiedRecord<'a> {
    league: League,
    game: &'a str,
    date: Option<NaiveDate>,
    time: Option<&'a str>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    wind_fg: Option<f64>,
    temp_fg: Option<f64>,
    rain_fg: Option<f64>,
    wind_vol: Option<Level>,
    travel_alt: Option<f64>,
    spread: Option<f64>,
    total_open: Option<f64>,
    total_now: Option<f64>,
    category: Category,
    color: &'static str,
    color_hex: &'static str,
    size: u32,
    opacity: f64,
    insufficient_data: bool,
}

impl<'a> From<&'a ClassifiedGame> for ClassifiedRecord<'a> {
    fn from(g: &'a ClassifiedGame) -> Self {
        Self {
            league: g.row.league,
            game: &g.row.game,
            date: g.row.date,
            time: g.row.time.as_deref(),
            latitude: g.row.latitude,
            longitude: g.row.longitude,
            wind_fg: g.row.wind_fg,
            temp_fg: g.row.temp_fg,
            rain_fg: g.row.rain_fg,
            wind_vol: g.row.wind_vol,
            travel_alt: g.row.travel_altitude,
            spread: g.row.spread(),
            total_open: g.row.total_open,
            total_now: g.row.total_now,
            category: g.classification.category,
            color: g.classification.color.name(),
            color_hex: g.classification.color.hex(),
            size: g.classification.size,
            opacity: g.classification.opacity,
            insufficient_data: g.classification.insufficient_data,
        }
    }
}

pub fn write_csv<W: Write>(games: &[ClassifiedGame], w: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(w);
    for g in games {
        wtr.serialize(ClassifiedRecord::from(g))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<W: Write, T: Serialize + ?Sized>(value: &T, w: W) -> Result<()> {
    serde_json::to_writer_pretty(w, value)?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct SignalRecord<'a> {
    signal_type: &'static str,
    league: League,
    game: &'a str,
    latitude: Option<f64>,
    longitude: Option<f64>,
    wind_fg: Option<f64>,
    temp_fg: Option<f64>,
    wind_impact: Option<Level>,
    game_loc: Option<&'a str>,
    color: &'static str,
    dot_size: f64,
    dot_opacity: f64,
}

pub fn write_signals_csv<W: Write>(signals: &[Signal], w: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(w);
    for s in signals {
        wtr.serialize(SignalRecord {
            signal_type: s.signal_type.as_str(),
            league: s.row.league,
            game: &s.row.game,
            latitude: s.row.latitude,
            longitude: s.row.longitude,
            wind_fg: s.row.wind_fg,
            temp_fg: s.row.temp_fg,
            wind_impact: s.row.wind_impact,
            game_loc: s.row.game_loc.as_deref(),
            color: s.signal_type.color(),
            dot_size: s.dot_size,
            dot_opacity: s.dot_opacity,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_signals<W: Write>(signals: &[Signal], w: &mut W) -> Result<()> {
    writeln!(w, "|{0:>4} | {1:8} | {2:30} | {3:>5} | {4:>5} | {5:6} | {6:>5} | {7:>4} | {8}",
        "#", "Signal", "Game", "Wind", "Temp", "Impact", "Size", "Opac", "Location",
    )?;

    for (i, s) in signals.iter().enumerate() {
        writeln!(w, "|{0:3}. | {1:8} | {2:30} | {3:>5} | {4:>5} | {5:6} | {6:5.1} | {7:4.2} | {8}",
            i + 1,
            s.signal_type.as_str(),
            truncate(&s.row.game, 30),
            num(s.row.wind_fg, 1),
            num(s.row.temp_fg, 1),
            level(s.row.wind_impact),
            s.dot_size,
            s.dot_opacity,
            text(&s.row.game_loc),
        )?;
    }

    if signals.is_empty() {
        writeln!(w, "No games meet the wind signal criteria")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify_all;
    use crate::classifier_context::ClassifierContext;
    use crate::signals::{combined_signals, SignalContext};

    fn sample_games() -> Vec<ClassifiedGame> {
        let jets = GameWeatherRow {
            game: "Bills @ Jets".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 10, 13),
            time: Some("1:00 PM".to_string()),
            game_loc: Some("40.8135, -74.0745".to_string()),
            latitude: Some(40.8135),
            longitude: Some(-74.0745),
            wind_fg: Some(18.0),
            temp_fg: Some(40.0),
            rain_fg: Some(0.0),
            wind_vol: Some(Level::Mid),
            wind_impact: Some(Level::High),
            spread_now: Some(-3.0),
            total_open: Some(38.5),
            gs_fg: Some(-0.042),
            away_fg: Some(0.48),
            home_temp: Some(55.0),
            year_built: Some(2010.0),
            timestamp: Some("2024-10-12T15:04:05".to_string()),
            ..Default::default()
        };
        let unknown = GameWeatherRow {
            game: "TBD @ TBD".to_string(),
            league: League::Cfb,
            ..Default::default()
        };
        classify_all(vec![jets, unknown], &ClassifierContext::default())
    }

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn table_marks_insufficient_rows() {
        let games = sample_games();
        let out = render(|w| write_table(&games, w));
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[1].contains("Bills @ Jets"));
        assert!(lines[1].contains("High Impact"));
        assert!(lines[1].contains("purple"));
        assert!(lines[1].contains("0.50"));
        assert!(!lines[1].ends_with('*'));
        assert!(lines[2].contains("CFB"));
        assert!(lines[2].ends_with(" *"));
        assert!(lines[3].starts_with("* missing"));
    }

    #[test]
    fn long_names_are_truncated() {
        assert_eq!(truncate("short", 30), "short");
        let t = truncate("Massachusetts @ Louisiana-Monroe Warhawks", 30);
        assert_eq!(t.chars().count(), 30);
        assert!(t.ends_with('…'));
    }

    #[test]
    fn legend_skips_empty_categories() {
        let games = sample_games();
        let counts = category_counts(&games);
        assert_eq!(counts.len(), Category::ALL.len());
        assert!(counts.contains(&(Category::HighImpact, 1)));
        assert!(counts.contains(&(Category::NoImpact, 1)));

        let out = render(|w| write_legend(&games, w));
        assert_eq!(out.lines().count(), 3);
        assert!(!out.contains("Heat"));
    }

    #[test]
    fn last_updated_formats_export_time() {
        let games = sample_games();
        assert_eq!(last_updated(games.iter().map(|g| &g.row)), "Last updated: 2024-10-12 at 03:04 PM EST");
        assert_eq!(last_updated(std::iter::empty()), "Timestamp not available");

        let garbled = GameWeatherRow { timestamp: Some("yesterday".to_string()), ..Default::default() };
        assert_eq!(last_updated([&garbled]), "Timestamp not available");
    }

    #[test]
    fn parses_timestamp_variants() {
        assert!(parse_timestamp("2024-10-12 15:04:05.123456").is_some());
        assert!(parse_timestamp("2024-10-12T15:04:05-04:00").is_some());
        assert!(parse_timestamp("2024-10-12 15:04").is_some());
        assert!(parse_timestamp("12 Oct").is_none());
    }

    #[test]
    fn finds_games_case_insensitively() {
        let games = sample_games();
        assert_eq!(find_game(&games, "jets").unwrap().row.game, "Bills @ Jets");
        assert!(matches!(find_game(&games, "Packers"), Err(AppError::GameNotFound(_))));
    }

    #[test]
    fn details_have_all_sections() {
        let games = sample_games();
        let out = render(|w| write_details(&games[0], w));

        for heading in ["Classification", "Weather Information", "Odds Information", "Game Information"] {
            assert!(out.lines().any(|l| l == heading), "missing {heading}");
        }
        assert!(out.contains("Temp           40.0°"));
        assert!(out.contains("Impact         -4.2%"));
        assert!(out.contains("Away tm        48.0%"));
        assert!(out.contains("Year           2010"));
        assert!(out.contains("Volatility     Mid"));
        assert!(out.contains("Away_t         -"));
        assert!(out.contains("Date           2024-10-13"));
        assert!(out.contains("Rule           wind"));
    }

    #[test]
    fn csv_output_has_derived_columns() {
        let games = sample_games();
        let out = render(|w| write_csv(&games, w));
        let mut lines = out.lines();

        let header = lines.next().unwrap();
        assert!(header.starts_with("league,game,date,time,latitude,longitude"));
        assert!(header.ends_with("category,color,color_hex,size,opacity,insufficient_data"));

        let jets = lines.next().unwrap();
        assert!(jets.starts_with("NFL,Bills @ Jets,2024-10-13,1:00 PM,40.8135,-74.0745"));
        assert!(jets.ends_with("High Impact,purple,#800080,40,0.5,false"));

        let unknown = lines.next().unwrap();
        assert!(unknown.starts_with("CFB,TBD @ TBD,,,"));
        assert!(unknown.ends_with("No Impact,green,#008000,7,1.0,true"));
    }

    #[test]
    fn json_output_is_an_array_of_records() {
        let games = sample_games();
        let out = render(|w| write_json(&games[..], w));
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert_eq!(parsed[0]["category"], "High Impact");
        assert_eq!(parsed[1]["insufficient_data"], true);
    }

    #[test]
    fn signals_table() {
        let games = sample_games();
        let rows: Vec<GameWeatherRow> = games.into_iter().map(|g| g.row).collect();
        let signals = combined_signals(&rows, &SignalContext::default());

        let out = render(|w| write_signals(&signals, w));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("NFL Wind"));
        assert!(lines[1].contains("40.8135, -74.0745"));

        let none = render(|w| write_signals(&[], w));
        assert!(none.contains("No games meet"));

        let csv_out = render(|w| write_signals_csv(&signals, w));
        let mut csv_lines = csv_out.lines();
        assert!(csv_lines.next().unwrap().starts_with("signal_type,league,game"));
        assert!(csv_lines.next().unwrap().starts_with("NFL Wind,NFL,Bills @ Jets,40.8135,-74.0745,18.0,40.0,High,"));
        assert!(csv_lines.next().is_none());
    }
}
