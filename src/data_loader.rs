use chrono::NaiveDate;
use serde::*;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::util::split_location;

// Below this the wind forecast is treated as settled no matter what the export says
const CALM_WIND_MPH: f64 = 11.99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum League {
    #[default]
    #[serde(rename = "NFL")]
    Nfl,
    #[serde(rename = "CFB")]
    Cfb,
}

impl League {
    pub fn as_str(&self) -> &'static str {
        match self {
            League::Nfl => "NFL",
            League::Cfb => "CFB",
        }
    }
}

impl fmt::Display for League {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorical label used for both wind volatility (Low/Mid/High) and wind impact (Low/Med/High).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    Low,
    Mid,
    High,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Low => "Low",
            Level::Mid => "Mid",
            Level::High => "High",
        }
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Level::Low),
            "mid" | "med" | "medium" => Ok(Level::Mid),
            "high" => Ok(Level::High),
            other => Err(format!("unknown level '{other}'")),
        }
    }
}

// One game row as exported by the data-prep sheet. Column names follow the export, hence the renames.
// Everything numeric is optional: a blank or garbage cell loads as None instead of killing the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameWeatherRow {
    #[serde(rename = "Game", default, deserialize_with = "lenient::label")]
    pub game: String,
    #[serde(rename = "Date", default, deserialize_with = "lenient::date")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "Time", default, deserialize_with = "lenient::string")]
    pub time: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub game_loc: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub home_team: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub away_team: Option<String>,
    #[serde(skip_deserializing)]
    pub league: League,

    #[serde(default, deserialize_with = "lenient::number")]
    pub wind_fg: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub temp_fg: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub rain_fg: Option<f64>,
    #[serde(default, deserialize_with = "lenient::level")]
    pub wind_vol: Option<Level>,
    #[serde(default, deserialize_with = "lenient::level")]
    pub wind_impact: Option<Level>,
    #[serde(rename = "travel_alt", default, deserialize_with = "lenient::number")]
    pub travel_altitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub home_temp: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub away_temp: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub avg_wind: Option<f64>,
    #[serde(skip_deserializing)]
    pub wind_diff: Option<f64>,

    #[serde(rename = "Total_open", default, deserialize_with = "lenient::number")]
    pub total_open: Option<f64>,
    #[serde(rename = "Total_now", default, deserialize_with = "lenient::number")]
    pub total_now: Option<f64>,
    #[serde(rename = "Under_open", default, deserialize_with = "lenient::number")]
    pub under_open: Option<f64>,
    #[serde(rename = "Under_now", default, deserialize_with = "lenient::number")]
    pub under_now: Option<f64>,
    // CFB exports call the opening line just "Open"
    #[serde(rename = "Spread_open", alias = "Open", default, deserialize_with = "lenient::number")]
    pub spread_open: Option<f64>,
    #[serde(rename = "Spread_now", default, deserialize_with = "lenient::number")]
    pub spread_now: Option<f64>,
    #[serde(rename = "My_total", default, deserialize_with = "lenient::number")]
    pub my_total: Option<f64>,
    #[serde(rename = "Edge", default, deserialize_with = "lenient::number")]
    pub edge: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub gs_fg: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub away_fg: Option<f64>,

    #[serde(default, deserialize_with = "lenient::number")]
    pub year_built: Option<f64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub wind_dir_fg: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub orient: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub weakest_wind_effect: Option<String>,
    #[serde(rename = "Timestamp", default, deserialize_with = "lenient::string")]
    pub timestamp: Option<String>,
}

impl GameWeatherRow {
    // Current line if we have one, opener otherwise
    pub fn spread(&self) -> Option<f64> {
        self.spread_now.or(self.spread_open)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum InputFormat {
    Csv,
    Json,
}

impl InputFormat {
    fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("csv") => Ok(InputFormat::Csv),
            Some("json") => Ok(InputFormat::Json),
            _ => Err(AppError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

// Loads one league's export. Format is picked from the file extension.
pub fn load_rows(path: &Path, league: League) -> Result<Vec<GameWeatherRow>> {
    let format = InputFormat::from_path(path)?;
    let file = File::open(path)?;

    let rows = match format {
        InputFormat::Csv => read_csv(file)?,
        InputFormat::Json => read_json(file)?,
    };

    let rows: Vec<GameWeatherRow> = rows.into_iter().map(|r| prepare_row(r, league)).collect();
    info!("Loaded {} {} games from {}", rows.len(), league, path.display());

    Ok(rows)
}

// NFL rows first, then CFB. At least one of the two has to be given.
pub fn load_inputs(nfl: Option<&Path>, cfb: Option<&Path>) -> Result<Vec<GameWeatherRow>> {
    if nfl.is_none() && cfb.is_none() {
        return Err(AppError::NoInput);
    }

    let mut rows = Vec::new();
    if let Some(path) = nfl {
        rows.extend(load_rows(path, League::Nfl)?);
    }
    if let Some(path) = cfb {
        rows.extend(load_rows(path, League::Cfb)?);
    }

    Ok(rows)
}

pub fn read_csv<R: Read>(reader: R) -> Result<Vec<GameWeatherRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    // Surface a broken header row right away, the records can't be mapped without it
    rdr.headers()?;

    let mut rows = Vec::new();
    let mut skipped = 0;
    for (idx, record) in rdr.deserialize::<GameWeatherRow>().enumerate() {
        match record {
            Ok(row) => rows.push(row),
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                skipped += 1;
                warn!("Skipping CSV record {}: {e}", idx + 1);
            }
        }
    }

    if skipped > 0 {
        warn!("{skipped} CSV records could not be read");
    }

    Ok(rows)
}

// The file has to be a JSON array, but a record that doesn't fit is skipped like a bad CSV line
pub fn read_json<R: Read>(reader: R) -> Result<Vec<GameWeatherRow>> {
    let records: Vec<serde_json::Value> = serde_json::from_reader(BufReader::new(reader))?;

    let mut rows = Vec::with_capacity(records.len());
    let mut skipped = 0;
    for (idx, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<GameWeatherRow>(record) {
            Ok(row) => rows.push(row),
            Err(e) => {
                skipped += 1;
                warn!("Skipping JSON record {}: {e}", idx + 1);
            }
        }
    }

    if skipped > 0 {
        warn!("{skipped} JSON records could not be read");
    }

    Ok(rows)
}

// Fills in the fields that are derived from the raw export rather than read from it.
pub fn prepare_row(mut row: GameWeatherRow, league: League) -> GameWeatherRow {
    row.league = league;

    // game_loc wins when it parses, otherwise keep whatever latitude/longitude columns the export had
    if let Some(loc) = &row.game_loc {
        match split_location(loc) {
            (Some(lat), Some(lon)) => {
                row.latitude = Some(lat);
                row.longitude = Some(lon);
            }
            _ => debug!("Could not place '{}' from game_loc '{loc}'", row.game),
        }
    }

    row.wind_diff = match (row.wind_fg, row.avg_wind) {
        (Some(wind), Some(avg)) => Some(wind - avg),
        _ => None,
    };

    if row.wind_fg.is_some_and(|w| w < CALM_WIND_MPH) {
        row.wind_vol = Some(Level::Low);
    }

    row
}

// Accepts 2024-10-13, 10/13/2024 and 10/13/24, with or without a trailing time part.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let day_part = raw.split(['T', ' ']).next().unwrap_or(raw);

    if let Ok(d) = NaiveDate::parse_from_str(day_part, "%Y-%m-%d") {
        return Some(d);
    }

    let parts: Vec<&str> = day_part.split('/').collect();
    if parts.len() != 3 {
        return None;
    }

    let month: u32 = parts[0].parse().ok()?;
    let day: u32 = parts[1].parse().ok()?;
    let mut year: i32 = parts[2].parse().ok()?;
    // Two-digit years pivot at 70: 24 is 2024, 99 is 1999
    if parts[2].len() <= 2 {
        year += if year < 70 { 2000 } else { 1900 };
    }

    NaiveDate::from_ymd_opt(year, month, day)
}

// Field deserializers that coerce instead of failing. Anything unusable becomes None.
mod lenient {
    use super::{parse_date, Level};
    use crate::util::parse_finite;
    use chrono::NaiveDate;
    use serde::de::{self, Deserializer, Visitor};
    use std::fmt;

    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        deserializer.deserialize_any(NumberVisitor)
    }

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        deserializer.deserialize_any(StringVisitor)
    }

    pub fn level<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Level>, D::Error> {
        Ok(string(deserializer)?.and_then(|s| s.parse().ok()))
    }

    // Game labels can't be optional, an unusable one comes back empty
    pub fn label<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(string(deserializer)?.unwrap_or_default())
    }

    pub fn date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
        Ok(string(deserializer)?.and_then(|s| parse_date(&s)))
    }

    struct NumberVisitor;

    impl<'de> Visitor<'de> for NumberVisitor {
        type Value = Option<f64>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a number, a numeric string or nothing")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            Ok(Some(v).filter(|v| v.is_finite()))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v as f64))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v as f64))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(parse_finite(v))
        }

        fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
            deserializer.deserialize_any(NumberVisitor)
        }
    }

    struct StringVisitor;

    impl<'de> Visitor<'de> for StringVisitor {
        type Value = Option<String>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string, a number or nothing")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            let v = v.trim();
            Ok((!v.is_empty()).then(|| v.to_string()))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            Ok(v.is_finite().then(|| v.to_string()))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
            deserializer.deserialize_any(StringVisitor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NFL_CSV: &str = "\
Game,Date,Time,game_loc,wind_fg,temp_fg,rain_fg,wind_vol,wind_impact,Total_open,Spread_open,Spread_now,gs_fg,avg_wind,home_temp,away_temp
Bills @ Jets,2024-10-13,1:00 PM,\"40.8135, -74.0745\",18.2,41,0,High,high,38.5,-3,-2.5,-0.042,9.5,55,58
Rams @ Packers,10/20/2024,4:25 PM,\"44.5013, -88.0622\",n/a,,0.3,Mid,Med,44,7,,,,,
Chiefs @ Broncos,10/27/24,4:05 PM,nowhere,6,72,,High,low,41,-10.5,-9.5,0.01,7,60,70
";

    #[test]
    fn reads_csv_with_messy_cells() {
        let rows = read_csv(NFL_CSV.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);

        let jets = &rows[0];
        assert_eq!(jets.game, "Bills @ Jets");
        assert_eq!(jets.date, NaiveDate::from_ymd_opt(2024, 10, 13));
        assert_eq!(jets.time.as_deref(), Some("1:00 PM"));
        assert_eq!(jets.wind_fg, Some(18.2));
        assert_eq!(jets.temp_fg, Some(41.0));
        assert_eq!(jets.rain_fg, Some(0.0));
        assert_eq!(jets.wind_vol, Some(Level::High));
        assert_eq!(jets.wind_impact, Some(Level::High));
        assert_eq!(jets.spread(), Some(-2.5));

        let packers = &rows[1];
        assert_eq!(packers.wind_fg, None);
        assert_eq!(packers.temp_fg, None);
        assert_eq!(packers.wind_impact, Some(Level::Mid));
        assert_eq!(packers.date, NaiveDate::from_ymd_opt(2024, 10, 20));
        assert_eq!(packers.spread(), Some(7.0));

        assert_eq!(rows[2].date, NaiveDate::from_ymd_opt(2024, 10, 27));
    }

    #[test]
    fn skips_malformed_csv_records() {
        let data = "Game,wind_fg,temp_fg\nA,10,50\nB,12\nC,14,40\n";
        let rows = read_csv(data.as_bytes()).unwrap();
        let games: Vec<&str> = rows.iter().map(|r| r.game.as_str()).collect();
        assert_eq!(games, vec!["A", "C"]);
    }

    #[test]
    fn reads_json_records() {
        let data = r#"[
            {"Game": "Iowa @ Ohio St", "wind_fg": "16.5", "temp_fg": 48, "rain_fg": null,
             "Spread_open": -14.5, "wind_impact": "HIGH", "Time": 1200, "travel_alt": "n/a"},
            {"Game": 2024, "temp_fg": 70}
        ]"#;
        let rows = read_json(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].wind_fg, Some(16.5));
        assert_eq!(rows[0].temp_fg, Some(48.0));
        assert_eq!(rows[0].rain_fg, None);
        assert_eq!(rows[0].travel_altitude, None);
        assert_eq!(rows[0].time.as_deref(), Some("1200"));
        assert_eq!(rows[0].wind_impact, Some(Level::High));
        assert_eq!(rows[1].game, "2024");
        assert_eq!(rows[1].wind_fg, None);
    }

    #[test]
    fn prepares_derived_fields() {
        let rows = read_csv(NFL_CSV.as_bytes()).unwrap();
        let rows: Vec<GameWeatherRow> = rows.into_iter().map(|r| prepare_row(r, League::Cfb)).collect();

        let jets = &rows[0];
        assert_eq!(jets.league, League::Cfb);
        assert_eq!(jets.latitude, Some(40.8135));
        assert_eq!(jets.longitude, Some(-74.0745));
        assert!((jets.wind_diff.unwrap() - 8.7).abs() < 1e-9);
        assert_eq!(jets.wind_vol, Some(Level::High));

        // unknown wind keeps whatever volatility the export had
        assert_eq!(rows[1].wind_vol, Some(Level::Mid));

        let broncos = &rows[2];
        assert_eq!(broncos.latitude, None);
        assert_eq!(broncos.longitude, None);
        assert_eq!(broncos.wind_vol, Some(Level::Low));
    }

    #[test]
    fn falls_back_to_coordinate_columns() {
        let data = "\
Game,game_loc,latitude,longitude,wind_fg,temp_fg
Utah @ BYU,,40.2575,-111.6545,9,50
Army @ Navy,\"38.9847, -76.5075\",1.0,2.0,14,40
Rice @ Tulane,nowhere,29.9434,-90.1177,5,75
";
        let rows: Vec<GameWeatherRow> = read_csv(data.as_bytes())
            .unwrap()
            .into_iter()
            .map(|r| prepare_row(r, League::Cfb))
            .collect();

        assert_eq!((rows[0].latitude, rows[0].longitude), (Some(40.2575), Some(-111.6545)));
        assert_eq!((rows[1].latitude, rows[1].longitude), (Some(38.9847), Some(-76.5075)));
        assert_eq!((rows[2].latitude, rows[2].longitude), (Some(29.9434), Some(-90.1177)));
    }

    #[test]
    fn cfb_open_column_is_the_opening_spread() {
        let data = "Game,wind_fg,temp_fg,Open,wind_impact\nIowa @ Minnesota,20,45,-3.5,high\n";
        let rows: Vec<GameWeatherRow> = read_csv(data.as_bytes())
            .unwrap()
            .into_iter()
            .map(|r| prepare_row(r, League::Cfb))
            .collect();
        assert_eq!(rows[0].spread_open, Some(-3.5));

        let signals = crate::signals::combined_signals(&rows, &crate::signals::SignalContext::default());
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].signal_type, crate::signals::SignalType::CfbWind);

        let json = r#"[{"Game": "Iowa @ Minnesota", "wind_fg": 20, "temp_fg": 45, "Open": "-3.5"}]"#;
        assert_eq!(read_json(json.as_bytes()).unwrap()[0].spread_open, Some(-3.5));
    }

    #[test]
    fn skips_bad_json_records_and_keeps_the_rest() {
        let data = r#"[
            {"Game": "A @ B", "wind_fg": 18, "temp_fg": 40},
            {"Game": null, "wind_fg": 5, "temp_fg": 70},
            "not a game",
            {"Game": {"home": "C"}, "wind_fg": 7},
            {"Game": "D @ E", "wind_fg": 9, "temp_fg": 55}
        ]"#;
        let rows = read_json(data.as_bytes()).unwrap();
        let games: Vec<&str> = rows.iter().map(|r| r.game.as_str()).collect();
        assert_eq!(games, vec!["A @ B", "", "D @ E"]);
        assert_eq!(rows[1].wind_fg, Some(5.0));

        // not an array at all is still a hard error
        assert!(matches!(read_json(r#"{"Game": "A @ B"}"#.as_bytes()), Err(AppError::Json(_))));
    }

    #[test]
    fn parses_levels() {
        assert_eq!("med".parse::<Level>(), Ok(Level::Mid));
        assert_eq!(" Medium ".parse::<Level>(), Ok(Level::Mid));
        assert_eq!("HIGH".parse::<Level>(), Ok(Level::High));
        assert!("breezy".parse::<Level>().is_err());
    }

    #[test]
    fn parses_dates() {
        let oct_13 = NaiveDate::from_ymd_opt(2024, 10, 13);
        assert_eq!(parse_date("2024-10-13"), oct_13);
        assert_eq!(parse_date("2024-10-13 00:00:00"), oct_13);
        assert_eq!(parse_date("2024-10-13T19:30:00"), oct_13);
        assert_eq!(parse_date("10/13/2024"), oct_13);
        assert_eq!(parse_date("10/13/24"), oct_13);
        assert_eq!(parse_date("1/2/99"), NaiveDate::from_ymd_opt(1999, 1, 2));
        assert_eq!(parse_date("13/13/2024"), None);
        assert_eq!(parse_date("Sunday"), None);
    }

    #[test]
    fn rejects_unknown_extensions() {
        let err = load_rows(Path::new("cfb_weather.xlsx"), League::Cfb).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedFormat(_)));
    }

    #[test]
    fn requires_some_input() {
        assert!(matches!(load_inputs(None, None), Err(AppError::NoInput)));
    }

    #[test]
    fn loads_both_leagues_in_order() {
        let dir = std::env::temp_dir().join(format!("football_weather_loader_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let nfl = dir.join("nfl_weather.csv");
        let cfb = dir.join("cfb_weather.json");
        std::fs::write(&nfl, NFL_CSV).unwrap();
        std::fs::write(&cfb, r#"[{"Game": "Army @ Navy", "wind_fg": 20, "temp_fg": 35}]"#).unwrap();

        let rows = load_inputs(Some(nfl.as_path()), Some(cfb.as_path())).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(rows.len(), 4);
        assert!(rows[..3].iter().all(|r| r.league == League::Nfl));
        assert_eq!(rows[3].league, League::Cfb);
        assert_eq!(rows[3].game, "Army @ Navy");
    }
}
