use chrono::{Datelike, NaiveDate, Weekday};
use serde::*;
use std::fs;
use std::path::Path;

use crate::data_loader::Level;
use crate::error::{AppError, Result};
use crate::signals::SignalContext;
use crate::util::remap_value_clamped;

// When rain stops being ignored. SeasonDay is resolved against the season the evaluated date falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RainCutoff {
    Disabled,
    SeasonDay { month: u32, day: u32 },
    Date(NaiveDate),
}

impl RainCutoff {
    pub fn cutoff_for(&self, date: NaiveDate) -> Option<NaiveDate> {
        match *self {
            RainCutoff::Disabled => None,
            RainCutoff::Date(cutoff) => Some(cutoff),
            RainCutoff::SeasonDay { month, day } => {
                // January/February games (bowls, playoffs) belong to the season that started the year before
                let season_year = if date.month() >= 3 { date.year() } else { date.year() - 1 };
                NaiveDate::from_ymd_opt(season_year, month, day)
            }
        }
    }
}

// Every knob the classifier reads. Wind thresholds are in mph, temperatures in °F, altitude in feet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierContext {
    pub reference_date: Option<NaiveDate>,

    pub wind_threshold_near: f64,
    pub wind_threshold_far: f64,
    pub near_horizon_days: i64,
    pub far_horizon_days: i64,
    pub early_week_days: Vec<Weekday>,
    pub early_week_wind_bump: f64,

    pub altitude_threshold_ft: f64,
    pub altitude_spread_max: f64,
    pub altitude_min_temp: f64,

    pub heat_temp: f64,
    pub heat_comfort_max: f64,
    pub heat_plus_comfort_max: f64,

    pub cold_temp: f64,

    pub cold_wind_max_temp: f64,    // Wind only counts below this
    pub high_wind_max_temp: f64,
    pub very_high_wind: f64,
    pub close_spread_max: f64,
    pub tight_spread_max: f64,

    pub rain_min_inches: f64,
    pub rain_cutoff: RainCutoff,

    pub breeze_wind: f64,

    pub opacity_low_volatility: f64,
    pub opacity_mid_volatility: f64,
    pub opacity_high_volatility: f64,
}

impl Default for ClassifierContext {
    fn default() -> Self {
        Self {
            reference_date: None,

            wind_threshold_near: 12.0,
            wind_threshold_far: 15.0,
            near_horizon_days: 1,
            far_horizon_days: 5,
            early_week_days: vec![Weekday::Mon, Weekday::Tue],
            early_week_wind_bump: 1.0,

            altitude_threshold_ft: 1000.0,
            altitude_spread_max: 7.0,
            altitude_min_temp: 60.0,

            heat_temp: 80.0,
            heat_comfort_max: 60.0,
            heat_plus_comfort_max: 54.0,

            cold_temp: 30.0,

            cold_wind_max_temp: 60.0,
            high_wind_max_temp: 45.0,
            very_high_wind: 20.0,
            close_spread_max: 10.5,
            tight_spread_max: 7.0,

            rain_min_inches: 0.0,
            rain_cutoff: RainCutoff::SeasonDay { month: 10, day: 1 },

            breeze_wind: 8.0,

            opacity_low_volatility: 1.0,
            opacity_mid_volatility: 0.5,
            opacity_high_volatility: 0.15,
        }
    }
}

impl ClassifierContext {
    pub fn with_reference_date(mut self, reference_date: NaiveDate) -> Self {
        self.reference_date = Some(reference_date);
        self
    }

    // Wind significance threshold for a game. Forecasts further out need more wind before they count,
    // and early-week looks get a little extra margin on top.
    pub fn wind_threshold(&self, game_date: Option<NaiveDate>) -> f64 {
        let base = match (game_date, self.reference_date) {
            (Some(game), Some(reference)) => {
                let lead_days = (game - reference).num_days();
                remap_value_clamped(
                    lead_days as f64,
                    self.near_horizon_days as f64,
                    self.far_horizon_days as f64,
                    self.wind_threshold_near,
                    self.wind_threshold_far,
                )
            }
            _ => self.wind_threshold_far,
        };

        let bump = match self.reference_date {
            Some(reference) if self.early_week_days.contains(&reference.weekday()) => self.early_week_wind_bump,
            _ => 0.0,
        };

        base + bump
    }

    // Rain is ignored before the cutoff. Uses the game date when known, the reference date otherwise.
    pub fn rain_suppressed(&self, game_date: Option<NaiveDate>) -> bool {
        let Some(date) = game_date.or(self.reference_date) else {
            return false;
        };

        self.rain_cutoff.cutoff_for(date).is_some_and(|cutoff| date < cutoff)
    }

    pub fn volatility_opacity(&self, volatility: Option<Level>) -> f64 {
        match volatility {
            Some(Level::Low) | None => self.opacity_low_volatility,
            Some(Level::Mid) => self.opacity_mid_volatility,
            Some(Level::High) => self.opacity_high_volatility,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("wind_threshold_near", self.wind_threshold_near),
            ("wind_threshold_far", self.wind_threshold_far),
            ("early_week_wind_bump", self.early_week_wind_bump),
            ("altitude_threshold_ft", self.altitude_threshold_ft),
            ("altitude_spread_max", self.altitude_spread_max),
            ("very_high_wind", self.very_high_wind),
            ("close_spread_max", self.close_spread_max),
            ("tight_spread_max", self.tight_spread_max),
            ("rain_min_inches", self.rain_min_inches),
            ("breeze_wind", self.breeze_wind),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) {
                return Err(AppError::Config(format!("{name} must be a non-negative number, got {value}")));
            }
        }

        let ordered = [
            ("near_horizon_days", self.near_horizon_days as f64, "far_horizon_days", self.far_horizon_days as f64),
            ("wind_threshold_near", self.wind_threshold_near, "wind_threshold_far", self.wind_threshold_far),
            ("breeze_wind", self.breeze_wind, "wind_threshold_near", self.wind_threshold_near),
            ("heat_plus_comfort_max", self.heat_plus_comfort_max, "heat_comfort_max", self.heat_comfort_max),
            ("high_wind_max_temp", self.high_wind_max_temp, "cold_wind_max_temp", self.cold_wind_max_temp),
            ("tight_spread_max", self.tight_spread_max, "close_spread_max", self.close_spread_max),
            ("cold_temp", self.cold_temp, "heat_temp", self.heat_temp),
        ];
        for (low_name, low, high_name, high) in ordered {
            if low > high {
                return Err(AppError::Config(format!("{low_name} ({low}) must not exceed {high_name} ({high})")));
            }
        }

        let opacities = [
            self.opacity_low_volatility,
            self.opacity_mid_volatility,
            self.opacity_high_volatility,
        ];
        if opacities.iter().any(|o| !(0.0..=1.0).contains(o)) {
            return Err(AppError::Config(format!("volatility opacities must be within 0..=1, got {opacities:?}")));
        }

        if let RainCutoff::SeasonDay { month, day } = self.rain_cutoff {
            // 2000 is a leap year so Feb 29 is allowed
            if NaiveDate::from_ymd_opt(2000, month, day).is_none() {
                return Err(AppError::Config(format!("rain cutoff {month}/{day} is not a calendar day")));
            }
        }

        Ok(())
    }

    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |key: &str| -> Result<Option<f64>> {
            match lookup(key) {
                None => Ok(None),
                Some(raw) => raw
                    .trim()
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| AppError::Config(format!("{key} must be a number, got '{raw}'"))),
            }
        };

        if let Some(v) = number("WEATHER_WIND_THRESHOLD_NEAR")? { self.wind_threshold_near = v; }
        if let Some(v) = number("WEATHER_WIND_THRESHOLD_FAR")? { self.wind_threshold_far = v; }
        if let Some(v) = number("WEATHER_CLOSE_SPREAD_MAX")? { self.close_spread_max = v; }
        if let Some(v) = number("WEATHER_ALTITUDE_THRESHOLD_FT")? { self.altitude_threshold_ft = v; }

        if let Some(raw) = lookup("WEATHER_RAIN_CUTOFF") {
            let raw = raw.trim();
            self.rain_cutoff = if raw.eq_ignore_ascii_case("off") {
                RainCutoff::Disabled
            } else {
                let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                    AppError::Config(format!("WEATHER_RAIN_CUTOFF must be YYYY-MM-DD or 'off', got '{raw}'"))
                })?;
                RainCutoff::Date(date)
            };
        }

        Ok(self)
    }
}

// Shape of the optional --config file. Both sections are optional, missing fields keep their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub classifier: ClassifierContext,
    pub signals: SignalContext,
}

impl Settings {
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(data)?;
        Ok(settings)
    }

    /// Final classifier context: file values, then environment overrides, then the reference date.
    /// The reference date is the command line one if given, the file's otherwise, and `today` last.
    /// The merged result is validated before it is handed out.
    pub fn classifier_context<F>(&self, cli_date: Option<NaiveDate>, lookup: F, today: NaiveDate) -> Result<ClassifierContext>
    where
        F: Fn(&str) -> Option<String>,
    {
        let reference_date = cli_date.or(self.classifier.reference_date).unwrap_or(today);

        let ctx = self
            .classifier
            .clone()
            .apply_overrides(lookup)?
            .with_reference_date(reference_date);
        ctx.validate()?;

        Ok(ctx)
    }
}
