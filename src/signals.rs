use serde::*;

use crate::data_loader::{GameWeatherRow, League, Level};

// Cross-league wind signal view. Each league has its own bar for what counts as a wind play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalContext {
    pub nfl_min_wind: f64,
    pub nfl_max_temp: f64,

    pub cfb_min_wind: f64,
    pub cfb_max_temp: f64,
    pub cfb_max_open_spread: f64,

    pub base_dot_size: f64,
    pub impact_dot_scale: f64,
}

impl Default for SignalContext {
    fn default() -> Self {
        Self {
            nfl_min_wind: 15.0,
            nfl_max_temp: 60.0,

            cfb_min_wind: 15.0,
            cfb_max_temp: 70.0,
            cfb_max_open_spread: 10.5,

            base_dot_size: 7.0,
            impact_dot_scale: 4.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignalType {
    #[serde(rename = "NFL Wind")]
    NflWind,
    #[serde(rename = "CFB Wind")]
    CfbWind,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::NflWind => "NFL Wind",
            SignalType::CfbWind => "CFB Wind",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            SignalType::NflWind => "blue",
            SignalType::CfbWind => "purple",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Signal<'a> {
    pub row: &'a GameWeatherRow,
    pub signal_type: SignalType,
    pub dot_size: f64,
    pub dot_opacity: f64,
}

impl SignalContext {
    pub fn qualifies(&self, row: &GameWeatherRow) -> Option<SignalType> {
        let (Some(wind), Some(temp)) = (row.wind_fg, row.temp_fg) else {
            return None;
        };

        match row.league {
            League::Nfl => (wind > self.nfl_min_wind && temp < self.nfl_max_temp).then_some(SignalType::NflWind),
            League::Cfb => {
                let close = row.spread_open.is_some_and(|s| s.abs() < self.cfb_max_open_spread);
                (close && wind > self.cfb_min_wind && temp < self.cfb_max_temp).then_some(SignalType::CfbWind)
            }
        }
    }

    pub fn dot_size(&self, row: &GameWeatherRow) -> f64 {
        row.gs_fg.map_or(self.base_dot_size, |gs| gs.abs() * self.impact_dot_scale + self.base_dot_size)
    }
}

// Signals read the export's own wind impact label, not the classifier's volatility attenuation
pub fn impact_opacity(wind_impact: Option<Level>) -> f64 {
    match wind_impact {
        Some(Level::High) | None => 1.0,
        Some(Level::Mid) => 0.5,
        Some(Level::Low) => 0.15,
    }
}

// College signals are listed ahead of NFL ones, each league keeping its input order
pub fn combined_signals<'a>(rows: &'a [GameWeatherRow], ctx: &SignalContext) -> Vec<Signal<'a>> {
    let mut signals: Vec<Signal<'a>> = rows
        .iter()
        .filter_map(|row| {
            ctx.qualifies(row).map(|signal_type| Signal {
                row,
                signal_type,
                dot_size: ctx.dot_size(row),
                dot_opacity: impact_opacity(row.wind_impact),
            })
        })
        .collect();

    signals.sort_by_key(|s| match s.signal_type {
        SignalType::CfbWind => 0,
        SignalType::NflWind => 1,
    });
    signals
}
