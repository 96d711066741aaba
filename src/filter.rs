use crate::data_loader::{GameWeatherRow, League};
use crate::error::{AppError, Result};

// Sidebar-style narrowing of the board. Ranges are inclusive, and a row with no value fails an active range.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RowFilter {
    pub league: Option<League>,
    pub temp: Option<(f64, f64)>,
    pub wind: Option<(f64, f64)>,
}

impl RowFilter {
    pub fn from_bounds(
        league: Option<League>,
        min_temp: Option<f64>,
        max_temp: Option<f64>,
        min_wind: Option<f64>,
        max_wind: Option<f64>,
    ) -> Result<Self> {
        Ok(Self {
            league,
            temp: range("temperature", min_temp, max_temp)?,
            wind: range("wind", min_wind, max_wind)?,
        })
    }

    pub fn is_active(&self) -> bool {
        self.league.is_some() || self.temp.is_some() || self.wind.is_some()
    }

    pub fn matches(&self, row: &GameWeatherRow) -> bool {
        self.league.map_or(true, |league| row.league == league)
            && within(row.temp_fg, self.temp)
            && within(row.wind_fg, self.wind)
    }

    pub fn apply(&self, rows: Vec<GameWeatherRow>) -> Vec<GameWeatherRow> {
        if !self.is_active() {
            return rows;
        }
        rows.into_iter().filter(|row| self.matches(row)).collect()
    }
}

fn range(name: &str, min: Option<f64>, max: Option<f64>) -> Result<Option<(f64, f64)>> {
    if min.is_none() && max.is_none() {
        return Ok(None);
    }

    let low = min.unwrap_or(f64::NEG_INFINITY);
    let high = max.unwrap_or(f64::INFINITY);
    if low > high {
        return Err(AppError::Config(format!("{name} range is empty: min {low} > max {high}")));
    }

    Ok(Some((low, high)))
}

fn within(value: Option<f64>, range: Option<(f64, f64)>) -> bool {
    match (range, value) {
        (None, _) => true,
        (Some((low, high)), Some(v)) => low <= v && v <= high,
        (Some(_), None) => false,
    }
}
