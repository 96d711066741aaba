use serde::*;
use std::fmt;

use crate::classifier_context::ClassifierContext;
use crate::data_loader::GameWeatherRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "No Impact")]
    NoImpact,
    #[serde(rename = "Low Impact")]
    LowImpact,
    #[serde(rename = "Mid Impact")]
    MidImpact,
    #[serde(rename = "High Impact")]
    HighImpact,
    #[serde(rename = "Very High Impact")]
    VeryHighImpact,
    Rain,
    Cold,
    Heat,
    #[serde(rename = "Heat+")]
    HeatPlus,
    Altitude,
}

impl Category {
    // Legend order, roughly mildest first
    pub const ALL: [Category; 10] = [
        Category::NoImpact,
        Category::LowImpact,
        Category::Rain,
        Category::Cold,
        Category::MidImpact,
        Category::Heat,
        Category::Altitude,
        Category::HeatPlus,
        Category::HighImpact,
        Category::VeryHighImpact,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::NoImpact => "No Impact",
            Category::LowImpact => "Low Impact",
            Category::MidImpact => "Mid Impact",
            Category::HighImpact => "High Impact",
            Category::VeryHighImpact => "Very High Impact",
            Category::Rain => "Rain",
            Category::Cold => "Cold",
            Category::Heat => "Heat",
            Category::HeatPlus => "Heat+",
            Category::Altitude => "Altitude",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Category::NoImpact => Color::Green,
            Category::LowImpact => Color::Blue,
            Category::MidImpact => Color::Orange,
            Category::HighImpact => Color::Purple,
            Category::VeryHighImpact => Color::DarkViolet,
            Category::Rain => Color::Teal,
            Category::Cold => Color::DeepSkyBlue,
            Category::Heat => Color::Red,
            Category::HeatPlus => Color::DarkRed,
            Category::Altitude => Color::SaddleBrown,
        }
    }

    // Bigger dot = bigger expected weather edge
    pub fn size(&self) -> u32 {
        match self {
            Category::NoImpact => 7,
            Category::LowImpact => 15,
            Category::Rain | Category::Cold => 20,
            Category::MidImpact | Category::Heat | Category::Altitude => 25,
            Category::HeatPlus => 35,
            Category::HighImpact => 40,
            Category::VeryHighImpact => 55,
        }
    }

    // Only the tiers produced by the wind rule get the volatility treatment
    pub fn is_wind(&self) -> bool {
        matches!(self, Category::MidImpact | Category::HighImpact | Category::VeryHighImpact)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Green,
    Blue,
    Orange,
    Purple,
    DarkViolet,
    Teal,
    DeepSkyBlue,
    Red,
    DarkRed,
    SaddleBrown,
}

impl Color {
    // CSS color names, so any plotting layer can take them as-is
    pub fn name(&self) -> &'static str {
        match self {
            Color::Green => "green",
            Color::Blue => "blue",
            Color::Orange => "orange",
            Color::Purple => "purple",
            Color::DarkViolet => "darkviolet",
            Color::Teal => "teal",
            Color::DeepSkyBlue => "deepskyblue",
            Color::Red => "red",
            Color::DarkRed => "darkred",
            Color::SaddleBrown => "saddlebrown",
        }
    }

    pub fn hex(&self) -> &'static str {
        match self {
            Color::Green => "#008000",
            Color::Blue => "#0000ff",
            Color::Orange => "#ffa500",
            Color::Purple => "#800080",
            Color::DarkViolet => "#9400d3",
            Color::Teal => "#008080",
            Color::DeepSkyBlue => "#00bfff",
            Color::Red => "#ff0000",
            Color::DarkRed => "#8b0000",
            Color::SaddleBrown => "#8b4513",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub category: Category,
    pub color: Color,
    pub size: u32,
    pub opacity: f64,
    pub insufficient_data: bool,
    pub rule: Option<&'static str>,
}

impl Classification {
    fn encode(category: Category, rule: &'static str, row: &GameWeatherRow, ctx: &ClassifierContext) -> Self {
        let opacity = if category.is_wind() { ctx.volatility_opacity(row.wind_vol) } else { 1.0 };

        Self {
            category,
            color: category.color(),
            size: category.size(),
            opacity,
            insufficient_data: false,
            rule: Some(rule),
        }
    }

    pub fn insufficient() -> Self {
        Self {
            category: Category::NoImpact,
            color: Category::NoImpact.color(),
            size: Category::NoImpact.size(),
            opacity: 1.0,
            insufficient_data: true,
            rule: None,
        }
    }
}

/// A row together with what the classifier made of it. The row is never touched after this point.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedGame {
    #[serde(flatten)]
    pub row: GameWeatherRow,
    #[serde(flatten)]
    pub classification: Classification,
}

// The per-row numbers the rules look at, resolved once. Spread is kept as an absolute value.
#[derive(Debug, Clone, Copy)]
struct Conditions {
    wind: f64,
    temp: f64,
    rain: f64,
    altitude: Option<f64>,
    abs_spread: Option<f64>,
    home_temp: Option<f64>,
    away_temp: Option<f64>,
    wind_threshold: f64,
}

impl Conditions {
    fn from_row(row: &GameWeatherRow, ctx: &ClassifierContext) -> Option<Self> {
        let wind = row.wind_fg?;
        let temp = row.temp_fg?;

        let rain = if ctx.rain_suppressed(row.date) { 0.0 } else { row.rain_fg.unwrap_or(0.0) };

        Some(Self {
            wind,
            temp,
            rain,
            altitude: row.travel_altitude,
            abs_spread: row.spread().map(f64::abs),
            home_temp: row.home_temp,
            away_temp: row.away_temp,
            wind_threshold: ctx.wind_threshold(row.date),
        })
    }

    // No line at all counts as close, there's nothing saying the game is out of reach
    fn close_within(&self, max_spread: f64) -> bool {
        self.abs_spread.map_or(true, |s| s <= max_spread)
    }

    fn windy(&self) -> bool {
        self.wind >= self.wind_threshold
    }
}

struct Rule {
    name: &'static str,
    evaluate: fn(&Conditions, &ClassifierContext) -> Option<Category>,
}

// Evaluated top to bottom, first hit wins. The last rule always matches.
const RULES: &[Rule] = &[
    Rule { name: "altitude", evaluate: altitude_rule },
    Rule { name: "heat", evaluate: heat_rule },
    Rule { name: "cold", evaluate: cold_rule },
    Rule { name: "wind", evaluate: wind_rule },
    Rule { name: "rain", evaluate: rain_rule },
    Rule { name: "breeze", evaluate: breeze_rule },
    Rule { name: "default", evaluate: default_rule },
];

fn altitude_rule(c: &Conditions, ctx: &ClassifierContext) -> Option<Category> {
    let high_travel = c.altitude.is_some_and(|alt| alt > ctx.altitude_threshold_ft);
    (high_travel && c.close_within(ctx.altitude_spread_max) && c.temp >= ctx.altitude_min_temp)
        .then_some(Category::Altitude)
}

// Hot kickoff against a team that lives somewhere cold
fn heat_rule(c: &Conditions, ctx: &ClassifierContext) -> Option<Category> {
    if c.temp <= ctx.heat_temp {
        return None;
    }

    match (c.home_temp, c.away_temp) {
        (Some(home), Some(away)) if home < ctx.heat_plus_comfort_max && away < ctx.heat_plus_comfort_max => {
            Some(Category::HeatPlus)
        }
        (home, away) => [home, away]
            .into_iter()
            .flatten()
            .any(|t| t < ctx.heat_comfort_max)
            .then_some(Category::Heat),
    }
}

fn cold_rule(c: &Conditions, ctx: &ClassifierContext) -> Option<Category> {
    (c.temp < ctx.cold_temp && !c.windy()).then_some(Category::Cold)
}

// A lopsided spread keeps the row at Mid no matter how hard it blows
fn wind_rule(c: &Conditions, ctx: &ClassifierContext) -> Option<Category> {
    if !c.windy() || c.temp >= ctx.cold_wind_max_temp {
        return None;
    }

    let cold_enough = c.temp <= ctx.high_wind_max_temp;

    let tier = if c.wind >= ctx.very_high_wind && cold_enough && c.close_within(ctx.tight_spread_max) {
        Category::VeryHighImpact
    } else if cold_enough && c.close_within(ctx.close_spread_max) {
        Category::HighImpact
    } else {
        Category::MidImpact
    };

    Some(tier)
}

fn rain_rule(c: &Conditions, ctx: &ClassifierContext) -> Option<Category> {
    (c.rain > ctx.rain_min_inches && !c.windy()).then_some(Category::Rain)
}

fn breeze_rule(c: &Conditions, ctx: &ClassifierContext) -> Option<Category> {
    (c.wind > ctx.breeze_wind && !c.windy() && c.temp < ctx.cold_wind_max_temp).then_some(Category::LowImpact)
}

fn default_rule(_: &Conditions, _: &ClassifierContext) -> Option<Category> {
    Some(Category::NoImpact)
}

/// Classifies a single game. Pure: the same row and context always give the same answer.
///
/// Rows missing forecast wind or temperature come back as `No Impact` with `insufficient_data` set
/// so the presenter can mark them.
pub fn classify(row: &GameWeatherRow, ctx: &ClassifierContext) -> Classification {
    let Some(conditions) = Conditions::from_row(row, ctx) else {
        return Classification::insufficient();
    };

    let (rule, category) = RULES
        .iter()
        .find_map(|rule| (rule.evaluate)(&conditions, ctx).map(|category| (rule.name, category)))
        .unwrap_or(("default", Category::NoImpact));

    Classification::encode(category, rule, row, ctx)
}

pub fn classify_all(rows: Vec<GameWeatherRow>, ctx: &ClassifierContext) -> Vec<ClassifiedGame> {
    rows.into_iter()
        .map(|row| {
            let classification = classify(&row, ctx);
            ClassifiedGame { row, classification }
        })
        .collect()
}
