use std::io::Write;
use tracing::debug;

use crate::classifier::{classify, Category};
use crate::classifier_context::ClassifierContext;
use crate::data_loader::GameWeatherRow;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct SweepPoint {
    pub threshold: f64,
    pub counts: Vec<(Category, usize)>,
}

impl SweepPoint {
    pub fn count(&self, category: Category) -> usize {
        self.counts.iter().find(|(c, _)| *c == category).map_or(0, |(_, n)| *n)
    }

    pub fn wind_games(&self) -> usize {
        self.counts.iter().filter(|(c, _)| c.is_wind()).map(|(_, n)| n).sum()
    }
}

// Re-runs the board at a range of wind significance thresholds so you can see where the calls flip.
// The swept value replaces both horizon thresholds and the early-week bump is switched off,
// so the number printed is the line every game is held to.
pub fn threshold_sweep(rows: &[GameWeatherRow], ctx: &ClassifierContext, from: f64, to: f64, step: f64) -> Result<Vec<SweepPoint>> {
    if !(step > 0.0) {
        return Err(AppError::Config(format!("sweep step must be positive, got {step}")));
    }
    if from > to {
        return Err(AppError::Config(format!("sweep range is empty: {from} > {to}")));
    }

    let mut points = Vec::new();
    let mut i = 0;
    loop {
        let threshold = from + step * i as f64;
        if threshold > to + step * 1e-6 {
            break;
        }

        let mut sweep_ctx = ctx.clone();
        sweep_ctx.wind_threshold_near = threshold;
        sweep_ctx.wind_threshold_far = threshold;
        sweep_ctx.early_week_wind_bump = 0.0;

        let mut counts: Vec<(Category, usize)> = Category::ALL.iter().map(|&c| (c, 0)).collect();
        for row in rows {
            let category = classify(row, &sweep_ctx).category;
            if let Some(entry) = counts.iter_mut().find(|(c, _)| *c == category) {
                entry.1 += 1;
            }
        }

        let point = SweepPoint { threshold, counts };
        debug!("Threshold {threshold:.1}: {} wind games", point.wind_games());
        points.push(point);

        i += 1;
    }

    Ok(points)
}

pub fn write_sweep<W: Write>(points: &[SweepPoint], w: &mut W) -> Result<()> {
    for p in points {
        write!(w, "Wind threshold {0:4.1} | wind games {1:4}", p.threshold, p.wind_games())?;
        for category in Category::ALL {
            let count = p.count(category);
            if count > 0 {
                write!(w, " | {category} {count}")?;
            }
        }
        writeln!(w)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<GameWeatherRow> {
        [(9.0, 40.0), (13.0, 40.0), (16.0, 40.0), (21.0, 38.0), (25.0, 70.0)]
            .into_iter()
            .map(|(wind, temp)| GameWeatherRow {
                wind_fg: Some(wind),
                temp_fg: Some(temp),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn higher_threshold_means_fewer_wind_games() {
        let points = threshold_sweep(&rows(), &ClassifierContext::default(), 8.0, 22.0, 2.0).unwrap();
        let thresholds: Vec<f64> = points.iter().map(|p| p.threshold).collect();
        assert_eq!(thresholds, vec![8.0, 10.0, 12.0, 14.0, 16.0, 18.0, 20.0, 22.0]);

        let wind: Vec<usize> = points.iter().map(|p| p.wind_games()).collect();
        assert_eq!(wind, vec![4, 3, 3, 2, 2, 1, 1, 0]);
        assert!(wind.windows(2).all(|w| w[0] >= w[1]));

        // every row lands somewhere at every threshold
        assert!(points.iter().all(|p| p.counts.iter().map(|(_, n)| n).sum::<usize>() == 5));
        assert_eq!(points[0].count(Category::NoImpact), 1);
    }

    #[test]
    fn ignores_early_week_bump() {
        let monday = chrono::NaiveDate::from_ymd_opt(2024, 10, 7).unwrap();
        let ctx = ClassifierContext::default().with_reference_date(monday);
        let points = threshold_sweep(&rows(), &ctx, 16.0, 16.0, 1.0).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].wind_games(), 2);
    }

    #[test]
    fn rejects_bad_ranges() {
        let ctx = ClassifierContext::default();
        assert!(matches!(threshold_sweep(&rows(), &ctx, 8.0, 16.0, 0.0), Err(AppError::Config(_))));
        assert!(matches!(threshold_sweep(&rows(), &ctx, 16.0, 8.0, 1.0), Err(AppError::Config(_))));
    }

    #[test]
    fn writes_one_line_per_point() {
        let points = threshold_sweep(&rows(), &ClassifierContext::default(), 12.0, 13.0, 0.5).unwrap();
        let mut buf = Vec::new();
        write_sweep(&points, &mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert_eq!(out.lines().count(), 3);
        assert!(out.starts_with("Wind threshold 12.0 | wind games    3"));
        assert!(out.lines().next().unwrap().ends_with(" | No Impact 1 | Low Impact 1 | High Impact 2 | Very High Impact 1"));
    }
}
