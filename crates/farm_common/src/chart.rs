//! Chart data shaping: which series, which value range, where each point sits.
//!
//! Pixel drawing is left to the renderer; x and y are normalized to `[0, 1]`.

use crate::history::BoundedHistory;
use crate::sample::SampleField;
use serde::Serialize;

/// Fixed y-axis range, in percent
pub const Y_MIN: f64 = 0.0;
pub const Y_MAX: f64 = 100.0;

/// Spacing of horizontal gridlines
pub const GRID_STEP: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartPoint {
    /// Position along the time axis, `0.0` = oldest sample
    pub x: f64,
    /// Position along the value axis, `0.0` = `Y_MIN`
    pub y: f64,
    /// Unclamped sample value
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub field: SampleField,
    pub color: &'static str,
    pub points: Vec<ChartPoint>,
}

/// Line color per field
pub fn series_color(field: SampleField) -> &'static str {
    match field {
        SampleField::Temperature => "red",
        SampleField::Humidity => "blue",
        SampleField::Steam => "purple",
        SampleField::Light => "orange",
        SampleField::SoilMoisture => "green",
        SampleField::WaterLevel => "cyan",
    }
}

/// Gridline values from top to bottom: 100, 80, ..., 0
pub fn gridlines() -> Vec<f64> {
    let steps = ((Y_MAX - Y_MIN) / GRID_STEP).round() as usize;
    (0..=steps).map(|i| Y_MAX - i as f64 * GRID_STEP).collect()
}

/// Shape one series from the history
pub fn series_for(history: &BoundedHistory, field: SampleField) -> ChartSeries {
    let n = history.len();
    let span = n.saturating_sub(1).max(1) as f64;

    let points = history
        .series(field)
        .enumerate()
        .map(|(i, value)| ChartPoint {
            x: i as f64 / span,
            y: (value.clamp(Y_MIN, Y_MAX) - Y_MIN) / (Y_MAX - Y_MIN),
            value,
        })
        .collect();

    ChartSeries {
        field,
        color: series_color(field),
        points,
    }
}

/// All six series in drawing order
pub fn all_series(history: &BoundedHistory) -> Vec<ChartSeries> {
    SampleField::ALL
        .iter()
        .map(|field| series_for(history, *field))
        .collect()
}
