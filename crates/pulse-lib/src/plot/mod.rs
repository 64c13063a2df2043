use crate::activity::MetricSeries;
use crate::metrics::trend::Trend;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub dash: Option<[f32; 2]>,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct Color(pub u32);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    /// `[unix seconds, value]` pairs.
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis { label: None },
            y: Axis { label: None },
            series: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }
}

const AVG_COLOR: u32 = 0x1F77B4;
const MAX_COLOR: u32 = 0xD62728;
const VO2MAX_COLOR: u32 = 0x2CA02C;
const TREND_DASH: [f32; 2] = [6.0, 4.0];

/// Solid line through the observed metric values.
pub fn metric_line(name: &str, series: &MetricSeries, color: u32) -> Series {
    Series::Line(LineSeries {
        name: name.into(),
        points: points_of(series, &series.values),
        style: Style {
            width: 1.4,
            dash: None,
            color: Color(color),
        },
    })
}

/// Dashed line through the fitted trend values, sharing the series' dates.
pub fn trend_line(name: &str, series: &MetricSeries, trend: &Trend, color: u32) -> Series {
    Series::Line(LineSeries {
        name: name.into(),
        points: points_of(series, &trend.fitted),
        style: Style {
            width: 1.4,
            dash: Some(TREND_DASH),
            color: Color(color),
        },
    })
}

fn points_of(series: &MetricSeries, values: &[f64]) -> Vec<[f64; 2]> {
    series
        .timestamps
        .iter()
        .zip(values)
        .map(|(timestamp, value)| [timestamp.timestamp() as f64, *value])
        .collect()
}

pub fn vo2max_figure(title: &str, series: &MetricSeries, trend: &Trend) -> Figure {
    let mut fig = Figure::new(Some(title.into()));
    fig.x.label = Some("Time".into());
    fig.y.label = Some("VO2max".into());
    fig.add_series(metric_line("VO2max", series, VO2MAX_COLOR));
    fig.add_series(trend_line("VO2max Trend", series, trend, MAX_COLOR));
    fig
}

/// Heart-rate figure with one solid + one dashed series per metric. A metric
/// whose trend could not be fitted is passed as `None` and omitted entirely.
pub fn heart_rate_figure(
    title: &str,
    avg: Option<(&MetricSeries, &Trend)>,
    max: Option<(&MetricSeries, &Trend)>,
) -> Figure {
    let mut fig = Figure::new(Some(title.into()));
    fig.x.label = Some("Time".into());
    fig.y.label = Some("Heart Rate (bpm)".into());
    if let Some((series, trend)) = avg {
        fig.add_series(metric_line("Avg HR", series, AVG_COLOR));
        fig.add_series(trend_line("Avg HR Trend", series, trend, AVG_COLOR));
    }
    if let Some((series, trend)) = max {
        fig.add_series(metric_line("Max HR", series, MAX_COLOR));
        fig.add_series(trend_line("Max HR Trend", series, trend, MAX_COLOR));
    }
    fig
}
