use anyhow::{bail, Result};
use chrono::{DateTime, Utc, Weekday};
use clap::{Parser, Subcommand, ValueEnum};
use log::warn;
use plotters::prelude::*;
use pulse_lib::{
    activity::{ActivityLog, Metric, MetricSeries},
    config::Config,
    io::garmin,
    metrics::trend::{fit_trend, metric_series, resample_weekly, Trend},
    plot::{heart_rate_figure, vo2max_figure, Figure, Series},
};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "pulse",
    version,
    about = "Pulse: activity export cleaning and trend tools"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum MetricArg {
    #[value(name = "avg-hr")]
    AvgHr,
    #[value(name = "max-hr")]
    MaxHr,
    #[value(name = "vo2max")]
    Vo2max,
}

impl MetricArg {
    fn metric(self) -> Metric {
        match self {
            MetricArg::AvgHr => Metric::AverageHeartRate,
            MetricArg::MaxHr => Metric::MaxHeartRate,
            MetricArg::Vo2max => Metric::Vo2Max,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum WeekAnchor {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl WeekAnchor {
    fn weekday(self) -> Weekday {
        match self {
            WeekAnchor::Mon => Weekday::Mon,
            WeekAnchor::Tue => Weekday::Tue,
            WeekAnchor::Wed => Weekday::Wed,
            WeekAnchor::Thu => Weekday::Thu,
            WeekAnchor::Fri => Weekday::Fri,
            WeekAnchor::Sat => Weekday::Sat,
            WeekAnchor::Sun => Weekday::Sun,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Import an export, drop implausible rows, and emit one JSON line per
    /// retained activity (or write a cleaned CSV with --out)
    Clean {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Fit a least-squares trend for one metric and print it as JSON
    Trend {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, value_enum)]
        metric: MetricArg,
        /// Average per calendar week before fitting
        #[arg(long)]
        weekly: bool,
        #[arg(long, value_enum)]
        week_anchor: Option<WeekAnchor>,
        /// Restrict to the named activity types (repeatable)
        #[arg(long)]
        activity_type: Vec<String>,
    },
    /// Render average/max heart rate with trend lines to a PNG
    PlotHr {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        weekly: bool,
        #[arg(long, value_enum)]
        week_anchor: Option<WeekAnchor>,
        #[arg(long)]
        activity_type: Vec<String>,
        #[arg(long)]
        title: Option<String>,
    },
    /// Render VO2max with its trend line to a PNG
    PlotVo2max {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        title: Option<String>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Clean { input, config, out } => {
            cmd_clean(&input, config.as_deref(), out.as_deref())
        }
        Commands::Trend {
            input,
            config,
            metric,
            weekly,
            week_anchor,
            activity_type,
        } => cmd_trend(
            &input,
            config.as_deref(),
            metric,
            weekly,
            week_anchor,
            &activity_type,
        ),
        Commands::PlotHr {
            input,
            config,
            out,
            weekly,
            week_anchor,
            activity_type,
            title,
        } => cmd_plot_hr(
            &input,
            config.as_deref(),
            &out,
            weekly,
            week_anchor,
            &activity_type,
            title.as_deref(),
        ),
        Commands::PlotVo2max {
            input,
            config,
            out,
            title,
        } => cmd_plot_vo2max(&input, config.as_deref(), &out, title.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Ok(Config::from_path(path)?),
        None => Ok(Config::default()),
    }
}

/// Import plus outlier filter: the record set every subcommand starts from.
fn load_cleaned(input: &Path, config: &Config) -> Result<ActivityLog> {
    let log = garmin::read_activities(input)?;
    let activities = garmin::drop_implausible(&log.activities, &config.speed_limits());
    Ok(ActivityLog {
        columns: log.columns,
        activities,
    })
}

fn resolve_anchor(flag: Option<WeekAnchor>, config: &Config) -> Result<Weekday> {
    if let Some(anchor) = flag {
        return Ok(anchor.weekday());
    }
    Ok(config.week_anchor()?.unwrap_or(Weekday::Sun))
}

fn cmd_clean(input: &Path, config: Option<&Path>, out: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let log = load_cleaned(input, &config)?;
    match out {
        Some(path) => garmin::write_activities(path, &log)?,
        None => {
            for activity in &log.activities {
                println!("{}", serde_json::to_string(activity)?);
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct TrendOutput<'a> {
    metric: &'a str,
    weekly: bool,
    n: usize,
    slope: f64,
    intercept: f64,
    timestamps: &'a [DateTime<Utc>],
    values: &'a [f64],
    fitted: &'a [f64],
}

fn cmd_trend(
    input: &Path,
    config: Option<&Path>,
    metric: MetricArg,
    weekly: bool,
    week_anchor: Option<WeekAnchor>,
    activity_types: &[String],
) -> Result<()> {
    let config = load_config(config)?;
    let log = load_cleaned(input, &config)?;
    let anchor = resolve_anchor(week_anchor, &config)?;
    let series = select_series(&log, metric.metric(), activity_types, weekly, anchor);
    let trend = fit_trend(&series)?;
    let output = TrendOutput {
        metric: metric.metric().column(),
        weekly,
        n: series.len(),
        slope: trend.slope,
        intercept: trend.intercept,
        timestamps: &series.timestamps,
        values: &series.values,
        fitted: &trend.fitted,
    };
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn select_series(
    log: &ActivityLog,
    metric: Metric,
    activity_types: &[String],
    weekly: bool,
    anchor: Weekday,
) -> MetricSeries {
    let activities = garmin::filter_types(&log.activities, activity_types);
    let series = metric_series(&activities, metric);
    if weekly {
        resample_weekly(&series, anchor)
    } else {
        series
    }
}

/// Fit a trend, or log and skip the metric when it has too few observations.
fn trended(series: MetricSeries, label: &str) -> Option<(MetricSeries, Trend)> {
    match fit_trend(&series) {
        Ok(trend) => Some((series, trend)),
        Err(err) => {
            warn!("skipping {label}: {err}");
            None
        }
    }
}

fn cmd_plot_hr(
    input: &Path,
    config: Option<&Path>,
    out: &Path,
    weekly: bool,
    week_anchor: Option<WeekAnchor>,
    activity_types: &[String],
    title: Option<&str>,
) -> Result<()> {
    let config = load_config(config)?;
    let log = load_cleaned(input, &config)?;
    let anchor = resolve_anchor(week_anchor, &config)?;
    let avg = trended(
        select_series(&log, Metric::AverageHeartRate, activity_types, weekly, anchor),
        Metric::AverageHeartRate.label(),
    );
    let max = trended(
        select_series(&log, Metric::MaxHeartRate, activity_types, weekly, anchor),
        Metric::MaxHeartRate.label(),
    );
    if avg.is_none() && max.is_none() {
        bail!("no heart rate metric has enough observations to plot");
    }
    let title = title.unwrap_or("Heart Rate Trends Over Time In All Activities");
    let fig = heart_rate_figure(
        title,
        avg.as_ref().map(|(s, t)| (s, t)),
        max.as_ref().map(|(s, t)| (s, t)),
    );
    draw_plotters_figure(out, &fig)
}

fn cmd_plot_vo2max(
    input: &Path,
    config: Option<&Path>,
    out: &Path,
    title: Option<&str>,
) -> Result<()> {
    let config = load_config(config)?;
    let log = load_cleaned(input, &config)?;
    let series = metric_series(&log.activities, Metric::Vo2Max);
    let trend = fit_trend(&series)?;
    let title = title.unwrap_or("VO2 Max Trends Over Time");
    let fig = vo2max_figure(title, &series, &trend);
    draw_plotters_figure(out, &fig)
}

fn draw_plotters_figure(path: &Path, fig: &Figure) -> Result<()> {
    let backend = BitMapBackend::new(path, (900, 540));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;

    let (x_min, x_max) = axis_range(fig, 0, 86_400.0);
    let (y_min, y_max) = axis_range(fig, 1, 1.0);
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(
            fig.title.clone().unwrap_or_else(|| "Plot".into()),
            ("sans-serif", 24),
        )
        .x_label_area_size(35)
        .y_label_area_size(50)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
    chart
        .configure_mesh()
        .x_labels(8)
        .x_label_formatter(&|x| format_date_tick(*x))
        .x_desc(fig.x.label.clone().unwrap_or_default())
        .y_desc(fig.y.label.clone().unwrap_or_default())
        .draw()?;

    for series in &fig.series {
        match series {
            Series::Line(line) => {
                let color = RGBColor(
                    ((line.style.color.0 >> 16) & 0xFF) as u8,
                    ((line.style.color.0 >> 8) & 0xFF) as u8,
                    (line.style.color.0 & 0xFF) as u8,
                );
                let style = color.stroke_width(line.style.width.max(1.0) as u32);
                let points = line.points.iter().map(|p| (p[0], p[1]));
                let anno = match line.style.dash {
                    Some([size, spacing]) => chart.draw_series(DashedLineSeries::new(
                        points,
                        size as u32,
                        spacing as u32,
                        style,
                    ))?,
                    None => chart.draw_series(LineSeries::new(points, style))?,
                };
                anno.label(line.name.clone())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], style));
            }
        }
    }
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

/// Min/max of one point component across every series, padded when the
/// figure would otherwise be degenerate.
fn axis_range(fig: &Figure, component: usize, pad: f64) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for series in &fig.series {
        match series {
            Series::Line(line) => {
                for point in &line.points {
                    min = min.min(point[component]);
                    max = max.max(point[component]);
                }
            }
        }
    }
    if !min.is_finite() || !max.is_finite() {
        return (0.0, pad);
    }
    if min == max {
        return (min - pad, max + pad);
    }
    (min, max)
}

fn format_date_tick(unix_secs: f64) -> String {
    DateTime::<Utc>::from_timestamp(unix_secs as i64, 0)
        .map(|ts| ts.format("%Y-%m").to_string())
        .unwrap_or_default()
}
