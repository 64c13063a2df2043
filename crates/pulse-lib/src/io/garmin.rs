use crate::activity::{Activity, ActivityLog};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use log::{debug, info};
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// Columns the cleaner removes from a raw export. Every one of them must be
/// present in the header; a partial match means the file is not the export
/// format this reader understands.
pub const DROPPED_COLUMNS: [&str; 22] = [
    "Description",
    "Activity Parent",
    "Privacy",
    "Gear",
    "Time Zone",
    "Offset",
    "Activity ID",
    "Activity Name",
    "Location Name",
    "File Format",
    "Average Moving Speed (km/h or min/km)",
    "Max. Speed (km/h or min/km)",
    "Elapsed Duration (h:m:s)",
    "Moving Duration (h:m:s)",
    "Average Speed (km/h or min/km)",
    "Device",
    "Begin Latitude (\u{b0}DD)",
    "End Latitude (\u{b0}DD)",
    "Begin Longitude (\u{b0}DD)",
    "End Longitude (\u{b0}DD)",
    "Strokes",
    "Elevation Corrected",
];

pub const RUNNING_TYPES: [&str; 3] = ["Running", "Trail Running", "Treadmill Running"];
pub const CYCLING_TYPES: [&str; 3] = ["Cycling", "Mountain Biking", "Indoor Cycling"];

/// Fastest recorded human footspeed, km/h (Usain Bolt, Berlin 2009).
pub const MAX_RUNNING_SPEED_KMH: f64 = 44.72;
/// Bicycle land-speed record, km/h.
pub const MAX_CYCLING_SPEED_KMH: f64 = 296.009;

const ACTIVITY_TYPE_COL: &str = "Activity Type";
const START_TIME_COL: &str = "Start Time";
const END_TIME_COL: &str = "End Time";
const DURATION_COL: &str = "Duration (h:m:s)";
const MAX_SPEED_COL: &str = "Max. Speed (km/h)";
const DISTANCE_COL: &str = "Distance (km)";
const CALORIES_COL: &str = "Calories";
const AVG_HR_COL: &str = "Average Heart Rate (bpm)";
const MAX_HR_COL: &str = "Max. Heart Rate (bpm)";
const VO2MAX_COL: &str = "VO2max";

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("missing expected column `{0}`")]
    MissingColumn(String),
    #[error("row {row}: invalid timestamp `{value}`")]
    InvalidTimestamp { row: usize, value: String },
    #[error("row {row}: invalid duration `{value}`")]
    InvalidDuration { row: usize, value: String },
    #[error("row {row}: column `{column}` holds invalid number `{value}`")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },
    #[error("row {row}: start time is after end time")]
    StartAfterEnd { row: usize },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Upper speed bounds used to reject physically implausible records.
#[derive(Debug, Clone, Copy)]
pub struct SpeedLimits {
    /// Running-family records at or above this max speed are dropped (km/h).
    pub running_kmh: f64,
    /// Cycling-family records at or above this max speed are dropped (km/h).
    pub cycling_kmh: f64,
}

impl Default for SpeedLimits {
    fn default() -> Self {
        Self {
            running_kmh: MAX_RUNNING_SPEED_KMH,
            cycling_kmh: MAX_CYCLING_SPEED_KMH,
        }
    }
}

/// Read an activity export, validate its schema, and coerce each row into a
/// typed [`Activity`]. The retained column set is (all columns) minus
/// [`DROPPED_COLUMNS`], source order preserved.
pub fn read_activities(path: &Path) -> Result<ActivityLog, ImportError> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(file);
    let headers = reader.headers()?.clone();

    for column in DROPPED_COLUMNS {
        locate(&headers, column)?;
    }
    let columns: Vec<String> = headers
        .iter()
        .filter(|name| !DROPPED_COLUMNS.iter().any(|dropped| dropped == name))
        .map(str::to_string)
        .collect();

    let type_idx = locate(&headers, ACTIVITY_TYPE_COL)?;
    let start_idx = locate(&headers, START_TIME_COL)?;
    let end_idx = locate(&headers, END_TIME_COL)?;
    let duration_idx = locate(&headers, DURATION_COL)?;
    let speed_idx = locate(&headers, MAX_SPEED_COL)?;
    let distance_idx = locate(&headers, DISTANCE_COL).ok();
    let calories_idx = locate(&headers, CALORIES_COL).ok();
    let avg_hr_idx = locate(&headers, AVG_HR_COL).ok();
    let max_hr_idx = locate(&headers, MAX_HR_COL).ok();
    let vo2max_idx = locate(&headers, VO2MAX_COL).ok();

    let mut activities = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result?;
        // 1-based data row number, header excluded
        let row = index + 1;
        let start_time = parse_timestamp(field(&record, start_idx), row)?;
        let end_time = parse_timestamp(field(&record, end_idx), row)?;
        if start_time > end_time {
            return Err(ImportError::StartAfterEnd { row });
        }
        let duration = parse_duration(field(&record, duration_idx), row)?;
        let max_speed_kmh = parse_speed(field(&record, speed_idx), row)?;
        activities.push(Activity {
            activity_type: field(&record, type_idx).to_string(),
            start_time,
            end_time,
            duration,
            distance_km: parse_metric(&record, distance_idx, DISTANCE_COL, row)?,
            calories: parse_metric(&record, calories_idx, CALORIES_COL, row)?,
            max_speed_kmh,
            average_heart_rate_bpm: parse_metric(&record, avg_hr_idx, AVG_HR_COL, row)?,
            max_heart_rate_bpm: parse_metric(&record, max_hr_idx, MAX_HR_COL, row)?,
            vo2max: parse_metric(&record, vo2max_idx, VO2MAX_COL, row)?,
        });
    }
    debug!(
        "imported {} activities, {} retained columns from {}",
        activities.len(),
        columns.len(),
        path.display()
    );
    Ok(ActivityLog {
        columns,
        activities,
    })
}

/// Drop records whose max speed is beyond what the activity family allows.
/// A record is removed only when it matches a family AND exceeds that
/// family's limit; everything else passes through unchanged. Idempotent.
pub fn drop_implausible(activities: &[Activity], limits: &SpeedLimits) -> Vec<Activity> {
    let kept: Vec<Activity> = activities
        .iter()
        .filter(|activity| {
            let kind = activity.activity_type.as_str();
            let over_running =
                RUNNING_TYPES.contains(&kind) && activity.max_speed_kmh >= limits.running_kmh;
            let over_cycling =
                CYCLING_TYPES.contains(&kind) && activity.max_speed_kmh >= limits.cycling_kmh;
            !(over_running || over_cycling)
        })
        .cloned()
        .collect();
    if kept.len() < activities.len() {
        info!(
            "dropped {} implausible record(s) out of {}",
            activities.len() - kept.len(),
            activities.len()
        );
    }
    kept
}

/// Retain only the named activity types. An empty filter keeps everything.
pub fn filter_types(activities: &[Activity], types: &[String]) -> Vec<Activity> {
    if types.is_empty() {
        return activities.to_vec();
    }
    activities
        .iter()
        .filter(|activity| types.iter().any(|t| t == &activity.activity_type))
        .cloned()
        .collect()
}

/// Write the cleaned record set back out as CSV. Only typed columns have
/// storage after coercion, so the header is the typed subset of
/// `log.columns`, in source order.
pub fn write_activities(path: &Path, log: &ActivityLog) -> Result<(), ImportError> {
    let typed: Vec<&str> = log
        .columns
        .iter()
        .map(String::as_str)
        .filter(|name| is_typed_column(name))
        .collect();
    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().from_writer(file);
    writer.write_record(&typed)?;
    for activity in &log.activities {
        let cells: Vec<String> = typed
            .iter()
            .map(|column| typed_cell(activity, column))
            .collect();
        writer.write_record(&cells)?;
    }
    writer.flush()?;
    Ok(())
}

fn is_typed_column(name: &str) -> bool {
    matches!(
        name,
        ACTIVITY_TYPE_COL
            | START_TIME_COL
            | END_TIME_COL
            | DURATION_COL
            | DISTANCE_COL
            | CALORIES_COL
            | MAX_SPEED_COL
            | AVG_HR_COL
            | MAX_HR_COL
            | VO2MAX_COL
    )
}

fn typed_cell(activity: &Activity, column: &str) -> String {
    match column {
        ACTIVITY_TYPE_COL => activity.activity_type.clone(),
        START_TIME_COL => activity.start_time.format(TIMESTAMP_FORMAT).to_string(),
        END_TIME_COL => activity.end_time.format(TIMESTAMP_FORMAT).to_string(),
        DURATION_COL => format_hms(activity.duration),
        DISTANCE_COL => optional_cell(activity.distance_km),
        CALORIES_COL => optional_cell(activity.calories),
        MAX_SPEED_COL => activity.max_speed_kmh.to_string(),
        AVG_HR_COL => optional_cell(activity.average_heart_rate_bpm),
        MAX_HR_COL => optional_cell(activity.max_heart_rate_bpm),
        VO2MAX_COL => optional_cell(activity.vo2max),
        _ => String::new(),
    }
}

fn optional_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn format_hms(delta: TimeDelta) -> String {
    let total = delta.num_seconds();
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

fn locate(headers: &StringRecord, name: &str) -> Result<usize, ImportError> {
    headers
        .iter()
        .position(|header| header == name)
        .ok_or_else(|| ImportError::MissingColumn(name.to_string()))
}

fn field<'r>(record: &'r StringRecord, idx: usize) -> &'r str {
    record.get(idx).unwrap_or("")
}

/// Accepts RFC 3339 or `%Y-%m-%d %H:%M:%S` (naive input is taken as UTC).
/// Anything else is a hard error; timestamps are never silently nulled.
fn parse_timestamp(value: &str, row: usize) -> Result<DateTime<Utc>, ImportError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| ImportError::InvalidTimestamp {
            row,
            value: value.to_string(),
        })
}

/// Parse `h:m:s` with an optional fractional seconds part.
fn parse_duration(value: &str, row: usize) -> Result<TimeDelta, ImportError> {
    let invalid = || ImportError::InvalidDuration {
        row,
        value: value.to_string(),
    };
    let mut parts = value.split(':');
    let (h, m, s) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(m), Some(s), None) => (h, m, s),
        _ => return Err(invalid()),
    };
    let hours: i64 = h.parse().map_err(|_| invalid())?;
    let minutes: i64 = m.parse().map_err(|_| invalid())?;
    let seconds: f64 = s.parse().map_err(|_| invalid())?;
    if hours < 0 || !(0..60).contains(&minutes) || !(0.0..60.0).contains(&seconds) {
        return Err(invalid());
    }
    let millis = (hours * 3600 + minutes * 60) * 1000 + (seconds * 1000.0).round() as i64;
    TimeDelta::try_milliseconds(millis).ok_or_else(invalid)
}

/// Max speed is required and non-negative; the outlier filter depends on it.
fn parse_speed(value: &str, row: usize) -> Result<f64, ImportError> {
    let invalid = || ImportError::InvalidNumber {
        row,
        column: MAX_SPEED_COL.to_string(),
        value: value.to_string(),
    };
    let speed: f64 = value.parse().map_err(|_| invalid())?;
    if speed < 0.0 {
        return Err(invalid());
    }
    Ok(speed)
}

/// Optional numeric cell: empty and `--` mean absent; any other text that
/// fails to parse is a hard error.
fn parse_metric(
    record: &StringRecord,
    idx: Option<usize>,
    column: &str,
    row: usize,
) -> Result<Option<f64>, ImportError> {
    let Some(idx) = idx else {
        return Ok(None);
    };
    let value = field(record, idx);
    if value.is_empty() || value == "--" {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| ImportError::InvalidNumber {
            row,
            column: column.to_string(),
            value: value.to_string(),
        })
}
