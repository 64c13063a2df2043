use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// One recorded exercise session after import and type coercion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub activity_type: String,
    /// UTC-normalized session start.
    pub start_time: DateTime<Utc>,
    /// UTC-normalized session end; never before `start_time`.
    pub end_time: DateTime<Utc>,
    /// Elapsed time, serialized as fractional seconds.
    #[serde(with = "duration_secs")]
    pub duration: TimeDelta,
    pub distance_km: Option<f64>,
    pub calories: Option<f64>,
    pub max_speed_kmh: f64,
    pub average_heart_rate_bpm: Option<f64>,
    pub max_heart_rate_bpm: Option<f64>,
    pub vo2max: Option<f64>,
}

/// Cleaned record set: the retained column names in source order plus the
/// typed rows, row order preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLog {
    pub columns: Vec<String>,
    pub activities: Vec<Activity>,
}

/// Metric columns the trend tooling knows how to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    AverageHeartRate,
    MaxHeartRate,
    Vo2Max,
}

impl Metric {
    /// Exact header name in the source export.
    pub fn column(self) -> &'static str {
        match self {
            Metric::AverageHeartRate => "Average Heart Rate (bpm)",
            Metric::MaxHeartRate => "Max. Heart Rate (bpm)",
            Metric::Vo2Max => "VO2max",
        }
    }

    /// Short legend label.
    pub fn label(self) -> &'static str {
        match self {
            Metric::AverageHeartRate => "Avg HR",
            Metric::MaxHeartRate => "Max HR",
            Metric::Vo2Max => "VO2max",
        }
    }

    /// Y-axis label for charts of this metric.
    pub fn axis_label(self) -> &'static str {
        match self {
            Metric::AverageHeartRate | Metric::MaxHeartRate => "Heart Rate (bpm)",
            Metric::Vo2Max => "VO2max",
        }
    }

    pub fn value_of(self, activity: &Activity) -> Option<f64> {
        match self {
            Metric::AverageHeartRate => activity.average_heart_rate_bpm,
            Metric::MaxHeartRate => activity.max_heart_rate_bpm,
            Metric::Vo2Max => activity.vo2max,
        }
    }
}

/// Timestamped values of a single metric, one entry per observation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricSeries {
    pub timestamps: Vec<DateTime<Utc>>,
    pub values: Vec<f64>,
}

impl MetricSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

mod duration_secs {
    use chrono::TimeDelta;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.num_milliseconds() as f64 / 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        TimeDelta::try_milliseconds((secs * 1000.0).round() as i64)
            .ok_or_else(|| de::Error::custom("duration out of range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn activity() -> Activity {
        Activity {
            activity_type: "Running".into(),
            start_time: Utc.with_ymd_and_hms(2023, 3, 4, 9, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2023, 3, 4, 9, 45, 30).unwrap(),
            duration: TimeDelta::seconds(2730),
            distance_km: Some(9.2),
            calories: Some(512.0),
            max_speed_kmh: 15.8,
            average_heart_rate_bpm: Some(152.0),
            max_heart_rate_bpm: Some(181.0),
            vo2max: None,
        }
    }

    #[test]
    fn duration_serializes_as_seconds() {
        let json = serde_json::to_value(activity()).unwrap();
        assert_eq!(json["duration"], serde_json::json!(2730.0));
        assert_eq!(json["vo2max"], serde_json::Value::Null);
    }

    #[test]
    fn activity_round_trips_through_json() {
        let original = activity();
        let json = serde_json::to_string(&original).unwrap();
        let parsed: Activity = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.start_time, original.start_time);
        assert_eq!(parsed.duration, original.duration);
        assert_eq!(parsed.max_heart_rate_bpm, original.max_heart_rate_bpm);
    }

    #[test]
    fn metric_reads_the_matching_field() {
        let a = activity();
        assert_eq!(Metric::AverageHeartRate.value_of(&a), Some(152.0));
        assert_eq!(Metric::MaxHeartRate.value_of(&a), Some(181.0));
        assert_eq!(Metric::Vo2Max.value_of(&a), None);
    }
}
