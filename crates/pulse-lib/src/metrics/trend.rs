use crate::activity::{Activity, Metric, MetricSeries};
use chrono::{DateTime, Datelike, NaiveTime, TimeDelta, Utc, Weekday};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrendError {
    #[error("need at least 2 observations for a trend, have {have}")]
    InsufficientData { have: usize },
}

/// Least-squares line fitted against observation index, paired 1:1 with the
/// input series via `fitted`.
///
/// The slope is "per observation", not per unit time: with irregular
/// sampling the two differ, and the index convention is kept on purpose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trend {
    pub slope: f64,
    pub intercept: f64,
    pub fitted: Vec<f64>,
}

/// Extract one metric from the records, skipping rows where the metric is
/// absent. The caller supplies records ordered by start time; ordering is a
/// precondition, not something this function enforces.
pub fn metric_series(activities: &[Activity], metric: Metric) -> MetricSeries {
    let mut series = MetricSeries::default();
    for activity in activities {
        if let Some(value) = metric.value_of(activity) {
            series.timestamps.push(activity.start_time);
            series.values.push(value);
        }
    }
    series
}

/// Ordinary least squares of `value ~ index`.
pub fn fit_trend(series: &MetricSeries) -> Result<Trend, TrendError> {
    let n = series.values.len();
    if n < 2 {
        return Err(TrendError::InsufficientData { have: n });
    }
    let (slope, intercept) = linear_fit(&series.values);
    let fitted = (0..n).map(|i| slope * i as f64 + intercept).collect();
    Ok(Trend {
        slope,
        intercept,
        fitted,
    })
}

/// Regroup the series into calendar weeks ending on `anchor` and average
/// each bucket. Weeks with no observations produce no bucket; the output is
/// ordered by bucket label.
pub fn resample_weekly(series: &MetricSeries, anchor: Weekday) -> MetricSeries {
    let mut buckets: BTreeMap<DateTime<Utc>, (f64, usize)> = BTreeMap::new();
    for (timestamp, value) in series.timestamps.iter().zip(&series.values) {
        let bucket = buckets.entry(week_label(*timestamp, anchor)).or_insert((0.0, 0));
        bucket.0 += value;
        bucket.1 += 1;
    }
    debug!(
        "resampled {} observations into {} weekly bucket(s)",
        series.len(),
        buckets.len()
    );
    let mut out = MetricSeries::default();
    for (label, (sum, count)) in buckets {
        out.timestamps.push(label);
        out.values.push(sum / count as f64);
    }
    out
}

/// Bucket label for a timestamp: the next occurrence of `anchor` at midnight
/// UTC, where the observation's own day counts as "next". An observation on
/// the anchor weekday therefore labels its own date.
fn week_label(timestamp: DateTime<Utc>, anchor: Weekday) -> DateTime<Utc> {
    let date = timestamp.date_naive();
    let ahead =
        (anchor.num_days_from_monday() + 7 - date.weekday().num_days_from_monday()) % 7;
    (date + TimeDelta::days(i64::from(ahead)))
        .and_time(NaiveTime::MIN)
        .and_utc()
}

fn linear_fit(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xx = 0.0;
    let mut sum_xy = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xx += x * x;
        sum_xy += x * y;
    }
    let denom = n * sum_xx - sum_x * sum_x;
    if denom.abs() < f64::EPSILON {
        return (0.0, sum_y / n);
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n;
    (slope, intercept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn assert_close(actual: f64, expected: f64, rel_tol: f64) {
        let tol = expected.abs().max(1.0) * rel_tol;
        let diff = (actual - expected).abs();
        assert!(
            diff <= tol,
            "expected {expected}, got {actual} (diff {diff} > tol {tol})"
        );
    }

    fn ts(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
    }

    fn series(points: &[(DateTime<Utc>, f64)]) -> MetricSeries {
        MetricSeries {
            timestamps: points.iter().map(|(t, _)| *t).collect(),
            values: points.iter().map(|(_, v)| *v).collect(),
        }
    }

    #[test]
    fn fits_a_synthetic_line_exactly() {
        let values: Vec<f64> = (0..12).map(|i| 3.0 * i as f64 + 7.0).collect();
        let timestamps: Vec<DateTime<Utc>> =
            (0..12).map(|i| ts(2023, 1, 1 + i as u32, 8)).collect();
        let trend = fit_trend(&MetricSeries { timestamps, values }).unwrap();
        assert_close(trend.slope, 3.0, 1e-12);
        assert_close(trend.intercept, 7.0, 1e-12);
        assert_close(trend.fitted[0], 7.0, 1e-12);
        assert_close(trend.fitted[11], 40.0, 1e-12);
        assert_eq!(trend.fitted.len(), 12);
    }

    #[test]
    fn one_observation_is_insufficient() {
        let single = series(&[(ts(2023, 1, 1, 8), 41.0)]);
        let err = fit_trend(&single).unwrap_err();
        assert!(matches!(err, TrendError::InsufficientData { have: 1 }));
    }

    #[test]
    fn empty_series_is_insufficient() {
        let err = fit_trend(&MetricSeries::default()).unwrap_err();
        assert!(matches!(err, TrendError::InsufficientData { have: 0 }));
    }

    #[test]
    fn same_week_observations_average_into_one_bucket() {
        // Tuesday and Thursday of the same week
        let input = series(&[(ts(2023, 1, 3, 7), 10.0), (ts(2023, 1, 5, 18), 20.0)]);
        let weekly = resample_weekly(&input, Weekday::Sun);
        assert_eq!(weekly.len(), 1);
        assert_close(weekly.values[0], 15.0, 1e-12);
        // week ends the following Sunday at midnight
        assert_eq!(weekly.timestamps[0], ts(2023, 1, 8, 0));
    }

    #[test]
    fn empty_weeks_produce_no_bucket() {
        // observations two weeks apart: the week between them must not appear
        let input = series(&[
            (ts(2023, 1, 3, 7), 10.0),
            (ts(2023, 1, 17, 7), 30.0),
        ]);
        let weekly = resample_weekly(&input, Weekday::Sun);
        assert_eq!(weekly.len(), 2);
        assert_eq!(weekly.timestamps[0], ts(2023, 1, 8, 0));
        assert_eq!(weekly.timestamps[1], ts(2023, 1, 22, 0));
    }

    #[test]
    fn anchor_day_observation_labels_its_own_date() {
        let sunday_morning = ts(2023, 1, 8, 9);
        let weekly = resample_weekly(&series(&[(sunday_morning, 12.0)]), Weekday::Sun);
        assert_eq!(weekly.timestamps[0], ts(2023, 1, 8, 0));
    }

    #[test]
    fn anchor_weekday_is_configurable() {
        // Tuesday observation, Monday-anchored weeks: label is the next Monday
        let weekly = resample_weekly(&series(&[(ts(2023, 1, 3, 7), 5.0)]), Weekday::Mon);
        assert_eq!(weekly.timestamps[0], ts(2023, 1, 9, 0));
    }

    #[test]
    fn weekly_output_is_ordered_even_if_input_is_not() {
        let input = series(&[
            (ts(2023, 2, 7, 7), 20.0),
            (ts(2023, 1, 3, 7), 10.0),
        ]);
        let weekly = resample_weekly(&input, Weekday::Sun);
        assert!(weekly.timestamps[0] < weekly.timestamps[1]);
    }

    #[test]
    fn single_weekly_bucket_is_insufficient_for_a_trend() {
        let input = series(&[(ts(2023, 1, 3, 7), 10.0), (ts(2023, 1, 5, 18), 20.0)]);
        let weekly = resample_weekly(&input, Weekday::Sun);
        let err = fit_trend(&weekly).unwrap_err();
        assert!(matches!(err, TrendError::InsufficientData { have: 1 }));
    }

    #[test]
    fn metric_extraction_skips_absent_values() {
        use crate::activity::Activity;
        let base = ts(2023, 1, 2, 8);
        let mut activities = Vec::new();
        for (offset, vo2max) in [(0, Some(41.0)), (1, None), (2, Some(42.5))] {
            activities.push(Activity {
                activity_type: "Running".into(),
                start_time: base + TimeDelta::days(offset),
                end_time: base + TimeDelta::days(offset) + TimeDelta::hours(1),
                duration: TimeDelta::hours(1),
                distance_km: None,
                calories: None,
                max_speed_kmh: 14.0,
                average_heart_rate_bpm: None,
                max_heart_rate_bpm: None,
                vo2max,
            });
        }
        let series = metric_series(&activities, Metric::Vo2Max);
        assert_eq!(series.len(), 2);
        assert_eq!(series.values, vec![41.0, 42.5]);
        assert_eq!(series.timestamps[1], base + TimeDelta::days(2));
    }
}
