//! Aggregates over exported readings.
//!
//! The statistics are pure functions over numeric series. An empty series
//! has no statistics (`None`, shown as "N/A").

use crate::app::AppContext;
use crate::error::AppResult;
use crate::models::Report;
use crate::storage::{collections, fetch_all, Direction, Query};
use chrono::{Local, NaiveDate, NaiveTime, TimeZone};
use std::fmt;

pub const BPM_LOW: f64 = 50.0;
pub const BPM_HIGH: f64 = 120.0;
pub const SPO2_LOW: f64 = 90.0;

/// Rounded arithmetic mean.
pub fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some((values.iter().sum::<f64>() / values.len() as f64).round())
}

/// Middle value; the rounded mean of the two middle values for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some(((sorted[mid - 1] + sorted[mid]) / 2.0).round())
    }
}

pub fn peak(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

pub fn trough(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

pub fn is_abnormal_bpm(bpm: f64) -> bool {
    !(BPM_LOW..=BPM_HIGH).contains(&bpm)
}

pub fn is_abnormal_spo2(o2: f64) -> bool {
    o2 < SPO2_LOW
}

/// True when any heart rate falls outside [50, 120] or any oxygen level is below 90.
pub fn has_irregular_values(bpm: &[f64], o2: &[f64]) -> bool {
    bpm.iter().any(|&v| is_abnormal_bpm(v)) || o2.iter().any(|&v| is_abnormal_spo2(v))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesStats {
    pub average: Option<f64>,
    pub median: Option<f64>,
    pub peak: Option<f64>,
    pub trough: Option<f64>,
}

impl SeriesStats {
    pub fn of(values: &[f64]) -> Self {
        SeriesStats {
            average: average(values),
            median: median(values),
            peak: peak(values),
            trough: trough(values),
        }
    }
}

/// Formats a statistic for display.
pub struct Stat(pub Option<f64>);

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{}", value),
            None => write!(f, "N/A"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportSummary {
    pub report_id: String,
    pub created_at: i64,
    pub time_range: String,
    pub bpm: SeriesStats,
    pub o2: SeriesStats,
    pub irregular: bool,
    pub peak_bpm_abnormal: bool,
    pub trough_bpm_abnormal: bool,
    pub peak_o2_abnormal: bool,
    pub trough_o2_abnormal: bool,
}

impl ReportSummary {
    pub fn of(report: &Report) -> Self {
        let bpm = SeriesStats::of(&report.bpm);
        let o2 = SeriesStats::of(&report.o2);
        ReportSummary {
            report_id: report.id.clone(),
            created_at: report.created_at,
            time_range: report.time_range.clone(),
            irregular: has_irregular_values(&report.bpm, &report.o2),
            peak_bpm_abnormal: bpm.peak.is_some_and(is_abnormal_bpm),
            trough_bpm_abnormal: bpm.trough.is_some_and(is_abnormal_bpm),
            peak_o2_abnormal: o2.peak.is_some_and(is_abnormal_spo2),
            trough_o2_abnormal: o2.trough.is_some_and(is_abnormal_spo2),
            bpm,
            o2,
        }
    }
}

/// Local-time bounds of `day` in epoch milliseconds, both inclusive.
pub fn day_bounds(day: NaiveDate) -> Option<(i64, i64)> {
    let start = Local.from_local_datetime(&day.and_hms_opt(0, 0, 0)?).earliest()?;
    let end_time = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?;
    let end = Local.from_local_datetime(&day.and_time(end_time)).latest()?;
    Some((start.timestamp_millis(), end.timestamp_millis()))
}

/// Reports of `patient_id` created on `day`, oldest first.
pub async fn reports_for_day(ctx: &AppContext, patient_id: &str, day: NaiveDate) -> AppResult<Vec<Report>> {
    let Some((start, end)) = day_bounds(day) else {
        return Ok(Vec::new());
    };
    let query = Query::new(collections::PATIENT_REPORTS)
        .where_eq("userid", patient_id)
        .where_gte("createdAt", start)
        .where_lte("createdAt", end)
        .order_by("createdAt", Direction::Ascending);
    Ok(fetch_all(ctx.store(), &query).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bpm_statistics() {
        let bpm = [72.0, 76.0, 80.0, 85.0];
        let stats = SeriesStats::of(&bpm);
        assert_eq!(stats.average, Some(78.0));
        assert_eq!(stats.median, Some(78.0));
        assert_eq!(stats.peak, Some(85.0));
        assert_eq!(stats.trough, Some(72.0));
    }

    #[test]
    fn test_spo2_average_rounds_half_up() {
        assert_eq!(average(&[95.0, 96.0, 97.0, 98.0]), Some(97.0));
        assert_eq!(median(&[98.0, 95.0, 97.0]), Some(97.0));
    }

    #[test]
    fn test_empty_series() {
        let stats = SeriesStats::of(&[]);
        assert_eq!(stats.average, None);
        assert_eq!(stats.median, None);
        assert_eq!(Stat(stats.peak).to_string(), "N/A");
        assert_eq!(Stat(Some(78.0)).to_string(), "78");
    }

    #[test]
    fn test_irregular_values() {
        assert!(has_irregular_values(&[72.0, 35.0], &[97.0]));
        assert!(has_irregular_values(&[72.0], &[57.0]));
        assert!(has_irregular_values(&[121.0], &[]));
        assert!(!has_irregular_values(&[50.0, 120.0], &[90.0]));
    }

    #[test]
    fn test_day_bounds_span_a_day() {
        let (start, end) = day_bounds(NaiveDate::from_ymd_opt(2030, 1, 15).unwrap()).unwrap();
        assert!(end > start);
        assert!(end - start <= 25 * 60 * 60 * 1000);
    }
}
