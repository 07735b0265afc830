use crate::app::AppContext;
use crate::error::{AppResult, ValidationError};
use crate::models::{Reading, Report, Session};
use crate::screen::{LiveView, Screen};
use crate::session::now_millis;
use crate::storage::{collections, decode_snapshot, fetch_all, insert, Direction, Query, Snapshot};
use chrono::{DateTime, SecondsFormat, Utc};
use futures_util::future::LocalBoxFuture;
use log::info;

/// Charts never show more than this many trailing samples.
pub const MAX_CHART_POINTS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimeWindow {
    ThirtyMinutes,
    #[default]
    OneHour,
    TwentyFourHours,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 3] = [
        TimeWindow::ThirtyMinutes,
        TimeWindow::OneHour,
        TimeWindow::TwentyFourHours,
    ];

    pub fn minutes(self) -> i64 {
        match self {
            TimeWindow::ThirtyMinutes => 30,
            TimeWindow::OneHour => 60,
            TimeWindow::TwentyFourHours => 24 * 60,
        }
    }

    pub fn millis(self) -> i64 {
        self.minutes() * 60 * 1000
    }

    /// Console shorthand: `30m`, `1h` or `24h`.
    pub fn short_label(self) -> &'static str {
        match self {
            TimeWindow::ThirtyMinutes => "30m",
            TimeWindow::OneHour => "1h",
            TimeWindow::TwentyFourHours => "24h",
        }
    }

    pub fn parse(arg: &str) -> Option<TimeWindow> {
        TimeWindow::ALL
            .into_iter()
            .find(|window| window.short_label().eq_ignore_ascii_case(arg))
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeWindow::ThirtyMinutes => "30 minutes",
            TimeWindow::OneHour => "1 hour",
            TimeWindow::TwentyFourHours => "24 hours",
        }
    }
}

/// A reading with both values present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub bpm: f64,
    pub o2: f64,
    pub timestamp: i64,
}

pub fn usable_samples(readings: &[Reading]) -> Vec<Sample> {
    readings
        .iter()
        .filter_map(|r| match (r.bpm, r.o2) {
            (Some(bpm), Some(o2)) => Some(Sample {
                bpm,
                o2,
                timestamp: r.timestamp,
            }),
            _ => None,
        })
        .collect()
}

/// A series can be drawn only when it is non-empty and every value is a
/// finite, non-zero number.
pub fn is_chartable(values: &[f64]) -> bool {
    !values.is_empty() && values.iter().all(|v| v.is_finite() && *v != 0.0)
}

pub fn chart_points(values: &[f64]) -> &[f64] {
    &values[values.len().saturating_sub(MAX_CHART_POINTS)..]
}

/// Readings of `user_id` taken at or after `since`, oldest first.
pub fn readings_since(user_id: &str, since: i64) -> Query {
    Query::new(collections::READINGS)
        .where_eq("userid", user_id)
        .where_gte("timestamp", since)
        .order_by("timestamp", Direction::Ascending)
}

fn iso_timestamp(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Builds the export record for `readings`, or `None` when nothing usable remains.
pub fn build_report(user_id: &str, window: TimeWindow, readings: &[Reading], now: i64) -> Option<Report> {
    let mut report = Report {
        id: String::new(),
        user_id: user_id.to_string(),
        created_at: now,
        time_range: format!("{} minutes", window.minutes()),
        bpm: Vec::new(),
        o2: Vec::new(),
        timestamps: Vec::new(),
    };
    for sample in usable_samples(readings) {
        let Some(stamp) = iso_timestamp(sample.timestamp) else {
            continue;
        };
        report.bpm.push(sample.bpm);
        report.o2.push(sample.o2);
        report.timestamps.push(stamp);
    }
    if report.bpm.is_empty() {
        None
    } else {
        Some(report)
    }
}

/// Stores the readings of the selected window in `patient_reports`.
pub async fn export_report(ctx: &AppContext, user_id: &str, window: TimeWindow) -> AppResult<String> {
    let now = now_millis();
    let readings: Vec<Reading> = fetch_all(ctx.store(), &readings_since(user_id, now - window.millis())).await?;
    let report = build_report(user_id, window, &readings, now).ok_or(ValidationError::NoReadings)?;
    let id = insert(ctx.store(), collections::PATIENT_REPORTS, &report).await?;
    info!("[Metrics] Exported {} samples as report {}", report.bpm.len(), id);
    Ok(id)
}

/// Live heart-rate and oxygen series for the signed-in patient.
#[derive(Debug, Default)]
pub struct MetricsView {
    window: TimeWindow,
    heart_rate: Vec<f64>,
    spo2: Vec<f64>,
}

pub type MetricsScreen = Screen<MetricsView>;

impl MetricsView {
    pub fn new(window: TimeWindow) -> Self {
        MetricsView {
            window,
            ..MetricsView::default()
        }
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    /// Takes effect on the next focus, which reopens the live query.
    pub fn set_window(&mut self, window: TimeWindow) {
        self.window = window;
    }

    pub fn heart_rate(&self) -> &[f64] {
        &self.heart_rate
    }

    pub fn spo2(&self) -> &[f64] {
        &self.spo2
    }

    pub fn current_heart_rate(&self) -> f64 {
        self.heart_rate.last().copied().unwrap_or(0.0)
    }

    pub fn current_spo2(&self) -> f64 {
        self.spo2.last().copied().unwrap_or(0.0)
    }

    pub fn set_samples(&mut self, samples: &[Sample]) {
        self.heart_rate = samples.iter().map(|s| s.bpm).collect();
        self.spo2 = samples.iter().map(|s| s.o2).collect();
    }
}

impl LiveView for MetricsView {
    type Key = (String, TimeWindow);

    fn scope(&self, session: &Session) -> Option<Self::Key> {
        Some((session.subject_id.clone(), self.window))
    }

    fn query(&self, (user_id, window): &Self::Key) -> Query {
        readings_since(user_id, now_millis() - window.millis())
    }

    fn apply<'a>(&'a mut self, _session: &'a Session, snapshot: Snapshot) -> LocalBoxFuture<'a, ()> {
        Box::pin(async move {
            let readings: Vec<Reading> = decode_snapshot(&snapshot);
            self.set_samples(&usable_samples(&readings));
        })
    }
}
