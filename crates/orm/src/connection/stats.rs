//! Pool statistics and load history

use super::pool::PoolSample;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Usage above this percentage stamps `last_high_usage`
pub const HIGH_USAGE_MARK: u32 = 80;
/// Usage below this percentage stamps `last_low_usage`
pub const LOW_USAGE_MARK: u32 = 20;
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;
/// Minimum samples inside the window before a trend is reported
pub const MIN_TREND_POINTS: usize = 5;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LastError {
    pub message: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub active: u32,
    pub idle: u32,
    pub total: u32,
    pub current_max: u32,
    pub usage_rate: u32,
    pub peak_active: u32,
    pub peak_idle: u32,
    pub peak_total: u32,
    pub error_count: u64,
    pub last_error: Option<LastError>,
    pub last_high_usage: Option<DateTime<Utc>>,
    pub last_low_usage: Option<DateTime<Utc>>,
    pub last_scale_up: Option<DateTime<Utc>>,
    pub last_scale_down: Option<DateTime<Utc>>,
}

impl PoolStats {
    pub fn new(current_max: u32) -> Self {
        Self {
            active: 0,
            idle: 0,
            total: 0,
            current_max,
            usage_rate: 0,
            peak_active: 0,
            peak_idle: 0,
            peak_total: 0,
            error_count: 0,
            last_error: None,
            last_high_usage: None,
            last_low_usage: None,
            last_scale_up: None,
            last_scale_down: None,
        }
    }

    /// Fold a sample in and return its usage rate
    pub fn record_sample(&mut self, sample: PoolSample, now: DateTime<Utc>) -> u32 {
        let usage = sample.usage_rate();

        self.active = sample.active;
        self.idle = sample.idle;
        self.total = sample.total;
        self.usage_rate = usage;

        self.peak_active = self.peak_active.max(sample.active);
        self.peak_idle = self.peak_idle.max(sample.idle);
        self.peak_total = self.peak_total.max(sample.total);

        if usage > HIGH_USAGE_MARK {
            self.last_high_usage = Some(now);
        }
        if usage < LOW_USAGE_MARK {
            self.last_low_usage = Some(now);
        }

        usage
    }

    /// A failed read zeroes the occupancy counters for the round
    pub fn record_error(&mut self, message: impl Into<String>, now: DateTime<Utc>) {
        self.active = 0;
        self.idle = 0;
        self.total = 0;
        self.usage_rate = 0;
        self.error_count += 1;
        self.last_error = Some(LastError {
            message: message.into(),
            time: now,
        });
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoadHistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub active: u32,
    pub idle: u32,
    pub total: u32,
    pub usage_rate: u32,
}

impl LoadHistoryRecord {
    pub fn from_sample(sample: PoolSample, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            active: sample.active,
            idle: sample.idle,
            total: sample.total,
            usage_rate: sample.usage_rate(),
        }
    }

    /// Record of a round whose sample could not be read
    pub fn zeroed(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            active: 0,
            idle: 0,
            total: 0,
            usage_rate: 0,
        }
    }
}

/// Bounded ring buffer of samples; the oldest record is dropped first
#[derive(Debug, Clone)]
pub struct LoadHistory {
    records: VecDeque<LoadHistoryRecord>,
    capacity: usize,
}

impl LoadHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, record: LoadHistoryRecord) {
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&LoadHistoryRecord> {
        self.records.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoadHistoryRecord> {
        self.records.iter()
    }

    /// Compare the two halves of the samples inside `window`
    pub fn trend(&self, window: Duration, now: DateTime<Utc>) -> TrendReport {
        let window_ms = window.as_millis() as i64;
        let usage: Vec<f64> = self
            .records
            .iter()
            .filter(|r| (now - r.timestamp).num_milliseconds() <= window_ms)
            .map(|r| r.usage_rate as f64)
            .collect();

        if usage.len() < MIN_TREND_POINTS {
            return TrendReport {
                trend: LoadTrend::InsufficientData,
                average_usage: None,
                first_half_average: None,
                second_half_average: None,
                data_points: usage.len(),
            };
        }

        let mid = usage.len() / 2;
        let first = mean(&usage[..mid]);
        let second = mean(&usage[mid..]);

        let trend = if second > first * 1.2 {
            LoadTrend::Increasing
        } else if second < first * 0.8 {
            LoadTrend::Decreasing
        } else {
            LoadTrend::Stable
        };

        TrendReport {
            trend,
            average_usage: Some(mean(&usage)),
            first_half_average: Some(first),
            second_half_average: Some(second),
            data_points: usage.len(),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoadTrend {
    InsufficientData,
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendReport {
    pub trend: LoadTrend,
    pub average_usage: Option<f64>,
    pub first_half_average: Option<f64>,
    pub second_half_average: Option<f64>,
    pub data_points: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn record(secs: i64, usage: u32) -> LoadHistoryRecord {
        LoadHistoryRecord {
            timestamp: at(secs),
            active: usage,
            idle: 100 - usage,
            total: 100,
            usage_rate: usage,
        }
    }

    #[test]
    fn test_history_never_exceeds_capacity() {
        let mut history = LoadHistory::new(100);
        for i in 0..250 {
            history.push(record(i, 50));
            assert!(history.len() <= 100);
        }
        assert_eq!(history.len(), 100);
        assert_eq!(history.iter().next().unwrap().timestamp, at(150));
    }

    #[test]
    fn test_record_sample_tracks_peaks_and_marks() {
        let mut stats = PoolStats::new(10);
        assert_eq!(stats.record_sample(PoolSample::new(9, 1), at(0)), 90);
        stats.record_sample(PoolSample::new(1, 9), at(60));

        assert_eq!(stats.peak_active, 9);
        assert_eq!(stats.peak_idle, 9);
        assert_eq!(stats.last_high_usage, Some(at(0)));
        assert_eq!(stats.last_low_usage, Some(at(60)));
    }

    #[test]
    fn test_record_error_zeroes_counts() {
        let mut stats = PoolStats::new(10);
        stats.record_sample(PoolSample::new(3, 2), at(0));
        stats.record_error("pool closed", at(1));

        assert_eq!(stats.total, 0);
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.last_error.as_ref().unwrap().message, "pool closed");
        assert_eq!(stats.peak_total, 5);
    }

    #[test]
    fn test_trend_needs_five_points() {
        let mut history = LoadHistory::new(10);
        for i in 0..4 {
            history.push(record(i * 60, 50));
        }
        let report = history.trend(Duration::from_secs(300), at(240));
        assert_eq!(report.trend, LoadTrend::InsufficientData);
        assert_eq!(report.data_points, 4);
    }

    #[test]
    fn test_trend_directions() {
        let mut rising = LoadHistory::new(10);
        for (i, usage) in [20, 20, 60, 70, 80].into_iter().enumerate() {
            rising.push(record(i as i64 * 60, usage));
        }
        assert_eq!(rising.trend(Duration::from_secs(300), at(240)).trend, LoadTrend::Increasing);

        let mut falling = LoadHistory::new(10);
        for (i, usage) in [80, 80, 30, 20, 20].into_iter().enumerate() {
            falling.push(record(i as i64 * 60, usage));
        }
        assert_eq!(falling.trend(Duration::from_secs(300), at(240)).trend, LoadTrend::Decreasing);

        let mut flat = LoadHistory::new(10);
        for i in 0..6 {
            flat.push(record(i * 60, 40));
        }
        let report = flat.trend(Duration::from_secs(600), at(300));
        assert_eq!(report.trend, LoadTrend::Stable);
        assert_eq!(report.average_usage, Some(40.0));
    }

    #[test]
    fn test_trend_ignores_records_outside_window() {
        let mut history = LoadHistory::new(20);
        for i in 0..10 {
            history.push(record(i * 60, 50));
        }
        let report = history.trend(Duration::from_secs(120), at(540));
        assert_eq!(report.data_points, 3);
        assert_eq!(report.trend, LoadTrend::InsufficientData);
    }
}
