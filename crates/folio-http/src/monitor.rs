//! Service self-monitor
//!
//! Periodically requests the server's own health endpoint over HTTP and
//! keeps a small window of response times and per-minute failure counts.
//! Repeated failures raise an alert through the shared [`AlertLog`]. The
//! same client drives the development stress test endpoint.

use crate::config::ServiceMonitorConfig;
use chrono::{DateTime, Utc};
use folio_core::AlertLog;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const ALERT_SOURCE: &str = "service_monitor";
const RESPONSE_WINDOW: usize = 10;
const ERROR_RATE_MINUTES: i64 = 5;
/// Stress tests failing more often than this raise an alert
const STRESS_FAILURE_ALERT_RATE: f64 = 0.10;

/// Result of one health request
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCheck {
    pub healthy: bool,
    pub response_time_ms: u64,
    pub status_code: Option<u16>,
    pub error: Option<String>,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub last_check_time: Option<DateTime<Utc>>,
    pub is_healthy: bool,
    pub consecutive_failures: u32,
    pub avg_response_time: f64,
    pub response_times: Vec<u64>,
    /// Failed share of checks in the last five minutes, as a percentage
    pub error_rate: f64,
    pub recent_errors: u64,
    pub recent_total_checks: u64,
    pub running: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StressTestReport {
    pub endpoint: String,
    pub total_requests: u32,
    pub concurrency: u32,
    pub successful_requests: u32,
    pub failed_requests: u32,
    pub response_times: Vec<u64>,
    pub errors: Vec<String>,
    pub total_time_ms: u64,
    pub avg_response_time: f64,
    /// Percentage of successful requests
    pub success_rate: f64,
}

#[derive(Debug, Clone)]
enum ProbeOutcome {
    Response { status: u16, elapsed_ms: u64 },
    Failed { elapsed_ms: u64, error: String },
}

impl ProbeOutcome {
    fn elapsed_ms(&self) -> u64 {
        match self {
            ProbeOutcome::Response { elapsed_ms, .. } | ProbeOutcome::Failed { elapsed_ms, .. } => *elapsed_ms,
        }
    }

    /// 2xx and 3xx count as success
    fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Response { status, .. } if (200..400).contains(status))
    }

    fn describe_failure(&self) -> String {
        match self {
            ProbeOutcome::Response { status, .. } => format!("Unexpected status code {}", status),
            ProbeOutcome::Failed { error, .. } => error.clone(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct MinuteBucket {
    total: u64,
    errors: u64,
}

#[derive(Debug)]
struct ServiceState {
    last_check: Option<DateTime<Utc>>,
    healthy: bool,
    consecutive_failures: u32,
    response_times: VecDeque<u64>,
    minutes: BTreeMap<i64, MinuteBucket>,
    last_alert: Option<DateTime<Utc>>,
}

struct Lifecycle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

pub struct ServiceMonitor {
    client: reqwest::Client,
    base_url: String,
    config: ServiceMonitorConfig,
    alerts: AlertLog,
    state: Mutex<ServiceState>,
    lifecycle: Mutex<Option<Lifecycle>>,
}

impl ServiceMonitor {
    /// `base_url` is the server's own address, e.g. `http://127.0.0.1:3000`
    pub fn new(
        config: ServiceMonitorConfig,
        base_url: impl Into<String>,
        alerts: AlertLog,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            config,
            alerts,
            state: Mutex::new(ServiceState {
                last_check: None,
                healthy: true,
                consecutive_failures: 0,
                response_times: VecDeque::with_capacity(RESPONSE_WINDOW),
                minutes: BTreeMap::new(),
                last_alert: None,
            }),
            lifecycle: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ServiceMonitorConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start periodic checks; the first one runs immediately.
    ///
    /// Returns `false` when already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.as_ref().is_some_and(|l| !l.token.is_cancelled()) {
            return false;
        }

        let token = CancellationToken::new();
        let loop_token = token.clone();
        let monitor = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = ticker.tick() => {
                        monitor.check().await;
                    }
                }
            }
        });

        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            target = %self.base_url,
            "Service monitor started"
        );
        *lifecycle = Some(Lifecycle { token, task });
        true
    }

    pub async fn stop(&self) {
        let lifecycle = self.lifecycle.lock().take();
        if let Some(lifecycle) = lifecycle {
            lifecycle.token.cancel();
            if let Err(e) = lifecycle.task.await {
                warn!("Service monitor task ended abnormally: {}", e);
            }
            info!("Service monitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle
            .lock()
            .as_ref()
            .is_some_and(|l| !l.token.is_cancelled())
    }

    /// Request the health endpoint once and record the outcome
    pub async fn check(&self) -> ServiceCheck {
        let url = format!("{}{}", self.base_url, self.config.health_path);
        let outcome = self.timed_get(&url).await;
        self.record(outcome, Utc::now())
    }

    async fn timed_get(&self, url: &str) -> ProbeOutcome {
        let started = Instant::now();
        match self.client.get(url).send().await {
            Ok(response) => ProbeOutcome::Response {
                status: response.status().as_u16(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            },
            Err(e) => ProbeOutcome::Failed {
                elapsed_ms: started.elapsed().as_millis() as u64,
                error: if e.is_timeout() {
                    format!("Request timed out after {}ms", self.config.timeout.as_millis())
                } else {
                    e.to_string()
                },
            },
        }
    }

    fn record(&self, outcome: ProbeOutcome, now: DateTime<Utc>) -> ServiceCheck {
        let elapsed_ms = outcome.elapsed_ms();
        let success = outcome.is_success();
        let status_code = match &outcome {
            ProbeOutcome::Response { status, .. } => Some(*status),
            ProbeOutcome::Failed { .. } => None,
        };

        let mut raise_alert = None;
        let check = {
            let mut state = self.state.lock();
            state.last_check = Some(now);

            if state.response_times.len() == RESPONSE_WINDOW {
                state.response_times.pop_front();
            }
            state.response_times.push_back(elapsed_ms);

            let minute = now.timestamp().div_euclid(60);
            let bucket = state.minutes.entry(minute).or_default();
            bucket.total += 1;
            if !success {
                bucket.errors += 1;
            }
            state.minutes.retain(|m, _| *m > minute - 60);

            if success {
                state.healthy = true;
                state.consecutive_failures = 0;
                None
            } else {
                state.healthy = false;
                state.consecutive_failures += 1;

                let cooled_down = state
                    .last_alert
                    .map(|last| (now - last).to_std().unwrap_or_default() >= self.config.alert_cooldown)
                    .unwrap_or(true);
                if state.consecutive_failures >= self.config.alert_threshold && cooled_down {
                    state.last_alert = Some(now);
                    raise_alert = Some(state.consecutive_failures);
                }
                Some(state.consecutive_failures)
            }
        };

        if success {
            if elapsed_ms > self.config.slow_response.as_millis() as u64 {
                warn!(
                    response_time_ms = elapsed_ms,
                    threshold_ms = self.config.slow_response.as_millis() as u64,
                    "Service health check responded slowly"
                );
            } else {
                debug!(response_time_ms = elapsed_ms, "Service health check passed");
            }
            return ServiceCheck {
                healthy: true,
                response_time_ms: elapsed_ms,
                status_code,
                error: None,
                consecutive_failures: 0,
            };
        }

        let failures = check.unwrap_or_default();
        let error = outcome.describe_failure();
        warn!(consecutive_failures = failures, "Service health check failed: {}", error);
        if let Some(failures) = raise_alert {
            self.alerts.alert(
                ALERT_SOURCE,
                format!(
                    "Service availability check failed {} times in a row: {}",
                    failures, error
                ),
            );
        }

        ServiceCheck {
            healthy: false,
            response_time_ms: elapsed_ms,
            status_code,
            error: Some(error),
            consecutive_failures: failures,
        }
    }

    pub fn status(&self) -> ServiceStatus {
        self.status_at(Utc::now())
    }

    fn status_at(&self, now: DateTime<Utc>) -> ServiceStatus {
        let state = self.state.lock();
        let response_times: Vec<u64> = state.response_times.iter().copied().collect();
        let avg_response_time = if response_times.is_empty() {
            0.0
        } else {
            response_times.iter().sum::<u64>() as f64 / response_times.len() as f64
        };

        let minute = now.timestamp().div_euclid(60);
        let (recent_errors, recent_total_checks) = state
            .minutes
            .range(minute - ERROR_RATE_MINUTES + 1..=minute)
            .fold((0, 0), |(errors, total), (_, bucket)| {
                (errors + bucket.errors, total + bucket.total)
            });
        let error_rate = if recent_total_checks == 0 {
            0.0
        } else {
            round2(recent_errors as f64 / recent_total_checks as f64 * 100.0)
        };

        ServiceStatus {
            last_check_time: state.last_check,
            is_healthy: state.healthy,
            consecutive_failures: state.consecutive_failures,
            avg_response_time: round2(avg_response_time),
            response_times,
            error_rate,
            recent_errors,
            recent_total_checks,
            running: self.is_running(),
        }
    }

    /// Send `requests` GETs to `endpoint` in batches of `concurrency`
    pub async fn stress_test(&self, endpoint: &str, requests: u32, concurrency: u32) -> StressTestReport {
        let url = format!("{}{}", self.base_url, endpoint);
        let concurrency = concurrency.max(1);
        info!(endpoint, requests, concurrency, "Starting stress test");

        let started = Instant::now();
        let mut response_times = Vec::with_capacity(requests as usize);
        let mut errors = Vec::new();
        let mut successful_requests = 0u32;

        let mut remaining = requests;
        while remaining > 0 {
            let batch = remaining.min(concurrency);
            let outcomes = futures::future::join_all((0..batch).map(|_| self.timed_get(&url))).await;
            for outcome in outcomes {
                response_times.push(outcome.elapsed_ms());
                if outcome.is_success() {
                    successful_requests += 1;
                } else {
                    errors.push(outcome.describe_failure());
                }
            }
            remaining -= batch;
        }

        let failed_requests = requests - successful_requests;
        let avg_response_time = if response_times.is_empty() {
            0.0
        } else {
            response_times.iter().sum::<u64>() as f64 / response_times.len() as f64
        };
        let success_rate = if requests == 0 {
            0.0
        } else {
            successful_requests as f64 / requests as f64 * 100.0
        };

        let report = StressTestReport {
            endpoint: endpoint.to_string(),
            total_requests: requests,
            concurrency,
            successful_requests,
            failed_requests,
            response_times,
            errors,
            total_time_ms: started.elapsed().as_millis() as u64,
            avg_response_time: round2(avg_response_time),
            success_rate: round2(success_rate),
        };

        info!(
            successful = report.successful_requests,
            failed = report.failed_requests,
            total_time_ms = report.total_time_ms,
            "Stress test finished"
        );
        if requests > 0 && failed_requests as f64 / requests as f64 > STRESS_FAILURE_ALERT_RATE {
            self.alerts.alert(
                ALERT_SOURCE,
                format!(
                    "Stress test against {} failed {} of {} requests",
                    endpoint, failed_requests, requests
                ),
            );
        }

        report
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use chrono::TimeZone;
    use std::time::Duration;

    fn monitor(base_url: &str, alerts: AlertLog) -> ServiceMonitor {
        let config = ServiceMonitorConfig {
            timeout: Duration::from_secs(2),
            ..Default::default()
        };
        ServiceMonitor::new(config, base_url, alerts).unwrap()
    }

    fn failure() -> ProbeOutcome {
        ProbeOutcome::Failed {
            elapsed_ms: 5,
            error: "connection refused".into(),
        }
    }

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + minute * 60, 0).unwrap()
    }

    async fn spawn_target() -> String {
        let app = Router::new()
            .route("/health", get(|| async { "ok" }))
            .route("/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_alert_after_threshold_once_per_cooldown() {
        let alerts = AlertLog::in_memory();
        let monitor = monitor("http://127.0.0.1:9", alerts.clone());

        monitor.record(failure(), at(0));
        monitor.record(failure(), at(0));
        assert!(alerts.is_empty());

        let third = monitor.record(failure(), at(1));
        assert_eq!(third.consecutive_failures, 3);
        assert_eq!(alerts.len(), 1);

        monitor.record(failure(), at(2));
        assert_eq!(alerts.len(), 1, "cooldown suppresses repeated alerts");

        monitor.record(failure(), at(7));
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts.recent(1)[0].source, "service_monitor");
    }

    #[test]
    fn test_success_resets_failures() {
        let monitor = monitor("http://127.0.0.1:9", AlertLog::in_memory());
        monitor.record(failure(), at(0));
        let check = monitor.record(
            ProbeOutcome::Response {
                status: 200,
                elapsed_ms: 12,
            },
            at(0),
        );

        assert!(check.healthy);
        let status = monitor.status_at(at(0));
        assert!(status.is_healthy);
        assert_eq!(status.consecutive_failures, 0);
        assert_eq!(status.response_times, vec![5, 12]);
        assert_eq!(status.avg_response_time, 8.5);
    }

    #[test]
    fn test_error_rate_covers_last_five_minutes() {
        let monitor = monitor("http://127.0.0.1:9", AlertLog::in_memory());
        let ok = || ProbeOutcome::Response {
            status: 204,
            elapsed_ms: 1,
        };

        monitor.record(failure(), at(0));
        monitor.record(ok(), at(6));
        monitor.record(failure(), at(7));
        monitor.record(ok(), at(8));
        monitor.record(ok(), at(9));

        let status = monitor.status_at(at(9));
        assert_eq!(status.recent_total_checks, 4);
        assert_eq!(status.recent_errors, 1);
        assert_eq!(status.error_rate, 25.0);
    }

    #[test]
    fn test_response_window_is_bounded() {
        let monitor = monitor("http://127.0.0.1:9", AlertLog::in_memory());
        for i in 0..15 {
            monitor.record(
                ProbeOutcome::Response {
                    status: 200,
                    elapsed_ms: i,
                },
                at(0),
            );
        }
        let status = monitor.status_at(at(0));
        assert_eq!(status.response_times.len(), RESPONSE_WINDOW);
        assert_eq!(status.response_times[0], 5);
    }

    #[tokio::test]
    async fn test_check_against_live_server() {
        let base = spawn_target().await;
        let monitor = monitor(&base, AlertLog::in_memory());

        let check = monitor.check().await;
        assert!(check.healthy);
        assert_eq!(check.status_code, Some(200));
    }

    #[tokio::test]
    async fn test_stress_test_counts_failures_and_alerts() {
        let base = spawn_target().await;
        let alerts = AlertLog::in_memory();
        let monitor = monitor(&base, alerts.clone());

        let report = monitor.stress_test("/health", 7, 3).await;
        assert_eq!(report.total_requests, 7);
        assert_eq!(report.successful_requests, 7);
        assert_eq!(report.response_times.len(), 7);
        assert_eq!(report.success_rate, 100.0);
        assert!(alerts.is_empty());

        let report = monitor.stress_test("/broken", 4, 2).await;
        assert_eq!(report.failed_requests, 4);
        assert_eq!(report.errors.len(), 4);
        assert_eq!(alerts.len(), 1);
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let base = spawn_target().await;
        let monitor = Arc::new(monitor(&base, AlertLog::in_memory()));

        assert!(monitor.start());
        assert!(!monitor.start());
        assert!(monitor.is_running());

        monitor.stop().await;
        assert!(!monitor.is_running());
    }
}
