//! Database health checking
//!
//! Runs a liveness probe, tracks consecutive failures and performs a single
//! reconnect attempt each time a failure streak crosses the threshold.

use super::pool::HealthProbe;
use chrono::{DateTime, Utc};
use folio_core::AlertLog;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionHealthStatus {
    pub healthy: bool,
    pub last_check: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub response_time_ms: Option<u64>,
    pub last_error: Option<String>,
    pub recovery_time: Option<DateTime<Utc>>,
    pub reconnect_attempts: u64,
}

impl Default for ConnectionHealthStatus {
    fn default() -> Self {
        Self {
            healthy: false,
            last_check: None,
            consecutive_failures: 0,
            response_time_ms: None,
            last_error: None,
            recovery_time: None,
            reconnect_attempts: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    pub interval: Duration,
    /// Failure count that triggers the reconnect attempt
    pub reconnect_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            reconnect_threshold: 3,
        }
    }
}

pub struct HealthChecker {
    probe: Arc<dyn HealthProbe>,
    config: HealthCheckConfig,
    alerts: AlertLog,
    status: Mutex<ConnectionHealthStatus>,
    in_flight: tokio::sync::Mutex<()>,
}

impl HealthChecker {
    pub fn new(probe: Arc<dyn HealthProbe>, config: HealthCheckConfig, alerts: AlertLog) -> Self {
        Self {
            probe,
            config,
            alerts,
            status: Mutex::new(ConnectionHealthStatus::default()),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &HealthCheckConfig {
        &self.config
    }

    pub fn status(&self) -> ConnectionHealthStatus {
        self.status.lock().clone()
    }

    /// Run one check. Concurrent callers queue behind the check in flight.
    pub async fn check(&self) -> ConnectionHealthStatus {
        let _in_flight = self.in_flight.lock().await;
        let now = Utc::now();

        match self.probe.ping().await {
            Ok(elapsed) => self.record_success(elapsed, now),
            Err(e) => {
                let failures = self.record_failure(e.to_string(), now);
                if failures == self.config.reconnect_threshold {
                    self.reconnect().await;
                }
            }
        }

        self.status()
    }

    fn record_success(&self, elapsed: Duration, now: DateTime<Utc>) {
        let recovered = {
            let mut status = self.status.lock();
            let recovered = !status.healthy && status.last_check.is_some();

            status.healthy = true;
            status.consecutive_failures = 0;
            status.last_check = Some(now);
            status.response_time_ms = Some(elapsed.as_millis() as u64);
            status.last_error = None;
            if recovered {
                status.recovery_time = Some(now);
            }
            recovered
        };

        if recovered {
            tracing::info!("Database connection recovered");
        } else {
            tracing::debug!("Database health check passed in {:?}", elapsed);
        }
    }

    fn record_failure(&self, message: String, now: DateTime<Utc>) -> u32 {
        let failures = {
            let mut status = self.status.lock();
            status.healthy = false;
            status.consecutive_failures += 1;
            status.last_check = Some(now);
            status.response_time_ms = None;
            status.last_error = Some(message.clone());
            status.consecutive_failures
        };

        tracing::error!(consecutive_failures = failures, "Database health check failed: {}", message);
        self.alerts.alert(
            "database",
            format!("Health check failed ({} in a row): {}", failures, message),
        );
        failures
    }

    async fn reconnect(&self) {
        tracing::warn!(
            "Attempting database reconnect after {} consecutive failures",
            self.config.reconnect_threshold
        );
        self.status.lock().reconnect_attempts += 1;

        match self.probe.reconnect().await {
            Ok(()) => {
                let now = Utc::now();
                {
                    let mut status = self.status.lock();
                    status.healthy = true;
                    status.consecutive_failures = 0;
                    status.last_error = None;
                    status.recovery_time = Some(now);
                }
                tracing::info!("Database reconnect succeeded");
                self.alerts.alert("database", "Database connection re-established after reconnect");
            }
            Err(e) => {
                tracing::error!("Database reconnect failed: {}", e);
                self.alerts.alert("database", format!("Database reconnect failed: {}", e));
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::connection::pool::PoolError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Probe that replays scripted ping outcomes
    pub(crate) struct ScriptedProbe {
        pings: Mutex<VecDeque<bool>>,
        reconnect_ok: bool,
        pub(crate) reconnects: AtomicU32,
    }

    impl ScriptedProbe {
        pub(crate) fn new(pings: &[bool], reconnect_ok: bool) -> Self {
            Self {
                pings: Mutex::new(pings.iter().copied().collect()),
                reconnect_ok,
                reconnects: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl HealthProbe for ScriptedProbe {
        async fn ping(&self) -> Result<Duration, PoolError> {
            match self.pings.lock().pop_front().unwrap_or(true) {
                true => Ok(Duration::from_millis(3)),
                false => Err(PoolError::HealthCheckFailed {
                    reason: "connection refused".to_string(),
                }),
            }
        }

        async fn reconnect(&self) -> Result<(), PoolError> {
            self.reconnects.fetch_add(1, Ordering::SeqCst);
            if self.reconnect_ok {
                Ok(())
            } else {
                Err(PoolError::ReconnectFailed {
                    reason: "still down".to_string(),
                })
            }
        }
    }

    fn checker(probe: Arc<ScriptedProbe>) -> HealthChecker {
        HealthChecker::new(probe, HealthCheckConfig::default(), AlertLog::in_memory())
    }

    #[tokio::test]
    async fn test_success_after_failure_streak_resets_counter() {
        let probe = Arc::new(ScriptedProbe::new(&[false, false, false, true], false));
        let checker = checker(probe.clone());

        for expected in 1..=3 {
            let status = checker.check().await;
            assert!(!status.healthy);
            assert_eq!(status.consecutive_failures, expected);
        }

        let status = checker.check().await;
        assert!(status.healthy);
        assert_eq!(status.consecutive_failures, 0);
        assert!(status.recovery_time.is_some());
    }

    #[tokio::test]
    async fn test_reconnect_attempted_once_per_streak() {
        let probe = Arc::new(ScriptedProbe::new(&[false; 6], false));
        let checker = checker(probe.clone());

        for _ in 0..6 {
            checker.check().await;
        }

        assert_eq!(probe.reconnects.load(Ordering::SeqCst), 1);
        let status = checker.status();
        assert_eq!(status.consecutive_failures, 6);
        assert_eq!(status.reconnect_attempts, 1);
    }

    #[tokio::test]
    async fn test_successful_reconnect_marks_healthy() {
        let probe = Arc::new(ScriptedProbe::new(&[false, false, false], true));
        let alerts = AlertLog::in_memory();
        let checker = HealthChecker::new(probe.clone(), HealthCheckConfig::default(), alerts.clone());

        checker.check().await;
        checker.check().await;
        let status = checker.check().await;

        assert!(status.healthy);
        assert_eq!(status.consecutive_failures, 0);
        assert!(status.recovery_time.is_some());
        assert_eq!(alerts.recent(1)[0].message, "Database connection re-established after reconnect");
    }

    #[tokio::test]
    async fn test_new_streak_gets_a_new_reconnect() {
        let probe = Arc::new(ScriptedProbe::new(&[false, false, false, true, false, false, false], false));
        let checker = checker(probe.clone());

        for _ in 0..7 {
            checker.check().await;
        }

        assert_eq!(probe.reconnects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_first_success_is_not_a_recovery() {
        let probe = Arc::new(ScriptedProbe::new(&[true], false));
        let checker = checker(probe);

        let status = checker.check().await;
        assert!(status.healthy);
        assert!(status.recovery_time.is_none());
        assert_eq!(status.response_time_ms, Some(3));
    }
}
