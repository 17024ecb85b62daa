//! Pool monitor
//!
//! Owns the pool statistics, load history, smart scaler and health checker.
//! A monitor is created once per process, started with [`PoolMonitor::start`]
//! and stopped on shutdown. Every tick samples the pool; scaling, idle cleanup
//! and health checks run on every Nth tick as configured.

use super::health::{ConnectionHealthStatus, HealthCheckConfig, HealthChecker};
use super::pool::{HealthProbe, PoolError, PoolHandle, PoolSample};
use super::scaler::{PoolScaler, ScaleDecision, ScalerConfig};
use super::stats::{LoadHistory, LoadHistoryRecord, PoolStats, TrendReport, DEFAULT_HISTORY_CAPACITY};
use chrono::{DateTime, Utc};
use folio_core::alerts::{append_line, AlertLog};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

const ALERT_SOURCE: &str = "pool_monitor";

#[derive(Debug, Clone)]
pub struct PoolMonitorConfig {
    /// Sampling interval
    pub interval: Duration,
    pub health: HealthCheckConfig,
    /// Run the scaler on every Nth tick (0 disables)
    pub scale_every_ticks: u64,
    /// Run idle cleanup on every Nth tick (0 disables)
    pub cleanup_every_ticks: u64,
    /// Run a health check from the sampling loop on every Nth tick (0 disables)
    pub health_every_ticks: u64,
    /// Usage percentage at or above which an alert is raised
    pub alert_threshold: u32,
    pub history_capacity: usize,
    pub trend_window: Duration,
    pub scaler: ScalerConfig,
    /// Pool adjustment log; `None` keeps events in the tracing output only
    pub event_log_path: Option<PathBuf>,
}

impl Default for PoolMonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            health: HealthCheckConfig::default(),
            scale_every_ticks: 1,
            cleanup_every_ticks: 2,
            health_every_ticks: 10,
            alert_threshold: 80,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            trend_window: Duration::from_secs(300),
            scaler: ScalerConfig::default(),
            event_log_path: Some(PathBuf::from("logs/pool_manager.log")),
        }
    }
}

impl PoolMonitorConfig {
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.interval.is_zero() || self.health.interval.is_zero() {
            return Err(PoolError::ConfigurationError {
                message: "monitor intervals must be greater than zero".to_string(),
            });
        }
        if self.alert_threshold > 100 {
            return Err(PoolError::ConfigurationError {
                message: format!("alert threshold {} exceeds 100", self.alert_threshold),
            });
        }
        self.scaler.validate()
    }
}

/// What a single tick did
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub tick: u64,
    /// `None` when the pool could not be read this round
    pub sample: Option<PoolSample>,
    pub usage_rate: u32,
    pub decision: ScaleDecision,
    /// Whether the new maximum reached the physical pool
    pub applied: bool,
    pub released_idle: u32,
    pub health_checked: bool,
}

impl TickReport {
    pub fn sampling_failed(&self) -> bool {
        self.sample.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorConfigSummary {
    pub min_connections: u32,
    pub current_max: u32,
    pub max_scalable: u32,
    pub physical_max: u32,
    pub interval_ms: u64,
    pub health_interval_ms: u64,
    pub scale_up_threshold: u32,
    pub scale_down_threshold: u32,
    pub alert_threshold: u32,
}

/// Snapshot served by the database health endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatus {
    pub pool_stats: PoolStats,
    pub connection_status: ConnectionHealthStatus,
    pub load_trend: TrendReport,
    pub config: MonitorConfigSummary,
    pub history_records: usize,
    pub last_check: Option<DateTime<Utc>>,
    pub running: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustOutcome {
    pub previous: u32,
    pub current: u32,
    pub applied: bool,
}

struct MonitorState {
    stats: PoolStats,
    history: LoadHistory,
    scaler: PoolScaler,
    tick: u64,
    last_check: Option<DateTime<Utc>>,
}

struct Lifecycle {
    token: CancellationToken,
    supervisor: JoinHandle<()>,
}

pub struct PoolMonitor {
    pool: Arc<dyn PoolHandle>,
    health: HealthChecker,
    alerts: AlertLog,
    config: PoolMonitorConfig,
    state: Mutex<MonitorState>,
    tick_guard: tokio::sync::Mutex<()>,
    lifecycle: Mutex<Option<Lifecycle>>,
}

impl PoolMonitor {
    pub fn new(
        pool: Arc<dyn PoolHandle>,
        probe: Arc<dyn HealthProbe>,
        alerts: AlertLog,
        config: PoolMonitorConfig,
    ) -> Self {
        Self::new_at(pool, probe, alerts, config, Utc::now())
    }

    /// Build a monitor whose scaling cooldowns start counting at `started_at`
    pub fn new_at(
        pool: Arc<dyn PoolHandle>,
        probe: Arc<dyn HealthProbe>,
        alerts: AlertLog,
        config: PoolMonitorConfig,
        started_at: DateTime<Utc>,
    ) -> Self {
        let scaler = PoolScaler::new(config.scaler.clone(), started_at);
        let state = MonitorState {
            stats: PoolStats::new(scaler.current_max()),
            history: LoadHistory::new(config.history_capacity),
            scaler,
            tick: 0,
            last_check: None,
        };

        Self {
            pool,
            health: HealthChecker::new(probe, config.health.clone(), alerts.clone()),
            alerts,
            config,
            state: Mutex::new(state),
            tick_guard: tokio::sync::Mutex::new(()),
            lifecycle: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &PoolMonitorConfig {
        &self.config
    }

    /// Spawn the sampling and health loops.
    ///
    /// A panic in either loop raises an alert, stops the monitor and cancels
    /// `fatal` so the owner can shut the process down. Returns `false` when
    /// the monitor is already running.
    pub fn start(self: &Arc<Self>, fatal: CancellationToken) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.as_ref().is_some_and(|l| !l.token.is_cancelled()) {
            return false;
        }

        let token = CancellationToken::new();
        let monitor = Arc::clone(self);
        let loop_token = token.clone();

        let supervisor = tokio::spawn(async move {
            let mut tasks = JoinSet::new();
            tasks.spawn(Arc::clone(&monitor).run_sampling(loop_token.clone()));
            tasks.spawn(Arc::clone(&monitor).run_health_checks(loop_token.clone()));

            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    if e.is_panic() {
                        monitor
                            .alerts
                            .alert(ALERT_SOURCE, format!("Monitor task panicked, shutting down: {}", e));
                        loop_token.cancel();
                        fatal.cancel();
                    }
                }
            }
            tracing::debug!("Pool monitor tasks finished");
        });

        tracing::info!(
            interval_ms = self.config.interval.as_millis() as u64,
            health_interval_ms = self.config.health.interval.as_millis() as u64,
            "Pool monitor started"
        );
        *lifecycle = Some(Lifecycle { token, supervisor });
        true
    }

    /// Cancel both loops and wait for them to finish
    pub async fn stop(&self) {
        let lifecycle = self.lifecycle.lock().take();
        if let Some(lifecycle) = lifecycle {
            lifecycle.token.cancel();
            if let Err(e) = lifecycle.supervisor.await {
                tracing::warn!("Pool monitor supervisor ended abnormally: {}", e);
            }
            tracing::info!("Pool monitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle
            .lock()
            .as_ref()
            .is_some_and(|l| !l.token.is_cancelled())
    }

    async fn run_sampling(self: Arc<Self>, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    async fn run_health_checks(self: Arc<Self>, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.health.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    self.health.check().await;
                }
            }
        }
    }

    pub async fn tick(&self) -> Option<TickReport> {
        self.tick_at(Utc::now()).await
    }

    /// Run one monitoring round as of `now`. Returns `None` when the
    /// previous round is still in progress.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Option<TickReport> {
        let Ok(_guard) = self.tick_guard.try_lock() else {
            tracing::debug!("Pool monitor tick skipped, previous tick still running");
            return None;
        };

        let tick = {
            let mut state = self.state.lock();
            state.tick += 1;
            state.last_check = Some(now);
            state.tick
        };

        let mut report = TickReport {
            tick,
            sample: None,
            usage_rate: 0,
            decision: ScaleDecision::NoChange,
            applied: false,
            released_idle: 0,
            health_checked: false,
        };

        match self.pool.sample() {
            Ok(sample) => {
                report.sample = Some(sample);
                self.process_sample(sample, now, &mut report).await;
            }
            Err(e) => {
                tracing::error!("Failed to sample connection pool: {}", e);
                let mut state = self.state.lock();
                state.stats.record_error(e.to_string(), now);
                state.history.push(LoadHistoryRecord::zeroed(now));
            }
        }

        if every(self.config.health_every_ticks, tick) {
            self.health.check().await;
            report.health_checked = true;
        }

        Some(report)
    }

    async fn process_sample(&self, sample: PoolSample, now: DateTime<Utc>, report: &mut TickReport) {
        let (usage, current_max, decision) = {
            let mut state = self.state.lock();
            let usage = state.stats.record_sample(sample, now);
            state.history.push(LoadHistoryRecord::from_sample(sample, now));

            let decision = if every(self.config.scale_every_ticks, report.tick) {
                state.scaler.evaluate(usage, sample.active, now)
            } else {
                ScaleDecision::NoChange
            };

            match decision {
                ScaleDecision::ScaledUp { to, .. } => {
                    state.stats.current_max = to;
                    state.stats.last_scale_up = Some(now);
                }
                ScaleDecision::ScaledDown { to, .. } => {
                    state.stats.current_max = to;
                    state.stats.last_scale_down = Some(now);
                }
                ScaleDecision::NoChange => {}
            }

            (usage, state.scaler.current_max(), decision)
        };

        report.usage_rate = usage;
        report.decision = decision;

        tracing::debug!(
            active = sample.active,
            idle = sample.idle,
            total = sample.total,
            usage_rate = usage,
            "Pool sampled"
        );

        if usage >= self.config.alert_threshold {
            self.alerts.alert(
                ALERT_SOURCE,
                format!(
                    "Connection pool usage at {}% ({} active / {} total)",
                    usage, sample.active, sample.total
                ),
            );
        }

        if sample.active as f64 >= current_max as f64 * 0.9 {
            tracing::warn!(
                active = sample.active,
                current_max,
                "Active connections are close to the pool maximum"
            );
        }

        if let Some(to) = decision.new_max() {
            report.applied = self.pool.set_max_connections(to);
            tracing::info!(
                decision = decision.as_str(),
                usage_rate = usage,
                applied = report.applied,
                "Pool maximum changed to {}",
                to
            );
            self.log_event(&format!(
                "{} {:?} usage={}% applied={}",
                decision.as_str(),
                decision,
                usage,
                report.applied
            ));
        }

        if every(self.config.cleanup_every_ticks, report.tick) {
            let threshold = 2u32.max((sample.total as f64 * 0.7).floor() as u32);
            if sample.idle > threshold {
                report.released_idle = self.release_idle_above_floor(sample.idle).await;
            }
        }
    }

    fn idle_floor(&self) -> u32 {
        self.config.scaler.min_connections.max(1)
    }

    async fn release_idle_above_floor(&self, idle: u32) -> u32 {
        let excess = idle.saturating_sub(self.idle_floor());
        if excess == 0 {
            return 0;
        }

        let released = self.pool.release_idle(excess).await;
        if released > 0 {
            tracing::info!(released, "Released idle connections");
            self.log_event(&format!("cleanup released={} idle_before={}", released, idle));
        }
        released
    }

    fn log_event(&self, event: &str) {
        let Some(path) = &self.config.event_log_path else {
            return;
        };
        let line = format!("[{}] {}", Utc::now().to_rfc3339(), event);
        if let Err(e) = append_line(path, &line) {
            tracing::warn!(path = %path.display(), "Failed to write pool event log: {}", e);
        }
    }

    pub fn stats(&self) -> PoolStats {
        self.state.lock().stats.clone()
    }

    pub fn history(&self) -> Vec<LoadHistoryRecord> {
        self.state.lock().history.iter().copied().collect()
    }

    pub fn health_status(&self) -> ConnectionHealthStatus {
        self.health.status()
    }

    pub async fn check_health(&self) -> ConnectionHealthStatus {
        self.health.check().await
    }

    pub fn status(&self) -> PoolStatus {
        let now = Utc::now();
        let state = self.state.lock();
        let scaler = state.scaler.config();

        PoolStatus {
            pool_stats: state.stats.clone(),
            connection_status: self.health.status(),
            load_trend: state.history.trend(self.config.trend_window, now),
            config: MonitorConfigSummary {
                min_connections: scaler.min_connections,
                current_max: state.scaler.current_max(),
                max_scalable: scaler.max_scalable,
                physical_max: self.pool.max_connections(),
                interval_ms: self.config.interval.as_millis() as u64,
                health_interval_ms: self.config.health.interval.as_millis() as u64,
                scale_up_threshold: scaler.scale_up_threshold,
                scale_down_threshold: scaler.scale_down_threshold,
                alert_threshold: self.config.alert_threshold,
            },
            history_records: state.history.len(),
            last_check: state.last_check,
            running: self.is_running(),
        }
    }

    /// Release every idle connection above the floor, ignoring the cleanup threshold
    pub async fn force_cleanup(&self) -> Result<u32, PoolError> {
        let sample = self.pool.sample()?;
        Ok(self.release_idle_above_floor(sample.idle).await)
    }

    /// Manually set the advisory maximum
    pub fn adjust_max(&self, max: u32) -> Result<AdjustOutcome, PoolError> {
        let previous = {
            let mut state = self.state.lock();
            let previous = state.scaler.set_current_max(max)?;
            state.stats.current_max = max;
            previous
        };

        let applied = self.pool.set_max_connections(max);
        tracing::info!(previous, current = max, applied, "Pool maximum adjusted manually");
        self.log_event(&format!("manual {} -> {} applied={}", previous, max, applied));

        Ok(AdjustOutcome {
            previous,
            current: max,
            applied,
        })
    }
}

/// Ticks are numbered from 1
fn every(n: u64, tick: u64) -> bool {
    n > 0 && tick % n == 0
}
