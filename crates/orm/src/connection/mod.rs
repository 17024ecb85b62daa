//! Connection Management
//!
//! Pool sampling, load history, smart scaling and health checking.

pub mod health;
pub mod monitor;
pub mod pool;
pub mod scaler;
pub mod stats;

pub use health::{ConnectionHealthStatus, HealthCheckConfig, HealthChecker};
pub use monitor::{AdjustOutcome, MonitorConfigSummary, PoolMonitor, PoolMonitorConfig, PoolStatus, TickReport};
pub use pool::{HealthProbe, PoolError, PoolHandle, PoolSample, SqlxPoolHandle};
pub use scaler::{PoolScaler, ScaleDecision, ScalerConfig};
pub use stats::{LoadHistory, LoadHistoryRecord, LoadTrend, PoolStats, TrendReport};
