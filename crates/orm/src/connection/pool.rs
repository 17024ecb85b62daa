//! Connection pool handle
//!
//! The monitor only sees a pool through [`PoolHandle`]: occupancy counts, an
//! optional resize capability and an idle-release operation.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::postgres::PgPool;
use std::time::{Duration, Instant};

/// Database connection pool error types
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Failed to read pool statistics: {0}")]
    Sampling(String),

    #[error("Pool is closed")]
    PoolClosed,

    #[error("Health check failed: {reason}")]
    HealthCheckFailed { reason: String },

    #[error("Reconnect failed: {reason}")]
    ReconnectFailed { reason: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },
}

/// Point-in-time occupancy of a pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolSample {
    pub active: u32,
    pub idle: u32,
    pub total: u32,
}

impl PoolSample {
    pub fn new(active: u32, idle: u32) -> Self {
        Self {
            active,
            idle,
            total: active + idle,
        }
    }

    /// Active connections as a rounded percentage of total, 0 for an empty pool
    pub fn usage_rate(&self) -> u32 {
        if self.total == 0 {
            0
        } else {
            ((self.active as f64 / self.total as f64) * 100.0).round() as u32
        }
    }
}

#[async_trait]
pub trait PoolHandle: Send + Sync {
    fn sample(&self) -> Result<PoolSample, PoolError>;

    /// Physical maximum the pool enforces
    fn max_connections(&self) -> u32;

    /// Resize the pool. Returns `false` when the pool cannot be resized at runtime.
    fn set_max_connections(&self, _max: u32) -> bool {
        false
    }

    /// Close up to `count` idle connections, returning how many were closed
    async fn release_idle(&self, _count: u32) -> u32 {
        0
    }
}

/// Liveness probe used by the health checker
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Run a trivial round-trip query
    async fn ping(&self) -> Result<Duration, PoolError>;

    /// Drop suspect connections and verify a fresh one can be opened
    async fn reconnect(&self) -> Result<(), PoolError>;
}

/// [`PoolHandle`] over a sqlx PostgreSQL pool.
///
/// sqlx pools have a fixed maximum, so resizing is reported as unsupported
/// and the monitor's maximum stays advisory.
#[derive(Debug, Clone)]
pub struct SqlxPoolHandle {
    pool: PgPool,
}

impl SqlxPoolHandle {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PoolHandle for SqlxPoolHandle {
    fn sample(&self) -> Result<PoolSample, PoolError> {
        if self.pool.is_closed() {
            return Err(PoolError::PoolClosed);
        }

        let total = self.pool.size();
        let idle = self.pool.num_idle() as u32;
        Ok(PoolSample {
            active: total.saturating_sub(idle),
            idle,
            total,
        })
    }

    fn max_connections(&self) -> u32 {
        self.pool.options().get_max_connections()
    }

    async fn release_idle(&self, count: u32) -> u32 {
        let mut released = 0;
        for _ in 0..count {
            // try_acquire only hands out a connection that is idle right now
            let Some(conn) = self.pool.try_acquire() else {
                break;
            };
            match conn.close().await {
                Ok(()) => released += 1,
                Err(e) => {
                    tracing::warn!("Failed to close idle connection: {}", e);
                    break;
                }
            }
        }
        released
    }
}

#[async_trait]
impl HealthProbe for SqlxPoolHandle {
    async fn ping(&self) -> Result<Duration, PoolError> {
        let start = Instant::now();
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| PoolError::HealthCheckFailed {
                reason: e.to_string(),
            })?;
        Ok(start.elapsed())
    }

    async fn reconnect(&self) -> Result<(), PoolError> {
        if self.pool.is_closed() {
            return Err(PoolError::PoolClosed);
        }

        let stale = self.pool.num_idle() as u32;
        let closed = self.release_idle(stale).await;
        tracing::debug!("Closed {} idle connections before reconnecting", closed);

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| PoolError::ReconnectFailed {
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_rate_rounds() {
        assert_eq!(PoolSample::new(2, 1).usage_rate(), 67);
        assert_eq!(PoolSample::new(1, 7).usage_rate(), 13);
        assert_eq!(PoolSample::new(5, 0).usage_rate(), 100);
    }

    #[test]
    fn test_empty_pool_has_zero_usage() {
        assert_eq!(PoolSample::default().usage_rate(), 0);
    }
}
