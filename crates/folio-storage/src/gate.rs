//! Concurrency gate for upload requests

use crate::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

/// Running upload statistics
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadStats {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub last_upload_time: Option<DateTime<Utc>>,
    pub active: usize,
    pub max_concurrent: usize,
}

#[derive(Debug)]
struct GateInner {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    counters: Mutex<UploadStats>,
}

/// Admits at most `max_concurrent` uploads at once and rejects the rest
/// immediately.
#[derive(Debug, Clone)]
pub struct UploadGate {
    inner: Arc<GateInner>,
}

impl UploadGate {
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            inner: Arc::new(GateInner {
                semaphore: Arc::new(Semaphore::new(max_concurrent)),
                max_concurrent,
                counters: Mutex::new(UploadStats::default()),
            }),
        }
    }

    /// Take a slot or fail with [`StorageError::TooManyUploads`]
    pub fn try_acquire(&self) -> StorageResult<UploadPermit> {
        let permit = match self.inner.semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    max_concurrent = self.inner.max_concurrent,
                    "Upload rejected, concurrency limit reached"
                );
                return Err(StorageError::TooManyUploads);
            }
        };

        {
            let mut counters = self.inner.counters.lock();
            counters.total += 1;
            counters.last_upload_time = Some(Utc::now());
        }
        debug!(active = self.active(), "Upload slot acquired");

        Ok(UploadPermit {
            gate: self.inner.clone(),
            _permit: permit,
            settled: false,
        })
    }

    pub fn active(&self) -> usize {
        self.inner.max_concurrent - self.inner.semaphore.available_permits()
    }

    pub fn stats(&self) -> UploadStats {
        let mut stats = self.inner.counters.lock().clone();
        stats.active = self.active();
        stats.max_concurrent = self.inner.max_concurrent;
        stats
    }
}

/// A held upload slot. Dropping it without [`UploadPermit::succeed`]
/// counts the upload as failed.
#[derive(Debug)]
pub struct UploadPermit {
    gate: Arc<GateInner>,
    _permit: OwnedSemaphorePermit,
    settled: bool,
}

impl UploadPermit {
    pub fn succeed(mut self) {
        self.settle(true);
    }

    pub fn fail(mut self) {
        self.settle(false);
    }

    fn settle(&mut self, success: bool) {
        if self.settled {
            return;
        }
        self.settled = true;
        let mut counters = self.gate.counters.lock();
        if success {
            counters.success += 1;
        } else {
            counters.failed += 1;
        }
    }
}

impl Drop for UploadPermit {
    fn drop(&mut self) {
        self.settle(false);
    }
}
