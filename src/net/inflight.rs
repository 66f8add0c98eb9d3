//! In-flight request tracking.
//!
//! # Responsibilities
//! - Count request tasks that are still running
//! - Generate unique request task IDs for tracing
//! - Let shutdown wait until every tracked request has finished

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Global atomic counter for task IDs.
/// Relaxed ordering is enough; we only need uniqueness.
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a tracked request task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    pub fn new() -> Self {
        Self(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Tracks in-flight requests for graceful shutdown.
///
/// The count lives in a watch channel so waiters wake on every change.
#[derive(Debug, Clone)]
pub struct InflightTracker {
    active: Arc<watch::Sender<u64>>,
}

impl InflightTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            active: Arc::new(tx),
        }
    }

    /// Record a new in-flight request. The returned guard releases it on drop.
    pub fn track(&self) -> InflightGuard {
        self.active.send_modify(|n| *n += 1);
        InflightGuard {
            active: Arc::clone(&self.active),
            id: TaskId::new(),
        }
    }

    /// Current in-flight request count.
    pub fn active_count(&self) -> u64 {
        *self.active.borrow()
    }

    /// Resolves once no request is in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.active.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Default for InflightTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks one request task's lifetime.
#[derive(Debug)]
pub struct InflightGuard {
    active: Arc<watch::Sender<u64>>,
    id: TaskId,
}

impl InflightGuard {
    pub fn id(&self) -> TaskId {
        self.id
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.active.send_modify(|n| *n = n.saturating_sub(1));
        tracing::trace!(task_id = %self.id, "Request task finished");
    }
}
