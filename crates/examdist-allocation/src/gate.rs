//! Mutual exclusion around the read-decide-persist sequence.
//!
//! Two allocations that could observe each other's records must never
//! overlap. With [`GateScope::Global`] every allocation is serialized;
//! with [`GateScope::PerExam`] only allocations for the same exam are,
//! because snapshots of different exams share no documents.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{trace, warn};

use examdist_core::config::{AllocationConfig, GateScope};
use examdist_core::error::AppError;
use examdist_core::result::AppResult;
use examdist_core::types::id::ExamId;

/// Exclusive-access gate for allocation critical sections.
///
/// The guard is released when the critical section returns, fails or
/// unwinds. In per-exam mode a shard lives only while some caller holds or
/// waits on it, so the map stays bounded by the number of busy exams.
#[derive(Debug)]
pub struct AllocationGate {
    scope: GateScope,
    global: Arc<Mutex<()>>,
    shards: DashMap<ExamId, Arc<Mutex<()>>>,
    acquire_timeout: Option<Duration>,
    waiting: AtomicUsize,
    acquisitions: AtomicU64,
}

impl AllocationGate {
    /// Creates a gate with the given scope and optional acquire timeout.
    pub fn new(scope: GateScope, acquire_timeout: Option<Duration>) -> Self {
        Self {
            scope,
            global: Arc::new(Mutex::new(())),
            shards: DashMap::new(),
            acquire_timeout,
            waiting: AtomicUsize::new(0),
            acquisitions: AtomicU64::new(0),
        }
    }

    /// Creates a gate from the `[allocation]` configuration section.
    pub fn from_config(config: &AllocationConfig) -> Self {
        Self::new(
            config.gate,
            config.acquire_timeout_ms.map(Duration::from_millis),
        )
    }

    /// The configured scope.
    pub fn scope(&self) -> GateScope {
        self.scope
    }

    /// Number of callers currently waiting to enter.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::Relaxed)
    }

    /// Total number of successful entries since creation.
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }

    /// Number of per-exam locks currently held in memory.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn lock_for(&self, exam_id: ExamId) -> Arc<Mutex<()>> {
        match self.scope {
            GateScope::Global => Arc::clone(&self.global),
            GateScope::PerExam => Arc::clone(
                self.shards
                    .entry(exam_id)
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .value(),
            ),
        }
    }

    async fn acquire(&self, exam_id: ExamId) -> AppResult<OwnedMutexGuard<()>> {
        let lock = self.lock_for(exam_id);
        let _waiting = WaitingGuard::enter(&self.waiting);

        match self.acquire_timeout {
            Some(limit) => tokio::time::timeout(limit, lock.lock_owned())
                .await
                .map_err(|_| {
                    warn!(
                        exam_id = %exam_id,
                        timeout_ms = limit.as_millis() as u64,
                        "Allocation gate acquire timed out"
                    );
                    AppError::service_unavailable(format!(
                        "Allocation for exam {exam_id} is busy, try again shortly"
                    ))
                }),
            None => Ok(lock.lock_owned().await),
        }
    }

    fn release_shard(&self, exam_id: ExamId) {
        if self.scope == GateScope::PerExam {
            // The map's own reference is the last one: nobody holds or waits.
            self.shards
                .remove_if(&exam_id, |_, lock| Arc::strong_count(lock) == 1);
        }
    }

    /// Run `f` while holding exclusive access for `exam_id`.
    ///
    /// At most one closure per exclusion domain runs at a time; the result
    /// of `f` is returned unchanged.
    pub async fn with_exclusive_access<F, Fut, T>(&self, exam_id: ExamId, f: F) -> AppResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let guard = match self.acquire(exam_id).await {
            Ok(guard) => guard,
            Err(err) => {
                self.release_shard(exam_id);
                return Err(err);
            }
        };
        let entered = self.acquisitions.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(exam_id = %exam_id, scope = ?self.scope, entered, "Entered allocation gate");

        let result = f().await;

        drop(guard);
        self.release_shard(exam_id);
        trace!(exam_id = %exam_id, ok = result.is_ok(), "Left allocation gate");
        result
    }
}

/// Counts a caller as waiting until it enters or gives up, including when
/// its future is dropped mid-wait.
struct WaitingGuard<'a>(&'a AtomicUsize);

impl<'a> WaitingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

impl Default for AllocationGate {
    fn default() -> Self {
        Self::new(GateScope::Global, None)
    }
}
