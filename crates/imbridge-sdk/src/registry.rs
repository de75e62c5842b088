//! 挂起调用注册表
//!
//! 按 `OperationId` 保存每个未完成调用的回调。注册表是核心中唯一的共享可变状态：
//! 发起调用时插入，原生回调到达时取出。
//!
//! 所有用户回调都在锁外执行：先在锁内取出（或克隆）回调，释放锁后再调用。

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::envelope::{ProgressUpdate, ResponseEnvelope};
use crate::error::{BridgeError, Result};
use crate::operation::{CallMode, OperationId};

/// 终结成功回调
pub type ResolveFn = Box<dyn FnOnce(ResponseEnvelope) + Send>;
/// 终结失败回调
pub type RejectFn = Box<dyn FnOnce(BridgeError) + Send>;
/// 进度回调（可多次调用）
pub type ProgressFn = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// 挂起条目
pub struct PendingEntry {
    pub mode: CallMode,
    on_resolve: ResolveFn,
    on_reject: RejectFn,
    on_progress: Option<ProgressFn>,
    registered_at: Instant,
}

impl PendingEntry {
    pub fn age(&self) -> Duration {
        self.registered_at.elapsed()
    }
}

/// 注册表统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub registered: u64,
    pub resolved: u64,
    pub rejected: u64,
    pub progress_delivered: u64,
    /// 找不到条目或模式不匹配而被丢弃的回调
    pub dropped: u64,
    pub pending: usize,
}

#[derive(Default)]
struct Counters {
    registered: AtomicU64,
    resolved: AtomicU64,
    rejected: AtomicU64,
    progress_delivered: AtomicU64,
    dropped: AtomicU64,
}

/// 挂起调用注册表
#[derive(Default)]
pub struct HandlerRegistry {
    entries: Mutex<HashMap<OperationId, PendingEntry>>,
    counters: Counters,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册挂起条目；同一 ID 仍在挂起时返回 `DuplicateOperationId`
    pub fn register(
        &self,
        operation_id: OperationId,
        mode: CallMode,
        on_resolve: ResolveFn,
        on_reject: RejectFn,
        on_progress: Option<ProgressFn>,
    ) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&operation_id) {
            return Err(BridgeError::DuplicateOperationId(operation_id));
        }
        debug!("register operation {} ({})", operation_id, mode);
        entries.insert(
            operation_id,
            PendingEntry {
                mode,
                on_resolve,
                on_reject,
                on_progress,
                registered_at: Instant::now(),
            },
        );
        drop(entries);
        self.counters.registered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// 终结成功；条目不存在时返回 false
    pub fn resolve(&self, operation_id: &OperationId, response: ResponseEnvelope) -> bool {
        let Some(entry) = self.take(operation_id) else {
            return self.drop_unknown("resolve", operation_id);
        };
        debug!("resolve operation {}", operation_id);
        self.counters.resolved.fetch_add(1, Ordering::Relaxed);
        (entry.on_resolve)(response);
        true
    }

    /// 终结失败；条目不存在时返回 false
    pub fn reject(&self, operation_id: &OperationId, error: BridgeError) -> bool {
        let Some(entry) = self.take(operation_id) else {
            debug!("late rejection: {}", error);
            return self.drop_unknown("reject", operation_id);
        };
        debug!("reject operation {}: {}", operation_id, error);
        self.counters.rejected.fetch_add(1, Ordering::Relaxed);
        (entry.on_reject)(error);
        true
    }

    /// 进度通知，不移除条目
    ///
    /// 一次性模式的条目收到进度属于协议违例，直接丢弃。
    pub fn notify_progress(&self, update: ProgressUpdate) -> bool {
        let progress_fn = {
            let entries = self.entries.lock();
            match entries.get(&update.operation_id) {
                Some(entry) if entry.mode == CallMode::Progress => entry.on_progress.clone(),
                Some(_) => None,
                None => {
                    drop(entries);
                    return self.drop_unknown("progress", &update.operation_id);
                }
            }
        };

        match progress_fn {
            Some(f) => {
                debug!("progress {} for operation {}", update.progress, update.operation_id);
                self.counters.progress_delivered.fetch_add(1, Ordering::Relaxed);
                f(update);
                true
            }
            None => {
                warn!(
                    "progress for one-shot operation {}, dropped",
                    update.operation_id
                );
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// 丢弃发往不存在条目的回调（已终结、已超时或从未登记）
    fn drop_unknown(&self, kind: &str, operation_id: &OperationId) -> bool {
        let error = BridgeError::UnknownOperationId(operation_id.clone());
        warn!("{} dropped (code {}): {}", kind, error.err_code(), error);
        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        false
    }

    /// 直接移除条目，不调用任何回调（调用方放弃等待）
    pub fn remove(&self, operation_id: &OperationId) -> bool {
        self.take(operation_id).is_some()
    }

    pub fn contains(&self, operation_id: &OperationId) -> bool {
        self.entries.lock().contains_key(operation_id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 以同一个错误拒绝所有挂起调用，返回拒绝的数量
    pub fn reject_all<F>(&self, make_error: F) -> usize
    where
        F: Fn(&OperationId) -> BridgeError,
    {
        let drained: Vec<(OperationId, PendingEntry)> = self.entries.lock().drain().collect();
        let count = drained.len();
        for (operation_id, entry) in drained {
            let error = make_error(&operation_id);
            debug!("reject operation {}: {}", operation_id, error);
            (entry.on_reject)(error);
        }
        self.counters.rejected.fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    /// 以 `Timeout` 拒绝注册时间超过 `max_age` 的条目，返回数量
    pub fn reap_expired(&self, max_age: Duration) -> usize {
        let expired: Vec<(OperationId, PendingEntry)> = {
            let mut entries = self.entries.lock();
            let ids: Vec<OperationId> = entries
                .iter()
                .filter(|(_, e)| e.age() >= max_age)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| entries.remove(&id).map(|e| (id, e)))
                .collect()
        };

        let count = expired.len();
        for (operation_id, entry) in expired {
            warn!("operation {} expired after {:?}", operation_id, entry.age());
            (entry.on_reject)(BridgeError::Timeout {
                operation_id,
                timeout: max_age,
            });
        }
        self.counters.rejected.fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            registered: self.counters.registered.load(Ordering::Relaxed),
            resolved: self.counters.resolved.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            progress_delivered: self.counters.progress_delivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            pending: self.len(),
        }
    }

    fn take(&self, operation_id: &OperationId) -> Option<PendingEntry> {
        self.entries.lock().remove(operation_id)
    }
}
