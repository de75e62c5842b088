//! 事件路由
//!
//! 把原生唯一的监听通道按事件码拆成具名事件流：
//! - 按事件名注册监听器，`"*"` 接收所有事件
//! - 分发时先快照监听器列表，再在锁外逐个调用
//! - 单个监听器 panic 不影响其它监听器，分发结束后统一记录
//! - 同时广播给 `subscribe()` 的异步订阅者

use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use crate::envelope::BridgeEvent;
use crate::event_code::NativeEvent;

/// 通配事件名
pub const WILDCARD: &str = "*";

/// 事件监听器
pub type Listener = Arc<dyn Fn(&BridgeEvent) + Send + Sync>;

/// 订阅句柄，用于精确移除某一个监听器
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub event: String,
    pub id: u64,
}

/// 单次分发的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub event: String,
    /// 被成功调用的监听器数量
    pub delivered: usize,
    /// panic 的监听器，`(handle id, 信息)`
    pub failures: Vec<(u64, String)>,
}

/// 事件统计信息
#[derive(Debug, Clone, Default)]
pub struct EventStats {
    /// 总事件数
    pub total_events: u64,
    /// 按事件名分组的事件数
    pub events_by_name: HashMap<String, u64>,
    /// 未映射而被丢弃的事件码数量
    pub dropped_unmapped: u64,
    /// 监听器失败次数
    pub listener_failures: u64,
    /// 监听器数量
    pub listener_count: usize,
    /// 最后事件时间（毫秒）
    pub last_event_time: Option<i64>,
}

/// 事件路由器
pub struct EventRouter {
    sender: broadcast::Sender<BridgeEvent>,
    listeners: RwLock<HashMap<String, Vec<(u64, Listener)>>>,
    stats: RwLock<EventStats>,
    next_id: AtomicU64,
}

impl EventRouter {
    /// `capacity` 为广播通道容量
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            listeners: RwLock::new(HashMap::new()),
            stats: RwLock::new(EventStats::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// 添加事件监听器
    pub fn on<F>(&self, event: &str, listener: F) -> SubscriptionHandle
    where
        F: Fn(&BridgeEvent) + Send + Sync + 'static,
    {
        self.on_listener(event, Arc::new(listener))
    }

    /// 添加已包装的监听器；同一个 `Listener` 之后可以用 `off` 移除
    pub fn on_listener(&self, event: &str, listener: Listener) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let count = {
            let mut listeners = self.listeners.write();
            listeners
                .entry(event.to_string())
                .or_default()
                .push((id, listener));
            listeners.values().map(Vec::len).sum::<usize>()
        };
        self.stats.write().listener_count = count;
        info!("Added listener #{} for event: {}", id, event);
        SubscriptionHandle {
            event: event.to_string(),
            id,
        }
    }

    /// 按监听器引用移除，已移除时为空操作
    pub fn off(&self, event: &str, listener: &Listener) -> bool {
        self.remove_where(event, |(_, l)| Arc::ptr_eq(l, listener))
    }

    /// 按句柄移除，已移除时为空操作
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        self.remove_where(&handle.event, |(id, _)| *id == handle.id)
    }

    /// 移除所有监听器
    pub fn clear_listeners(&self) {
        self.listeners.write().clear();
        self.stats.write().listener_count = 0;
        info!("Cleared all event listeners");
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.read().get(event).map_or(0, Vec::len)
    }

    /// 分发原生事件；未映射的事件码静默丢弃并返回 `None`
    pub fn dispatch(&self, event_code: i32, raw_payload: &str) -> Option<DispatchReport> {
        let Some(native) = NativeEvent::from_code(event_code) else {
            trace!("dropping unmapped native event code {}", event_code);
            self.stats.write().dropped_unmapped += 1;
            return None;
        };
        let event = BridgeEvent::decode(native.name(), Some(event_code), raw_payload);
        Some(self.deliver(event))
    }

    /// 分发已经具名的事件（例如从其它进程转发过来的事件）
    pub fn emit(&self, name: &str, raw_payload: &str) -> DispatchReport {
        let code = NativeEvent::from_name(name).map(NativeEvent::code);
        self.deliver(BridgeEvent::decode(name, code, raw_payload))
    }

    /// 异步订阅所有事件
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.sender.subscribe()
    }

    /// 活跃订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn stats(&self) -> EventStats {
        self.stats.read().clone()
    }

    fn deliver(&self, event: BridgeEvent) -> DispatchReport {
        debug!("Dispatching event: {}", event.name);

        {
            let mut stats = self.stats.write();
            stats.total_events += 1;
            *stats.events_by_name.entry(event.name.clone()).or_insert(0) += 1;
            stats.last_event_time = Some(event.timestamp);
        }

        // 快照：具名监听器在前，通配监听器在后
        let snapshot: Vec<(u64, Listener)> = {
            let listeners = self.listeners.read();
            let named = listeners.get(&event.name).into_iter().flatten();
            let general = if event.name == WILDCARD {
                None
            } else {
                listeners.get(WILDCARD)
            };
            named
                .chain(general.into_iter().flatten())
                .map(|(id, l)| (*id, l.clone()))
                .collect()
        };

        // 无订阅者时 send 会失败，属正常场景
        if let Err(e) = self.sender.send(event.clone()) {
            trace!("no active receivers for {}: {}", event.name, e);
        }

        let mut delivered = 0;
        let mut failures = Vec::new();
        for (id, listener) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                Ok(()) => delivered += 1,
                Err(panic) => failures.push((id, panic_message(panic.as_ref()))),
            }
        }

        if !failures.is_empty() {
            self.stats.write().listener_failures += failures.len() as u64;
            for (id, msg) in &failures {
                warn!("listener #{} for {} panicked: {}", id, event.name, msg);
            }
        }

        DispatchReport {
            event: event.name,
            delivered,
            failures,
        }
    }

    fn remove_where<P>(&self, event: &str, pred: P) -> bool
    where
        P: Fn(&(u64, Listener)) -> bool,
    {
        let (removed, count) = {
            let mut listeners = self.listeners.write();
            let removed = match listeners.get_mut(event) {
                Some(list) => match list.iter().position(|entry| pred(entry)) {
                    Some(idx) => {
                        list.remove(idx);
                        if list.is_empty() {
                            listeners.remove(event);
                        }
                        true
                    }
                    None => false,
                },
                None => false,
            };
            (removed, listeners.values().map(Vec::len).sum::<usize>())
        };
        if removed {
            self.stats.write().listener_count = count;
            debug!("Removed listener for event: {}", event);
        }
        removed
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new(1000)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
