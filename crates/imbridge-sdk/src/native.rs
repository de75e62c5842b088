//! 原生库边界
//!
//! `NativeBridge` 是对原生 IM 库的最小抽象：按名称发起调用、同步调用、安装监听回调、
//! 初始化。原生侧回调通过 `Responder`（调用响应）和 `EventSink`（监听事件）回到核心。
//!
//! 这两个句柄都可以被原生线程在任意时刻调用，内部不会把 panic 传回调用方。

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, trace};

use crate::envelope::{Payload, ProgressUpdate, ResponseEnvelope};
use crate::error::{BridgeError, Result};
use crate::event_code::ListenerKind;
use crate::events::{DispatchReport, EventRouter};
use crate::operation::{NativeArg, OperationId};
use crate::registry::HandlerRegistry;

/// 原生 IM 库
///
/// 实现方负责把参数按位置传给名为 `name` 的原生入口，并把 `responder`
/// 绑定到该调用的回调上。调用本身不能阻塞到原生侧完成。
pub trait NativeBridge: Send + Sync {
    /// 发起异步调用，结果通过 `responder` 回送
    fn call(
        &self,
        name: &str,
        operation_id: &OperationId,
        args: &[NativeArg],
        responder: Responder,
    ) -> Result<()>;

    /// 同步调用，原生入口直接返回结果字符串；`None` 表示空指针
    fn call_sync(
        &self,
        name: &str,
        operation_id: &OperationId,
        args: &[NativeArg],
    ) -> Result<Option<String>>;

    /// 为某个子系统安装监听回调
    fn set_listener(&self, kind: ListenerKind, sink: EventSink) -> Result<()>;

    /// `init_sdk(listener, operationID, configJson)`，返回原生侧是否接受
    fn init_sdk(&self, operation_id: &OperationId, config_json: &str, sink: EventSink) -> Result<bool>;
}

/// 原生调用的响应入口
#[derive(Clone)]
pub struct Responder {
    registry: Arc<HandlerRegistry>,
}

impl Responder {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    /// 终结回调 `(operationID, errCode, errMsg, data)`
    ///
    /// `err_code == 0` 走成功路径，其余走失败路径。返回是否找到挂起条目。
    pub fn respond(&self, operation_id: &str, err_code: i32, err_msg: &str, data: &str) -> bool {
        let response = ResponseEnvelope::from_raw(operation_id.into(), err_code, err_msg, data);
        self.guarded(operation_id, move |registry| deliver_terminal(registry, response))
    }

    /// 中间进度通知
    pub fn progress(&self, operation_id: &str, progress: i32, data: &str) -> bool {
        let update = ProgressUpdate {
            operation_id: operation_id.into(),
            progress,
            data: Payload::decode(data),
        };
        self.guarded(operation_id, move |registry| registry.notify_progress(update))
    }

    /// 带进度参数的回调 `(operationID, errCode, errMsg, data, progress)`
    ///
    /// 原生库用同一个回调同时报告进度和结果：`errCode != 0` 是失败；
    /// `errCode == 0` 且 `data` 为空是进度；携带 `data` 的是成功结果。
    pub fn respond_with_progress(
        &self,
        operation_id: &str,
        err_code: i32,
        err_msg: &str,
        data: &str,
        progress: i32,
    ) -> bool {
        if err_code == 0 && data.is_empty() {
            self.progress(operation_id, progress, data)
        } else {
            self.respond(operation_id, err_code, err_msg, data)
        }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    fn guarded<F>(&self, operation_id: &str, f: F) -> bool
    where
        F: FnOnce(&HandlerRegistry) -> bool,
    {
        let registry = &self.registry;
        match catch_unwind(AssertUnwindSafe(|| f(registry))) {
            Ok(found) => found,
            Err(_) => {
                error!("panic while delivering callback for operation {}", operation_id);
                false
            }
        }
    }
}

fn deliver_terminal(registry: &HandlerRegistry, response: ResponseEnvelope) -> bool {
    let operation_id = response.operation_id.clone();
    if response.is_success() {
        registry.resolve(&operation_id, response)
    } else {
        registry.reject(&operation_id, BridgeError::native_failure(response))
    }
}

/// 原生监听回调 `(event, data)` 的入口
#[derive(Clone)]
pub struct EventSink {
    router: Arc<EventRouter>,
}

impl EventSink {
    pub fn new(router: Arc<EventRouter>) -> Self {
        Self { router }
    }

    /// 分发一个原生事件；未映射的事件码返回 `None`
    pub fn emit(&self, event_code: i32, payload: &str) -> Option<DispatchReport> {
        trace!("native event {} ({} bytes)", event_code, payload.len());
        let router = &self.router;
        match catch_unwind(AssertUnwindSafe(|| router.dispatch(event_code, payload))) {
            Ok(report) => report,
            Err(_) => {
                error!("panic while dispatching native event {}", event_code);
                None
            }
        }
    }

    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::CallMode;
    use parking_lot::Mutex;

    fn pending(registry: &HandlerRegistry, id: &str, mode: CallMode) -> Arc<Mutex<Vec<String>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (a, b, c) = (log.clone(), log.clone(), log.clone());
        registry
            .register(
                id.into(),
                mode,
                Box::new(move |r| a.lock().push(format!("ok:{}", r.data.to_json_string()))),
                Box::new(move |e| b.lock().push(format!("err:{}", e.err_code()))),
                Some(Arc::new(move |p: ProgressUpdate| c.lock().push(format!("p:{}", p.progress)))),
            )
            .unwrap();
        log
    }

    #[test]
    fn test_respond_routes_by_err_code() {
        let registry = Arc::new(HandlerRegistry::new());
        let responder = Responder::new(registry.clone());
        let ok = pending(&registry, "a", CallMode::OneShot);
        let bad = pending(&registry, "b", CallMode::OneShot);

        assert!(responder.respond("a", 0, "", "{\"x\":1}"));
        assert!(responder.respond("b", 1001, "invalid token", ""));
        assert!(!responder.respond("c", 0, "", ""));

        assert_eq!(*ok.lock(), vec!["ok:{\"x\":1}"]);
        assert_eq!(*bad.lock(), vec!["err:1001"]);
    }

    #[test]
    fn test_respond_with_progress_classification() {
        let registry = Arc::new(HandlerRegistry::new());
        let responder = Responder::new(registry.clone());
        let log = pending(&registry, "send", CallMode::Progress);

        assert!(responder.respond_with_progress("send", 0, "", "", 30));
        assert!(responder.respond_with_progress("send", 0, "", "", 60));
        assert!(responder.respond_with_progress("send", 0, "", "{\"status\":2}", 100));
        assert!(!responder.respond_with_progress("send", 0, "", "", 100));

        assert_eq!(*log.lock(), vec!["p:30", "p:60", "ok:{\"status\":2}"]);
    }

    #[test]
    fn test_progress_failure_is_terminal() {
        let registry = Arc::new(HandlerRegistry::new());
        let responder = Responder::new(registry.clone());
        let log = pending(&registry, "upload", CallMode::Progress);

        assert!(responder.respond_with_progress("upload", 0, "", "", 10));
        assert!(responder.respond_with_progress("upload", 1501, "oss error", "", 10));
        assert_eq!(*log.lock(), vec!["p:10", "err:1501"]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_panicking_resolver_does_not_unwind() {
        let registry = Arc::new(HandlerRegistry::new());
        let responder = Responder::new(registry.clone());
        registry
            .register(
                "boom".into(),
                CallMode::OneShot,
                Box::new(|_| panic!("resolver panicked")),
                Box::new(|_| {}),
                None,
            )
            .unwrap();
        assert!(!responder.respond("boom", 0, "", ""));
        assert!(registry.is_empty());
    }
}
