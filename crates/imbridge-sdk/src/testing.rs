//! 进程内回环原生库
//!
//! `LoopbackBridge` 实现 `NativeBridge`，但不加载任何动态库：记录所有调用，
//! 并允许测试或演示代码在任意线程上模拟原生回调与事件。

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::event_code::ListenerKind;
use crate::native::{EventSink, NativeBridge, Responder};
use crate::operation::{NativeArg, OperationId};

/// 一次被记录的原生调用
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub name: String,
    pub operation_id: OperationId,
    pub args: Vec<NativeArg>,
    pub sync: bool,
}

/// 自动回复：调用发出后立刻以给定结果回调
#[derive(Debug, Clone)]
struct AutoReply {
    err_code: i32,
    err_msg: String,
    data: String,
}

#[derive(Default)]
struct State {
    calls: Vec<RecordedCall>,
    responder: Option<Responder>,
    init_sink: Option<EventSink>,
    listeners: HashMap<ListenerKind, EventSink>,
    sync_results: HashMap<String, Option<String>>,
    init_result: Option<bool>,
    auto_replies: HashMap<String, AutoReply>,
    failing: HashSet<String>,
}

/// 回环原生库
#[derive(Default)]
pub struct LoopbackBridge {
    state: Mutex<State>,
}

impl LoopbackBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置同步调用的返回值；未设置的调用返回 `None`
    pub fn set_sync_result(&self, name: &str, result: Option<&str>) {
        self.state
            .lock()
            .sync_results
            .insert(name.to_string(), result.map(str::to_string));
    }

    /// 设置 `init_sdk` 的返回值，默认接受
    pub fn set_init_result(&self, accepted: bool) {
        self.state.lock().init_result = Some(accepted);
    }

    /// 对某个调用名自动回复
    pub fn auto_reply(&self, name: &str, err_code: i32, err_msg: &str, data: &str) {
        self.state.lock().auto_replies.insert(
            name.to_string(),
            AutoReply {
                err_code,
                err_msg: err_msg.to_string(),
                data: data.to_string(),
            },
        );
    }

    /// 让某个调用名在发起时直接失败（模拟缺失的原生符号）
    pub fn fail_issue(&self, name: &str) {
        self.state.lock().failing.insert(name.to_string());
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.state.lock().calls.last().cloned()
    }

    /// 按调用名查找最近一次调用
    pub fn find_call(&self, name: &str) -> Option<RecordedCall> {
        self.state
            .lock()
            .calls
            .iter()
            .rev()
            .find(|c| c.name == name)
            .cloned()
    }

    /// 模拟终结回调
    pub fn respond(&self, operation_id: &OperationId, err_code: i32, err_msg: &str, data: &str) -> bool {
        match self.responder() {
            Some(responder) => responder.respond(operation_id.as_str(), err_code, err_msg, data),
            None => false,
        }
    }

    /// 模拟带进度的回调
    pub fn progress(
        &self,
        operation_id: &OperationId,
        err_code: i32,
        err_msg: &str,
        data: &str,
        progress: i32,
    ) -> bool {
        match self.responder() {
            Some(responder) => responder.respond_with_progress(
                operation_id.as_str(),
                err_code,
                err_msg,
                data,
                progress,
            ),
            None => false,
        }
    }

    /// 模拟原生监听事件（优先走 init_sdk 安装的监听）
    pub fn emit(&self, event_code: i32, payload: &str) -> bool {
        let sink = {
            let state = self.state.lock();
            state
                .init_sink
                .clone()
                .or_else(|| state.listeners.values().next().cloned())
        };
        match sink {
            Some(sink) => sink.emit(event_code, payload).is_some(),
            None => false,
        }
    }

    /// 已安装监听回调的子系统
    pub fn installed_listeners(&self) -> Vec<ListenerKind> {
        let state = self.state.lock();
        ListenerKind::ALL
            .iter()
            .copied()
            .filter(|k| state.listeners.contains_key(k))
            .collect()
    }

    fn responder(&self) -> Option<Responder> {
        self.state.lock().responder.clone()
    }

    fn record(&self, name: &str, operation_id: &OperationId, args: &[NativeArg], sync: bool) {
        self.state.lock().calls.push(RecordedCall {
            name: name.to_string(),
            operation_id: operation_id.clone(),
            args: args.to_vec(),
            sync,
        });
    }
}

impl NativeBridge for LoopbackBridge {
    fn call(
        &self,
        name: &str,
        operation_id: &OperationId,
        args: &[NativeArg],
        responder: Responder,
    ) -> Result<()> {
        let reply = {
            let mut state = self.state.lock();
            if state.failing.contains(name) {
                return Err(BridgeError::Native(format!("symbol not found: {name}")));
            }
            state.responder = Some(responder.clone());
            state.auto_replies.get(name).cloned()
        };
        self.record(name, operation_id, args, false);
        debug!("loopback call {} [{}]", name, operation_id);

        if let Some(reply) = reply {
            responder.respond(operation_id.as_str(), reply.err_code, &reply.err_msg, &reply.data);
        }
        Ok(())
    }

    fn call_sync(
        &self,
        name: &str,
        operation_id: &OperationId,
        args: &[NativeArg],
    ) -> Result<Option<String>> {
        if self.state.lock().failing.contains(name) {
            return Err(BridgeError::Native(format!("symbol not found: {name}")));
        }
        self.record(name, operation_id, args, true);
        Ok(self
            .state
            .lock()
            .sync_results
            .get(name)
            .cloned()
            .flatten())
    }

    fn set_listener(&self, kind: ListenerKind, sink: EventSink) -> Result<()> {
        if self.state.lock().failing.contains(kind.setter_name()) {
            return Err(BridgeError::Native(format!("symbol not found: {kind}")));
        }
        self.state.lock().listeners.insert(kind, sink);
        Ok(())
    }

    fn init_sdk(&self, operation_id: &OperationId, config_json: &str, sink: EventSink) -> Result<bool> {
        self.record("init_sdk", operation_id, &[NativeArg::from(config_json)], true);
        let mut state = self.state.lock();
        state.init_sink = Some(sink);
        Ok(state.init_result.unwrap_or(true))
    }
}
