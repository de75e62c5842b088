//! Main bridge handle for FFI consumers

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use imbridge_sdk::{
    BridgeConfig, BridgeError, BridgeEvent, CallMode, EventSink, ImBridge, InitConfig,
    ListenerKind, NativeArg, NativeBridge, OperationId, Responder, SubscriptionHandle,
};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::callbacks::{EventListener, NativeCaller, ProgressObserver};
use crate::error::BridgeFfiError;
use crate::types::{CallResponse, FfiArg, FfiBindingState, FfiBridgeConfig, FfiInitConfig};

/// 所有 FFI 入口调用时打 debug 日志（仅 RUST_LOG=debug 时输出）
macro_rules! ffi_log {
    ($name:expr) => {
        debug!("imbridge ffi->{}()", $name);
    };
}

/// 把宿主的 `NativeCaller` 适配为核心的 `NativeBridge`
///
/// 宿主通过 `BridgeHandle::deliver_*` 回送结果和事件，因此这里不保存 responder/sink。
struct HostBridge {
    caller: Box<dyn NativeCaller>,
}

fn to_ffi_args(args: &[NativeArg]) -> Vec<FfiArg> {
    args.iter().map(FfiArg::from).collect()
}

impl NativeBridge for HostBridge {
    fn call(
        &self,
        name: &str,
        operation_id: &OperationId,
        args: &[NativeArg],
        _responder: Responder,
    ) -> imbridge_sdk::Result<()> {
        if self
            .caller
            .call(name.to_string(), operation_id.to_string(), to_ffi_args(args))
        {
            Ok(())
        } else {
            Err(BridgeError::Native(format!("host refused call {}", name)))
        }
    }

    fn call_sync(
        &self,
        name: &str,
        operation_id: &OperationId,
        args: &[NativeArg],
    ) -> imbridge_sdk::Result<Option<String>> {
        Ok(self
            .caller
            .call_sync(name.to_string(), operation_id.to_string(), to_ffi_args(args)))
    }

    fn set_listener(&self, kind: ListenerKind, _sink: EventSink) -> imbridge_sdk::Result<()> {
        if self.caller.set_listener(kind.into()) {
            Ok(())
        } else {
            Err(BridgeError::Native(format!("host refused {}", kind.setter_name())))
        }
    }

    fn init_sdk(
        &self,
        operation_id: &OperationId,
        config_json: &str,
        _sink: EventSink,
    ) -> imbridge_sdk::Result<bool> {
        Ok(self
            .caller
            .init_sdk(operation_id.to_string(), config_json.to_string()))
    }
}

/// Main bridge handle for FFI consumers
#[derive(uniffi::Object)]
pub struct BridgeHandle {
    bridge: ImBridge,
    /// token -> 路由订阅
    listeners: Mutex<HashMap<u64, SubscriptionHandle>>,
    /// Counter for generating listener tokens
    listener_counter: AtomicU64,
}

#[uniffi::export]
impl BridgeHandle {
    /// 创建 bridge；`config` 为空时使用默认配置
    #[uniffi::constructor]
    pub fn new(caller: Box<dyn NativeCaller>, config: Option<FfiBridgeConfig>) -> Self {
        ffi_log!("new");
        let native: Arc<dyn NativeBridge> = Arc::new(HostBridge { caller });
        let bridge = ImBridge::with_config(native, config.map(BridgeConfig::from).unwrap_or_default());
        Self {
            bridge,
            listeners: Mutex::new(HashMap::new()),
            listener_counter: AtomicU64::new(0),
        }
    }

    pub fn init_sdk(&self, config: FfiInitConfig) -> Result<(), BridgeFfiError> {
        ffi_log!("init_sdk");
        let config = InitConfig::from(config);
        self.bridge.init_sdk(&config)?;
        Ok(())
    }

    pub fn un_init_sdk(&self) -> Result<(), BridgeFfiError> {
        ffi_log!("un_init_sdk");
        self.bridge.un_init_sdk()?;
        Ok(())
    }

    pub fn invoke_sync(&self, name: String, args: Vec<FfiArg>) -> Result<CallResponse, BridgeFfiError> {
        ffi_log!("invoke_sync");
        let args: Vec<NativeArg> = args.into_iter().map(Into::into).collect();
        Ok(self.bridge.invoke_sync(&name, &args)?.into())
    }

    /// 原生终结回调 `(operationID, errCode, errMsg, data)`
    pub fn deliver_response(&self, operation_id: String, err_code: i32, err_msg: String, data: String) -> bool {
        self.bridge
            .responder()
            .respond(&operation_id, err_code, &err_msg, &data)
    }

    /// 原生进度回调 `(operationID, progress)`，可附带 data
    pub fn deliver_progress(&self, operation_id: String, progress: i32, data: String) -> bool {
        self.bridge.responder().progress(&operation_id, progress, &data)
    }

    /// 原生带进度参数的回调 `(operationID, errCode, errMsg, data, progress)`
    pub fn deliver_callback(
        &self,
        operation_id: String,
        err_code: i32,
        err_msg: String,
        data: String,
        progress: i32,
    ) -> bool {
        self.bridge
            .responder()
            .respond_with_progress(&operation_id, err_code, &err_msg, &data, progress)
    }

    /// 原生监听回调 `(eventCode, payload)`；返回事件码是否可识别
    pub fn deliver_event(&self, event_code: i32, payload: String) -> bool {
        self.bridge.event_sink().emit(event_code, &payload).is_some()
    }

    /// 注册事件监听器，`event` 为事件名或 `"*"`
    ///
    /// Returns a token that can be used to unsubscribe later.
    pub fn add_listener(&self, event: String, listener: Box<dyn EventListener>) -> u64 {
        let token = self.listener_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = self.bridge.on(&event, move |e: &BridgeEvent| {
            listener.on_event(e.name.clone(), e.err_code, e.err_msg.clone(), e.data.to_json_string());
        });
        self.listeners.lock().insert(token, handle);
        info!("Event listener registered for {} with token: {}", event, token);
        token
    }

    pub fn remove_listener(&self, token: u64) -> bool {
        let Some(handle) = self.listeners.lock().remove(&token) else {
            return false;
        };
        let removed = self.bridge.unsubscribe(&handle);
        info!("Event listener unregistered with token: {}", token);
        removed
    }

    pub fn state(&self) -> FfiBindingState {
        self.bridge.state().into()
    }

    pub fn pending_count(&self) -> u64 {
        self.bridge.pending_count() as u64
    }
}

#[uniffi::export(async_runtime = "tokio")]
impl BridgeHandle {
    /// 发起异步调用并等待终结结果
    ///
    /// 提供 `progress` 时以进度模式发起，结果之前的进度都会交给观察者。
    pub async fn invoke(
        &self,
        name: String,
        args: Vec<FfiArg>,
        progress: Option<Box<dyn ProgressObserver>>,
    ) -> Result<CallResponse, BridgeFfiError> {
        ffi_log!("invoke");
        let args: Vec<NativeArg> = args.into_iter().map(Into::into).collect();
        let response = match progress {
            Some(observer) => {
                self.bridge
                    .invoke(&name, &args, CallMode::Progress)?
                    .wait_with_progress(move |update| observer.on_progress(update.into()))
                    .await?
            }
            None => self.bridge.invoke(&name, &args, CallMode::OneShot)?.await?,
        };
        Ok(response.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FfiListenerKind, ProgressEvent};
    use imbridge_sdk::NativeEvent;
    use tokio::sync::mpsc;

    struct MockHost {
        issued: mpsc::UnboundedSender<(String, String, Vec<FfiArg>)>,
        installed: Arc<Mutex<Vec<FfiListenerKind>>>,
        sync_result: Option<String>,
    }

    impl NativeCaller for MockHost {
        fn call(&self, name: String, operation_id: String, args: Vec<FfiArg>) -> bool {
            name != "missing_symbol" && self.issued.send((name, operation_id, args)).is_ok()
        }

        fn call_sync(&self, _name: String, _operation_id: String, _args: Vec<FfiArg>) -> Option<String> {
            self.sync_result.clone()
        }

        fn set_listener(&self, kind: FfiListenerKind) -> bool {
            self.installed.lock().push(kind);
            true
        }

        fn init_sdk(&self, _operation_id: String, config_json: String) -> bool {
            config_json.contains("platformID")
        }
    }

    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl EventListener for Recorder {
        fn on_event(&self, name: String, err_code: i32, _err_msg: String, data_json: String) {
            self.0.lock().push(format!("{}:{}:{}", name, err_code, data_json));
        }
    }

    struct ProgressRecorder(Arc<Mutex<Vec<i32>>>);

    impl ProgressObserver for ProgressRecorder {
        fn on_progress(&self, event: ProgressEvent) {
            self.0.lock().push(event.progress);
        }
    }

    fn init_config() -> FfiInitConfig {
        FfiInitConfig {
            api_addr: "http://127.0.0.1:10002".to_string(),
            ws_addr: "ws://127.0.0.1:10001".to_string(),
            platform_id: 2,
            data_dir: "/data/im".to_string(),
            log_level: None,
            log_file_path: None,
            system_type: None,
        }
    }

    fn ready_handle(
        sync_result: Option<&str>,
    ) -> (
        Arc<BridgeHandle>,
        mpsc::UnboundedReceiver<(String, String, Vec<FfiArg>)>,
        Arc<Mutex<Vec<FfiListenerKind>>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let installed = Arc::new(Mutex::new(Vec::new()));
        let host = MockHost {
            issued: tx,
            installed: installed.clone(),
            sync_result: sync_result.map(str::to_string),
        };
        let handle = Arc::new(BridgeHandle::new(Box::new(host), None));
        handle.init_sdk(init_config()).unwrap();
        (handle, rx, installed)
    }

    #[tokio::test]
    async fn test_invoke_resolves_through_deliver_response() {
        let (handle, mut issued, installed) = ready_handle(None);
        assert_eq!(handle.state(), FfiBindingState::Ready);
        assert_eq!(installed.lock().len(), ListenerKind::ALL.len());

        let task = {
            let handle = handle.clone();
            tokio::spawn(async move {
                handle
                    .invoke(
                        "login".to_string(),
                        vec![
                            FfiArg::Str { value: "u1".to_string() },
                            FfiArg::Str { value: "tok".to_string() },
                        ],
                        None,
                    )
                    .await
            })
        };

        let (name, operation_id, args) = issued.recv().await.unwrap();
        assert_eq!(name, "login");
        assert_eq!(args.len(), 2);
        assert!(handle.deliver_response(operation_id.clone(), 0, String::new(), r#"{"ok":true}"#.to_string()));

        let response = task.await.unwrap().unwrap();
        assert_eq!(response.operation_id, operation_id);
        assert_eq!(response.data_json, r#"{"ok":true}"#);
        assert_eq!(handle.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_invoke_with_progress_observer() {
        let (handle, mut issued, _) = ready_handle(None);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let task = {
            let handle = handle.clone();
            let observer = Box::new(ProgressRecorder(seen.clone()));
            tokio::spawn(async move {
                handle
                    .invoke("send_message".to_string(), vec![], Some(observer))
                    .await
            })
        };

        let (_, operation_id, _) = issued.recv().await.unwrap();
        assert!(handle.deliver_callback(operation_id.clone(), 0, String::new(), String::new(), 30));
        assert!(handle.deliver_progress(operation_id.clone(), 60, String::new()));
        assert!(handle.deliver_callback(operation_id.clone(), 1302, "too large".to_string(), String::new(), 0));

        match task.await.unwrap() {
            Err(BridgeFfiError::NativeCall { err_code, err_msg, .. }) => {
                assert_eq!(err_code, 1302);
                assert_eq!(err_msg, "too large");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(*seen.lock(), vec![30, 60]);
        assert!(!handle.deliver_progress(operation_id, 90, String::new()));
    }

    #[tokio::test]
    async fn test_refused_call_and_sync_convention() {
        let (handle, _issued, _) = ready_handle(None);

        let err = handle
            .invoke("missing_symbol".to_string(), vec![], None)
            .await
            .unwrap_err();
        assert_eq!(err.err_code(), imbridge_sdk::error::codes::NATIVE);

        let err = handle.invoke_sync("get_login_user".to_string(), vec![]).unwrap_err();
        assert_eq!(err.err_code(), imbridge_sdk::ERR_UNKNOWN);

        // 豁免的调用允许空结果
        handle.un_init_sdk().unwrap();
        assert_eq!(handle.state(), FfiBindingState::TornDown);
        assert!(matches!(
            handle.invoke_sync("get_login_user".to_string(), vec![]),
            Err(BridgeFfiError::TornDown)
        ));
    }

    #[test]
    fn test_listener_tokens() {
        let (handle, _issued, _) = ready_handle(Some("3"));
        let log = Arc::new(Mutex::new(Vec::new()));

        let token = handle.add_listener("OnConnectFailed".to_string(), Box::new(Recorder(log.clone())));
        assert!(handle.deliver_event(
            NativeEvent::ConnectFailed.code(),
            r#"{"errCode":1500,"errMsg":"offline"}"#.to_string()
        ));
        assert!(!handle.deliver_event(4242, String::new()));
        assert_eq!(*log.lock(), vec!["OnConnectFailed:1500:".to_string()]);

        assert!(handle.remove_listener(token));
        assert!(!handle.remove_listener(token));
        handle.deliver_event(NativeEvent::ConnectFailed.code(), String::new());
        assert_eq!(log.lock().len(), 1);

        let status = handle.invoke_sync("get_login_status".to_string(), vec![]).unwrap();
        assert_eq!(status.data_json, "3");
    }

    #[test]
    fn test_calls_before_init_fail_fast() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let host = MockHost {
            issued: tx,
            installed: Arc::new(Mutex::new(Vec::new())),
            sync_result: None,
        };
        let handle = BridgeHandle::new(Box::new(host), None);
        assert_eq!(handle.state(), FfiBindingState::Uninitialized);
        assert!(matches!(
            handle.invoke_sync("get_login_status".to_string(), vec![]),
            Err(BridgeFfiError::NotInitialized)
        ));
    }
}
