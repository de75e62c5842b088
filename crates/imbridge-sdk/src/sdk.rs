//! 原生绑定的生命周期
//!
//! `ImBridge` 持有一个原生库、一个调用关联器、一个事件路由器以及绑定状态机。
//! 只有 `Ready` 状态接受调用；监听器的注册与移除在任何状态下都可以进行。

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::abi::{self, AttachToken};
use crate::config::{BridgeConfig, InitConfig};
use crate::correlator::{CallCorrelator, PendingCall};
use crate::envelope::{BridgeEvent, Payload, ResponseEnvelope};
use crate::error::{BridgeError, Result};
use crate::events::{EventRouter, Listener, SubscriptionHandle};
use crate::native::{EventSink, NativeBridge, Responder};
use crate::operation::{CallMode, NativeArg, OperationId};
use crate::state::{BindingState, StateMachine};

/// 原生 IM SDK 绑定
pub struct ImBridge {
    native: Arc<dyn NativeBridge>,
    correlator: CallCorrelator,
    router: Arc<EventRouter>,
    state: StateMachine,
    config: BridgeConfig,
    abi_token: Mutex<Option<AttachToken>>,
}

impl ImBridge {
    pub fn new(native: Arc<dyn NativeBridge>) -> Self {
        Self::with_config(native, BridgeConfig::default())
    }

    pub fn with_config(native: Arc<dyn NativeBridge>, config: BridgeConfig) -> Self {
        let router = Arc::new(EventRouter::new(config.event_buffer));
        let correlator = CallCorrelator::new(native.clone(), &config);
        Self {
            native,
            correlator,
            router,
            state: StateMachine::new(),
            config,
            abi_token: Mutex::new(None),
        }
    }

    /// 初始化原生 SDK 并安装监听回调
    ///
    /// 原生侧拒绝配置时返回 `InitFailed`，状态回到 `Uninitialized`。
    pub fn init_sdk(&self, config: &InitConfig) -> Result<()> {
        config.validate()?;
        self.state.transition(BindingState::Initializing)?;
        info!("正在初始化原生 SDK: api={}, ws={}", config.api_addr, config.ws_addr);

        if let Err(e) = self.start(config) {
            warn!("⚠️ 原生 SDK 初始化失败: {}", e);
            let _ = self.state.transition(BindingState::Uninitialized);
            return Err(e);
        }

        self.state.transition(BindingState::Ready)?;
        info!("✅ 原生 SDK 初始化完成");
        Ok(())
    }

    fn start(&self, config: &InitConfig) -> Result<()> {
        let operation_id = OperationId::generate();
        let config_json = config.to_json()?;
        if !self.native.init_sdk(&operation_id, &config_json, self.event_sink())? {
            return Err(BridgeError::InitFailed);
        }

        for kind in &self.config.listeners {
            self.native.set_listener(*kind, self.event_sink())?;
        }
        self.state.transition(BindingState::Listening)?;

        let token = abi::attach(self.responder(), self.event_sink());
        *self.abi_token.lock() = Some(token);
        Ok(())
    }

    /// 反初始化，幂等
    ///
    /// 之后所有调用返回 `TornDown`，仍在挂起的调用以 `TornDown` 拒绝。
    pub fn un_init_sdk(&self) -> Result<()> {
        let previous = self.state.current();
        if previous == BindingState::TornDown {
            return Ok(());
        }

        let native_result = if previous == BindingState::Uninitialized {
            Ok(())
        } else {
            self.correlator.invoke_sync("un_init_sdk", &[]).map(|_| ())
        };

        match self.state.transition(BindingState::TornDown) {
            Ok(_) => {}
            // 并发 teardown
            Err(BridgeError::InvalidState { .. }) => return Ok(()),
            Err(e) => return Err(e),
        }

        let rejected = self.correlator.registry().reject_all(|_| BridgeError::TornDown);
        if let Some(token) = self.abi_token.lock().take() {
            abi::detach(token);
        }
        info!("原生 SDK 已反初始化，拒绝了 {} 个挂起调用", rejected);

        native_result
    }

    pub async fn login(&self, user_id: &str, token: &str) -> Result<ResponseEnvelope> {
        self.invoke("login", &[user_id.into(), token.into()], CallMode::OneShot)?
            .await
    }

    pub async fn logout(&self) -> Result<ResponseEnvelope> {
        self.invoke("logout", &[], CallMode::OneShot)?.await
    }

    pub async fn set_app_background_status(&self, is_background: bool) -> Result<ResponseEnvelope> {
        self.invoke("set_app_background_status", &[is_background.into()], CallMode::OneShot)?
            .await
    }

    pub async fn network_status_changed(&self) -> Result<ResponseEnvelope> {
        self.invoke("network_status_changed", &[], CallMode::OneShot)?
            .await
    }

    /// 登录状态（原生整数码）
    pub fn get_login_status(&self) -> Result<i32> {
        let response = self.invoke_sync("get_login_status", &[])?;
        let status = match &response.data {
            Payload::Json(v) => v.as_i64(),
            Payload::Raw(s) => s.trim().parse::<i64>().ok(),
        };
        status
            .and_then(|s| i32::try_from(s).ok())
            .ok_or_else(|| {
                BridgeError::InvalidArgument(format!(
                    "login status is not an integer: {}",
                    response.data.to_json_string()
                ))
            })
    }

    /// 当前登录用户 ID
    pub fn get_login_user(&self) -> Result<String> {
        let response = self.invoke_sync("get_login_user", &[])?;
        Ok(match response.data {
            Payload::Json(serde_json::Value::String(s)) => s,
            Payload::Raw(s) => s,
            other => other.to_json_string(),
        })
    }

    /// 发起异步调用
    pub fn invoke(&self, name: &str, args: &[NativeArg], mode: CallMode) -> Result<PendingCall> {
        self.state
            .while_ready(|| self.correlator.invoke(name, args, mode))
    }

    pub fn invoke_with_id(
        &self,
        name: &str,
        operation_id: OperationId,
        args: &[NativeArg],
        mode: CallMode,
    ) -> Result<PendingCall> {
        self.state
            .while_ready(|| self.correlator.invoke_with_id(name, operation_id, args, mode))
    }

    /// 发起同步调用
    pub fn invoke_sync(&self, name: &str, args: &[NativeArg]) -> Result<ResponseEnvelope> {
        self.state
            .while_ready(|| self.correlator.invoke_sync(name, args))
    }

    pub fn on<F>(&self, event: &str, listener: F) -> SubscriptionHandle
    where
        F: Fn(&BridgeEvent) + Send + Sync + 'static,
    {
        self.router.on(event, listener)
    }

    pub fn on_listener(&self, event: &str, listener: Listener) -> SubscriptionHandle {
        self.router.on_listener(event, listener)
    }

    pub fn off(&self, event: &str, listener: &Listener) -> bool {
        self.router.off(event, listener)
    }

    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        self.router.unsubscribe(handle)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.router.subscribe()
    }

    /// 以 `Timeout` 拒绝挂起过久的调用
    pub fn reap_expired(&self, max_age: Duration) -> usize {
        self.correlator.registry().reap_expired(max_age)
    }

    pub fn state(&self) -> BindingState {
        self.state.current()
    }

    pub fn pending_count(&self) -> usize {
        self.correlator.pending_count()
    }

    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// 原生调用回调入口
    pub fn responder(&self) -> Responder {
        self.correlator.responder()
    }

    /// 原生监听回调入口
    pub fn event_sink(&self) -> EventSink {
        EventSink::new(self.router.clone())
    }
}

impl Drop for ImBridge {
    fn drop(&mut self) {
        if let Some(token) = self.abi_token.lock().take() {
            abi::detach(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_code::ListenerKind;
    use crate::testing::LoopbackBridge;

    fn config() -> InitConfig {
        InitConfig::new("http://127.0.0.1:10002", "ws://127.0.0.1:10001", 3, "/tmp/im")
    }

    #[test]
    fn test_calls_fail_fast_before_init() {
        let native = Arc::new(LoopbackBridge::new());
        let bridge = ImBridge::new(native.clone());
        assert!(matches!(
            bridge.invoke("login", &[], CallMode::OneShot),
            Err(BridgeError::NotInitialized)
        ));
        assert!(matches!(bridge.get_login_status(), Err(BridgeError::NotInitialized)));
        assert!(native.calls().is_empty());
    }

    #[test]
    fn test_init_installs_listeners() {
        let _guard = abi::TEST_LOCK.lock();
        let native = Arc::new(LoopbackBridge::new());
        let bridge = ImBridge::with_config(
            native.clone(),
            BridgeConfig::builder()
                .listeners([ListenerKind::User, ListenerKind::Group])
                .build(),
        );
        bridge.init_sdk(&config()).unwrap();
        assert_eq!(bridge.state(), BindingState::Ready);
        assert_eq!(
            native.installed_listeners(),
            vec![ListenerKind::User, ListenerKind::Group]
        );
        assert!(abi::is_attached());

        let init = native.find_call("init_sdk").unwrap();
        let json = init.args[0].as_str().unwrap();
        assert!(json.contains("\"platformID\":3"));

        assert!(matches!(
            bridge.init_sdk(&config()),
            Err(BridgeError::InvalidState { from: BindingState::Ready, .. })
        ));
        bridge.un_init_sdk().unwrap();
        assert!(!abi::is_attached());
    }

    #[test]
    fn test_rejected_init_returns_to_uninitialized() {
        let native = Arc::new(LoopbackBridge::new());
        native.set_init_result(false);
        let bridge = ImBridge::new(native.clone());
        assert!(matches!(bridge.init_sdk(&config()), Err(BridgeError::InitFailed)));
        assert_eq!(bridge.state(), BindingState::Uninitialized);
        assert!(native.installed_listeners().is_empty());

        native.set_init_result(true);
        let _guard = abi::TEST_LOCK.lock();
        bridge.init_sdk(&config()).unwrap();
        assert_eq!(bridge.state(), BindingState::Ready);
    }

    #[test]
    fn test_sync_helpers() {
        let _guard = abi::TEST_LOCK.lock();
        let native = Arc::new(LoopbackBridge::new());
        let bridge = ImBridge::new(native.clone());
        bridge.init_sdk(&config()).unwrap();

        native.set_sync_result("get_login_status", Some("3"));
        native.set_sync_result("get_login_user", Some("u1"));
        assert_eq!(bridge.get_login_status().unwrap(), 3);
        assert_eq!(bridge.get_login_user().unwrap(), "u1");
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let native = Arc::new(LoopbackBridge::new());
        let bridge = ImBridge::new(native.clone());
        bridge.un_init_sdk().unwrap();
        bridge.un_init_sdk().unwrap();
        assert_eq!(bridge.state(), BindingState::TornDown);
        assert!(native.find_call("un_init_sdk").is_none());
        assert!(matches!(
            bridge.invoke_sync("get_login_user", &[]),
            Err(BridgeError::TornDown)
        ));
    }
}
