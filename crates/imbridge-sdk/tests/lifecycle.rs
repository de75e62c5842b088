//! 绑定生命周期测试

use std::sync::Arc;

use imbridge_sdk::testing::LoopbackBridge;
use imbridge_sdk::{
    BindingState, BridgeConfig, BridgeError, CallMode, ImBridge, InitConfig, ListenerKind,
    NativeArg, ERR_UNKNOWN,
};

fn init_config() -> InitConfig {
    InitConfig::new("http://127.0.0.1:10002", "ws://127.0.0.1:10001", 3, "/tmp/im")
        .with_log_level(5)
        .with_system_type("electron")
}

#[test]
fn test_full_lifecycle() {
    let native = Arc::new(LoopbackBridge::new());
    let bridge = ImBridge::new(native.clone());
    assert_eq!(bridge.state(), BindingState::Uninitialized);

    bridge.init_sdk(&init_config()).unwrap();
    assert_eq!(bridge.state(), BindingState::Ready);
    assert_eq!(native.installed_listeners(), ListenerKind::ALL.to_vec());

    bridge.un_init_sdk().unwrap();
    assert_eq!(bridge.state(), BindingState::TornDown);
    let teardown = native.find_call("un_init_sdk").unwrap();
    assert!(teardown.sync);

    // 幂等
    bridge.un_init_sdk().unwrap();
    assert_eq!(
        native.calls().iter().filter(|c| c.name == "un_init_sdk").count(),
        1
    );
}

#[test]
fn test_invalid_config_is_rejected_before_native() {
    let native = Arc::new(LoopbackBridge::new());
    let bridge = ImBridge::new(native.clone());
    let mut config = init_config();
    config.data_dir = String::new();

    assert!(matches!(bridge.init_sdk(&config), Err(BridgeError::InvalidArgument(_))));
    assert_eq!(bridge.state(), BindingState::Uninitialized);
    assert!(native.calls().is_empty());
}

#[test]
fn test_listener_install_failure_rolls_back() {
    let native = Arc::new(LoopbackBridge::new());
    native.fail_issue("set_signaling_listener");
    let bridge = ImBridge::new(native.clone());

    assert!(matches!(bridge.init_sdk(&init_config()), Err(BridgeError::Native(_))));
    assert_eq!(bridge.state(), BindingState::Uninitialized);
    assert!(matches!(
        bridge.invoke("login", &[], CallMode::OneShot),
        Err(BridgeError::NotInitialized)
    ));
}

#[test]
fn test_listeners_work_in_any_state() {
    let native = Arc::new(LoopbackBridge::new());
    let bridge = ImBridge::new(native);
    let handle = bridge.on("OnConnecting", |_| {});
    assert!(bridge.unsubscribe(&handle));

    bridge.un_init_sdk().unwrap();
    let handle = bridge.on("OnConnecting", |_| {});
    assert!(bridge.unsubscribe(&handle));
}

#[tokio::test]
async fn test_domain_calls() {
    let native = Arc::new(LoopbackBridge::new());
    native.auto_reply("login", 0, "", "");
    native.auto_reply("set_app_background_status", 0, "", "");
    native.auto_reply("network_status_changed", 0, "", "");
    native.auto_reply("logout", 0, "", "");
    let bridge = ImBridge::new(native.clone());
    bridge.init_sdk(&init_config()).unwrap();

    bridge.login("u1", "tok").await.unwrap();
    bridge.set_app_background_status(true).await.unwrap();
    bridge.network_status_changed().await.unwrap();
    bridge.logout().await.unwrap();

    let background = native.find_call("set_app_background_status").unwrap();
    assert_eq!(background.args, vec![NativeArg::Bool(true)]);

    native.set_sync_result("get_login_status", Some("3"));
    assert_eq!(bridge.get_login_status().unwrap(), 3);

    native.set_sync_result("get_login_user", None);
    let err = bridge.get_login_user().unwrap_err();
    assert_eq!(err.err_code(), ERR_UNKNOWN);
}

#[tokio::test]
async fn test_caller_supplied_operation_id() {
    let native = Arc::new(LoopbackBridge::new());
    let bridge = ImBridge::with_config(
        native.clone(),
        BridgeConfig::builder().no_call_timeout().build(),
    );
    bridge.init_sdk(&init_config()).unwrap();

    let call = bridge
        .invoke_with_id("logout", "my-op".into(), &[], CallMode::OneShot)
        .unwrap();
    assert!(matches!(
        bridge.invoke_with_id("logout", "my-op".into(), &[], CallMode::OneShot),
        Err(BridgeError::DuplicateOperationId(_))
    ));

    native.respond(&"my-op".into(), 0, "", "");
    assert_eq!(call.await.unwrap().operation_id.as_str(), "my-op");

    // 完成之后可以复用
    let again = bridge
        .invoke_with_id("logout", "my-op".into(), &[], CallMode::OneShot)
        .unwrap();
    drop(again);
    assert_eq!(bridge.pending_count(), 0);
}

#[test]
fn test_logout_under_block_on() {
    let native = Arc::new(LoopbackBridge::new());
    let bridge = ImBridge::new(native.clone());
    bridge.init_sdk(&init_config()).unwrap();
    native.auto_reply("logout", 0, "", "");

    // 宿主用其它执行器等待时不计时，但照常拿到结果
    let response = futures::executor::block_on(bridge.logout()).unwrap();
    assert!(response.is_success());
    assert_eq!(bridge.pending_count(), 0);
}
