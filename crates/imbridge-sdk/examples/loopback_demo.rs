//! 回环演示：不加载原生库，用 `LoopbackBridge` 在后台线程模拟原生回调
//!
//! 运行：`cargo run -p imbridge-sdk --features testing --example loopback_demo`

use imbridge_sdk::testing::LoopbackBridge;
use imbridge_sdk::{BridgeConfig, CallMode, ImBridge, InitConfig, NativeArg, NativeEvent};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let native = Arc::new(LoopbackBridge::new());
    native.auto_reply("login", 0, "", "");
    native.set_sync_result("get_login_user", Some("u1"));

    let bridge = ImBridge::with_config(
        native.clone(),
        BridgeConfig::builder()
            .call_timeout(Duration::from_secs(5))
            .build(),
    );

    bridge.on("*", |event| {
        info!("📨 事件 {}: {}", event.name, event.data.to_json_string());
    });

    bridge.init_sdk(
        &InitConfig::new("http://127.0.0.1:10002", "ws://127.0.0.1:10001", 7, "/tmp/imbridge-demo")
            .with_log_level(6),
    )?;

    bridge.login("u1", "token").await?;
    info!("✅ 登录成功: {}", bridge.get_login_user()?);

    native.emit(NativeEvent::ConnectSuccess.code(), "");

    // 发送消息：原生侧在后台线程先报告进度，再给出结果
    let call = bridge.invoke(
        "send_message",
        &[
            NativeArg::json(&json!({"contentType": 101, "textElem": {"content": "hello"}}))?,
            "u2".into(),
            "".into(),
            NativeArg::json(&json!({"title": "You has a new message."}))?,
        ],
        CallMode::Progress,
    )?;
    let op = call.operation_id().clone();
    let worker = {
        let native = native.clone();
        std::thread::spawn(move || {
            for p in [25, 50, 75] {
                native.progress(&op, 0, "", "", p);
                std::thread::sleep(Duration::from_millis(50));
            }
            native.progress(&op, 0, "", r#"{"status":2}"#, 100);
        })
    };

    let response = call
        .wait_with_progress(|update| info!("⏳ 发送进度 {}%", update.progress))
        .await?;
    info!("✅ 发送完成: {}", response.data.to_json_string());
    let _ = worker.join();

    bridge.un_init_sdk()?;
    info!("事件统计: {:?}", bridge.router().stats());
    Ok(())
}
