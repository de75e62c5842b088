//! imbridge SDK - 原生 IM SDK 的调用关联与事件路由核心
//!
//! 原生 IM 库以 C 函数表的形式导出所有能力：每个异步入口接收一个回调指针和一个
//! operationID，完成后以 `(operationID, errCode, errMsg, data)` 回调；所有子系统的
//! 事件都通过同一种 `(event, data)` 监听回调送达。本 crate 把它们变成：
//! - 🔑 按 operationID 关联、只终结一次的可 await 调用（支持进度通知）
//! - 📡 按事件名订阅的事件流（快照分发，监听器互相隔离）
//! - ⏱️ 调用超时与放弃等待时的清理
//! - 🧵 原生任意线程回调的并发安全
//!
//! # 快速开始
//!
//! 下面用 `testing` feature 提供的 `LoopbackBridge` 代替真实的原生库：
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use imbridge_sdk::{ImBridge, InitConfig};
//! use imbridge_sdk::testing::LoopbackBridge;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bridge = ImBridge::new(Arc::new(LoopbackBridge::new()));
//!     bridge.init_sdk(&InitConfig::new("http://127.0.0.1:10002", "ws://127.0.0.1:10001", 3, "/tmp/im"))?;
//!
//!     bridge.on("OnRecvNewMessage", |event| {
//!         println!("收到消息: {}", event.data.to_json_string());
//!     });
//!
//!     let response = bridge.login("u1", "token").await?;
//!     println!("登录成功: {}", response.data.to_json_string());
//!
//!     bridge.un_init_sdk()?;
//!     Ok(())
//! }
//! ```

pub mod abi;
pub mod config;
pub mod correlator;
pub mod envelope;
pub mod error;
pub mod event_code;
pub mod events;
pub mod native;
pub mod operation;
pub mod registry;
pub mod sdk;
pub mod state;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod version;

// 重新导出核心类型，方便使用
pub use config::{BridgeConfig, BridgeConfigBuilder, InitConfig};
pub use correlator::{CallCorrelator, PendingCall};
pub use envelope::{BridgeEvent, Payload, ProgressUpdate, ResponseEnvelope};
pub use error::{BridgeError, Result, ERR_UNKNOWN};
pub use event_code::{ListenerKind, NativeEvent};
pub use events::{DispatchReport, EventRouter, EventStats, Listener, SubscriptionHandle, WILDCARD};
pub use native::{EventSink, NativeBridge, Responder};
pub use operation::{CallMode, NativeArg, OperationId};
pub use registry::{HandlerRegistry, RegistryStats};
pub use sdk::ImBridge;
pub use state::{BindingState, StateMachine};
pub use version::{BUILD_TIME, GIT_SHA, SDK_VERSION};
