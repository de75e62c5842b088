//! imbridge FFI - Foreign Function Interface for the imbridge binding core
//!
//! This crate exposes the binding core to host languages through UniFFI
//! (Kotlin, Swift, Python). The host owns the native IM library:
//! - calls go out through the `NativeCaller` callback interface
//! - native callbacks come back through `BridgeHandle::deliver_*`
//! - events reach host listeners through the `EventListener` callback interface

#![allow(clippy::new_without_default)]

mod bridge;
mod callbacks;
mod error;
mod types;

pub use bridge::BridgeHandle;
pub use callbacks::{EventListener, NativeCaller, ProgressObserver};
pub use error::BridgeFfiError;
pub use types::{
    CallResponse, FfiArg, FfiBindingState, FfiBridgeConfig, FfiInitConfig, FfiListenerKind,
    ProgressEvent,
};

// Setup UniFFI scaffolding for proc-macro mode
uniffi::setup_scaffolding!();

/// Get SDK version string（来自 imbridge-sdk version.rs，单一来源）
#[uniffi::export]
pub fn sdk_version() -> String {
    imbridge_sdk::version::SDK_VERSION.to_string()
}

/// Get git commit SHA（用于日志、debug、上报）
#[uniffi::export]
pub fn git_sha() -> String {
    imbridge_sdk::version::GIT_SHA.to_string()
}

/// Get build timestamp（用于日志、debug、上报）
#[uniffi::export]
pub fn build_time() -> String {
    imbridge_sdk::version::BUILD_TIME.to_string()
}

/// 安装日志订阅器，`level` 与原生 SDK 的 logLevel 一致（1..=6）
///
/// 已安装过订阅器时返回 `false`；`RUST_LOG` 优先。
#[uniffi::export]
pub fn init_logging(level: u32) -> bool {
    imbridge_sdk::config::install_tracing(imbridge_sdk::config::native_log_level(level))
}
