//! Error types for FFI layer
//!
//! 原生失败保留原生 errCode；其余错误带本地错误码（负数）。

use imbridge_sdk::error::codes;
use imbridge_sdk::BridgeError;

/// Main error type for FFI operations
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum BridgeFfiError {
    /// 原生回调报告 errCode != 0
    #[error("Native call failed: [{err_code}] {err_msg} (operation {operation_id})")]
    NativeCall {
        operation_id: String,
        err_code: i32,
        err_msg: String,
    },

    #[error("SDK not initialized")]
    NotInitialized,

    #[error("SDK has been torn down")]
    TornDown,

    #[error("Operation {operation_id} timed out after {timeout_ms}ms")]
    Timeout { operation_id: String, timeout_ms: u64 },

    #[error("Duplicate operation id: {operation_id}")]
    DuplicateOperationId { operation_id: String },

    #[error("Operation {operation_id} was canceled")]
    Canceled { operation_id: String },

    #[error("Invalid parameter: {msg}")]
    InvalidParameter { msg: String },

    #[error("Generic error: {msg} (code: {code})")]
    Generic { msg: String, code: i32 },
}

impl BridgeFfiError {
    pub fn generic<T: std::fmt::Display>(msg: T, code: i32) -> Self {
        let msg = msg.to_string();
        tracing::error!("Generic error: {} (code: {})", msg, code);
        Self::Generic { msg, code }
    }

    pub fn invalid_parameter<T: std::fmt::Display>(msg: T) -> Self {
        let msg = msg.to_string();
        tracing::error!("Invalid parameter: {}", msg);
        Self::InvalidParameter { msg }
    }

    /// 与 `BridgeError::err_code` 一致的错误码
    pub fn err_code(&self) -> i32 {
        match self {
            Self::NativeCall { err_code, .. } => *err_code,
            Self::NotInitialized => codes::NOT_INITIALIZED,
            Self::TornDown => codes::TORN_DOWN,
            Self::Timeout { .. } => codes::TIMEOUT,
            Self::DuplicateOperationId { .. } => codes::DUPLICATE_OPERATION_ID,
            Self::Canceled { .. } => codes::CANCELED,
            Self::InvalidParameter { .. } => codes::INVALID_ARGUMENT,
            Self::Generic { code, .. } => *code,
        }
    }
}

/// 保证错误文案非空，避免宿主侧显示空白
fn ensure_non_empty(s: String, fallback: &'static str) -> String {
    if s.trim().is_empty() {
        fallback.to_string()
    } else {
        s
    }
}

impl From<BridgeError> for BridgeFfiError {
    fn from(error: BridgeError) -> Self {
        let code = error.err_code();
        match error {
            BridgeError::NativeCallFailed { response } => {
                tracing::debug!("native call failed: {}", response);
                Self::NativeCall {
                    operation_id: response.operation_id.into_string(),
                    err_code: response.err_code,
                    err_msg: ensure_non_empty(response.err_msg, "native error"),
                }
            }
            BridgeError::NotInitialized => Self::NotInitialized,
            BridgeError::TornDown => Self::TornDown,
            BridgeError::Timeout { operation_id, timeout } => Self::Timeout {
                operation_id: operation_id.into_string(),
                timeout_ms: timeout.as_millis() as u64,
            },
            BridgeError::DuplicateOperationId(operation_id) => Self::DuplicateOperationId {
                operation_id: operation_id.into_string(),
            },
            BridgeError::Canceled(operation_id) => Self::Canceled {
                operation_id: operation_id.into_string(),
            },
            BridgeError::InvalidArgument(msg) => Self::invalid_parameter(msg),
            other => Self::generic(other, code),
        }
    }
}
