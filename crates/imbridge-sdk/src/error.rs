use std::time::Duration;

use crate::envelope::{Payload, ResponseEnvelope};
use crate::operation::OperationId;
use crate::state::BindingState;

/// 原生侧未给出结果时使用的未知错误码
pub const ERR_UNKNOWN: i32 = 10005;

/// 本地错误码（负数，避免与原生错误码冲突）
pub mod codes {
    pub const NOT_INITIALIZED: i32 = -1001;
    pub const TORN_DOWN: i32 = -1002;
    pub const TIMEOUT: i32 = -1003;
    pub const DUPLICATE_OPERATION_ID: i32 = -1004;
    pub const UNKNOWN_OPERATION_ID: i32 = -1005;
    pub const INVALID_STATE: i32 = -1006;
    pub const INIT_FAILED: i32 = -1007;
    pub const SERIALIZATION: i32 = -1008;
    pub const INVALID_ARGUMENT: i32 = -1009;
    pub const CANCELED: i32 = -1010;
    pub const NATIVE: i32 = -1011;
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// 原生回调报告 errCode != 0
    #[error("native call failed: {response}")]
    NativeCallFailed { response: ResponseEnvelope },

    #[error("duplicate operation id: {0}")]
    DuplicateOperationId(OperationId),

    #[error("unknown operation id: {0}")]
    UnknownOperationId(OperationId),

    #[error("SDK not initialized")]
    NotInitialized,

    #[error("SDK has been torn down")]
    TornDown,

    #[error("operation {operation_id} timed out after {timeout:?}")]
    Timeout {
        operation_id: OperationId,
        timeout: Duration,
    },

    #[error("invalid state transition: {from} -> {to}")]
    InvalidState { from: BindingState, to: BindingState },

    #[error("native init_sdk rejected the configuration")]
    InitFailed,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("operation {0} was canceled before completion")]
    Canceled(OperationId),

    /// bridge 无法发起原生调用（符号缺失、宿主拒绝等）
    #[error("native bridge error: {0}")]
    Native(String),
}

impl BridgeError {
    /// 从原生失败响应构造
    pub fn native_failure(response: ResponseEnvelope) -> Self {
        BridgeError::NativeCallFailed { response }
    }

    /// 统一错误码：原生失败使用原生 errCode，其余使用本地错误码
    pub fn err_code(&self) -> i32 {
        match self {
            BridgeError::NativeCallFailed { response } => response.err_code,
            BridgeError::DuplicateOperationId(_) => codes::DUPLICATE_OPERATION_ID,
            BridgeError::UnknownOperationId(_) => codes::UNKNOWN_OPERATION_ID,
            BridgeError::NotInitialized => codes::NOT_INITIALIZED,
            BridgeError::TornDown => codes::TORN_DOWN,
            BridgeError::Timeout { .. } => codes::TIMEOUT,
            BridgeError::InvalidState { .. } => codes::INVALID_STATE,
            BridgeError::InitFailed => codes::INIT_FAILED,
            BridgeError::Serialization(_) => codes::SERIALIZATION,
            BridgeError::InvalidArgument(_) => codes::INVALID_ARGUMENT,
            BridgeError::Canceled(_) => codes::CANCELED,
            BridgeError::Native(_) => codes::NATIVE,
        }
    }

    /// 原生失败响应（如果是原生失败）
    pub fn response(&self) -> Option<&ResponseEnvelope> {
        match self {
            BridgeError::NativeCallFailed { response } => Some(response),
            _ => None,
        }
    }

    /// 判断是否为原生失败
    pub fn is_native_failure(&self) -> bool {
        matches!(self, BridgeError::NativeCallFailed { .. })
    }

    /// 转换为与成功响应同形的结构，方便调用方统一处理
    pub fn to_response(&self, operation_id: OperationId) -> ResponseEnvelope {
        match self {
            BridgeError::NativeCallFailed { response } => response.clone(),
            other => ResponseEnvelope {
                operation_id,
                err_code: other.err_code(),
                err_msg: other.to_string(),
                data: Payload::empty(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
