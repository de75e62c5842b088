//! 调用标识与参数模型
//!
//! - `OperationId`：一次原生调用与其回调之间的关联键
//! - `CallMode`：一次性回调 / 带进度回调
//! - `NativeArg`：按位置传给原生入口的参数

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::Result;

/// 操作 ID（operationID）
///
/// 由调用方在发起原生调用之前生成，原生回调会原样带回。
/// 在该操作未完成之前必须唯一。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    /// 生成新的操作 ID（UUID v4）
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OperationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for OperationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for OperationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// 回调模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallMode {
    /// 只接收一次终结回调（resolve 或 reject）
    OneShot,
    /// 终结回调之前可以收到任意次进度通知（上传/发送进度）
    Progress,
}

impl fmt::Display for CallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallMode::OneShot => write!(f, "one-shot"),
            CallMode::Progress => write!(f, "progress"),
        }
    }
}

/// 原生入口的位置参数
///
/// 原生库只接受字符串、32/64 位整数和双精度浮点；对象类参数统一序列化为 JSON 字符串。
/// `Bool` 由具体的 bridge 以 0/1 整数传递。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NativeArg {
    Str(String),
    Int(i32),
    Long(i64),
    Double(f64),
    Bool(bool),
}

impl NativeArg {
    /// 将任意可序列化的值编码为 JSON 字符串参数
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(NativeArg::Str(serde_json::to_string(value)?))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            NativeArg::Str(s) => Some(s),
            _ => None,
        }
    }

    /// 整数视图（`Bool` 视为 0/1）
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            NativeArg::Int(v) => Some(i64::from(*v)),
            NativeArg::Long(v) => Some(*v),
            NativeArg::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NativeArg::Double(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<&str> for NativeArg {
    fn from(value: &str) -> Self {
        NativeArg::Str(value.to_string())
    }
}

impl From<String> for NativeArg {
    fn from(value: String) -> Self {
        NativeArg::Str(value)
    }
}

impl From<&OperationId> for NativeArg {
    fn from(value: &OperationId) -> Self {
        NativeArg::Str(value.as_str().to_string())
    }
}

impl From<i32> for NativeArg {
    fn from(value: i32) -> Self {
        NativeArg::Int(value)
    }
}

impl From<i64> for NativeArg {
    fn from(value: i64) -> Self {
        NativeArg::Long(value)
    }
}

impl From<f64> for NativeArg {
    fn from(value: f64) -> Self {
        NativeArg::Double(value)
    }
}

impl From<bool> for NativeArg {
    fn from(value: bool) -> Self {
        NativeArg::Bool(value)
    }
}
