//! 原生回调载荷的解码
//!
//! 原生侧所有数据都以字符串交付。解码规则只有一条：尽量按 JSON 解析，
//! 解析失败时原样保留字符串。解析失败本身永远不是错误。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{trace, warn};

use crate::error::{Result, ERR_UNKNOWN};
use crate::operation::OperationId;

/// 解码后的载荷
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// 合法 JSON
    Json(Value),
    /// 非 JSON，原始字符串（包括空字符串）
    Raw(String),
}

impl Payload {
    /// 尝试 JSON 解码，失败则回退为原始字符串
    pub fn decode(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Payload::Json(value),
            Err(e) => {
                trace!("payload is not JSON, passing through raw ({} bytes): {}", raw.len(), e);
                Payload::Raw(raw.to_string())
            }
        }
    }

    pub fn empty() -> Self {
        Payload::Raw(String::new())
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(v) => Some(v),
            Payload::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&str> {
        match self {
            Payload::Raw(s) => Some(s),
            Payload::Json(_) => None,
        }
    }

    /// 空字符串或 JSON null
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Raw(s) => s.is_empty(),
            Payload::Json(v) => v.is_null(),
        }
    }

    /// 反序列化为具体类型；原始字符串按 JSON 字符串处理
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        let value = match self {
            Payload::Json(v) => v.clone(),
            Payload::Raw(s) => Value::String(s.clone()),
        };
        Ok(serde_json::from_value(value)?)
    }

    /// 还原为可以跨边界传递的字符串
    pub fn to_json_string(&self) -> String {
        match self {
            Payload::Json(v) => v.to_string(),
            Payload::Raw(s) => s.clone(),
        }
    }
}

impl Default for Payload {
    fn default() -> Self {
        Payload::empty()
    }
}

/// 响应信封：原生回调 `(operationID, errCode, errMsg, data)` 的解码结果
///
/// `err_code == 0` 表示成功，其余均为失败。失败时 `data` 仍可能携带部分数据。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "operationID")]
    pub operation_id: OperationId,
    #[serde(rename = "errCode")]
    pub err_code: i32,
    #[serde(rename = "errMsg")]
    pub err_msg: String,
    pub data: Payload,
}

impl ResponseEnvelope {
    /// 从原生回调的原始参数构造
    pub fn from_raw(operation_id: OperationId, err_code: i32, err_msg: &str, data: &str) -> Self {
        Self {
            operation_id,
            err_code,
            err_msg: err_msg.to_string(),
            data: Payload::decode(data),
        }
    }

    pub fn success(operation_id: OperationId, data: Payload) -> Self {
        Self {
            operation_id,
            err_code: 0,
            err_msg: String::new(),
            data,
        }
    }

    pub fn failure<S: Into<String>>(operation_id: OperationId, err_code: i32, err_msg: S) -> Self {
        Self {
            operation_id,
            err_code,
            err_msg: err_msg.into(),
            data: Payload::empty(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.err_code == 0
    }

    /// 将 data 反序列化为具体类型
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T> {
        self.data.deserialize()
    }
}

impl fmt::Display for ResponseEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} (operation {})", self.err_code, self.err_msg, self.operation_id)
    }
}

/// 进度通知（发送/上传进度）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    #[serde(rename = "operationID")]
    pub operation_id: OperationId,
    pub progress: i32,
    pub data: Payload,
}

/// 路由之后交给监听器的事件
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeEvent {
    /// 符号化事件名（如 `OnRecvNewMessage`）
    pub name: String,
    /// 原生事件码；通过名称直接 emit 的事件没有事件码
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
    #[serde(rename = "errCode")]
    pub err_code: i32,
    #[serde(rename = "errMsg")]
    pub err_msg: String,
    pub data: Payload,
    /// 事件到达时间（UTC 毫秒时间戳）
    pub timestamp: i64,
}

impl BridgeEvent {
    /// 按事件载荷规则解码：若 JSON 对象携带 `errCode`，则拆出 `errCode`/`errMsg`/`data`
    pub fn decode<S: Into<String>>(name: S, code: Option<i32>, raw_payload: &str) -> Self {
        let (err_code, err_msg, data) = split_event_payload(Payload::decode(raw_payload));
        Self {
            name: name.into(),
            code,
            err_code,
            err_msg,
            data,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.err_code != 0
    }
}

fn split_event_payload(payload: Payload) -> (i32, String, Payload) {
    let Payload::Json(Value::Object(mut map)) = payload else {
        return (0, String::new(), payload);
    };
    let Some(code) = map.get("errCode").cloned() else {
        return (0, String::new(), Payload::Json(Value::Object(map)));
    };

    let err_code = match &code {
        Value::Null => Some(0),
        Value::String(s) => s.trim().parse::<i32>().ok(),
        other => other.as_i64().and_then(|c| i32::try_from(c).ok()),
    }
    .unwrap_or_else(|| {
        warn!("event errCode is not an integer: {}", code);
        ERR_UNKNOWN
    });
    let err_msg = match map.remove("errMsg") {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    // 内层 data 原样保留，字符串不再二次解码
    let data = map.remove("data").map_or_else(Payload::empty, Payload::Json);
    (err_code, err_msg, data)
}
