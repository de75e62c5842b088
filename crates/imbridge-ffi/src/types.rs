//! FFI 记录与枚举，以及与核心类型之间的转换

use std::time::Duration;

use imbridge_sdk::{
    BindingState, BridgeConfig, InitConfig, ListenerKind, NativeArg, ProgressUpdate,
    ResponseEnvelope,
};

/// 原生入口的位置参数
#[derive(Debug, Clone, PartialEq, uniffi::Enum)]
pub enum FfiArg {
    Str { value: String },
    Int { value: i32 },
    Long { value: i64 },
    Double { value: f64 },
    Bool { value: bool },
}

impl From<FfiArg> for NativeArg {
    fn from(arg: FfiArg) -> Self {
        match arg {
            FfiArg::Str { value } => NativeArg::Str(value),
            FfiArg::Int { value } => NativeArg::Int(value),
            FfiArg::Long { value } => NativeArg::Long(value),
            FfiArg::Double { value } => NativeArg::Double(value),
            FfiArg::Bool { value } => NativeArg::Bool(value),
        }
    }
}

impl From<&NativeArg> for FfiArg {
    fn from(arg: &NativeArg) -> Self {
        match arg {
            NativeArg::Str(value) => FfiArg::Str { value: value.clone() },
            NativeArg::Int(value) => FfiArg::Int { value: *value },
            NativeArg::Long(value) => FfiArg::Long { value: *value },
            NativeArg::Double(value) => FfiArg::Double { value: *value },
            NativeArg::Bool(value) => FfiArg::Bool { value: *value },
        }
    }
}

/// 调用结果，`data_json` 为原生 data 的字符串形式
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct CallResponse {
    pub operation_id: String,
    pub err_code: i32,
    pub err_msg: String,
    pub data_json: String,
}

impl From<ResponseEnvelope> for CallResponse {
    fn from(response: ResponseEnvelope) -> Self {
        Self {
            data_json: response.data.to_json_string(),
            operation_id: response.operation_id.into_string(),
            err_code: response.err_code,
            err_msg: response.err_msg,
        }
    }
}

/// 进度通知
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct ProgressEvent {
    pub operation_id: String,
    pub progress: i32,
    pub data_json: String,
}

impl From<ProgressUpdate> for ProgressEvent {
    fn from(update: ProgressUpdate) -> Self {
        Self {
            operation_id: update.operation_id.into_string(),
            progress: update.progress,
            data_json: update.data.to_json_string(),
        }
    }
}

/// 原生 SDK 初始化配置
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiInitConfig {
    pub api_addr: String,
    pub ws_addr: String,
    pub platform_id: i32,
    pub data_dir: String,
    pub log_level: Option<u32>,
    pub log_file_path: Option<String>,
    /// 为空时使用默认值
    pub system_type: Option<String>,
}

impl From<FfiInitConfig> for InitConfig {
    fn from(config: FfiInitConfig) -> Self {
        let mut init = InitConfig::new(config.api_addr, config.ws_addr, config.platform_id, config.data_dir);
        if let Some(level) = config.log_level {
            init = init.with_log_level(level);
        }
        if let Some(path) = config.log_file_path {
            init = init.with_log_file(path);
        }
        if let Some(system_type) = config.system_type.filter(|s| !s.is_empty()) {
            init = init.with_system_type(system_type);
        }
        init
    }
}

/// bridge 行为配置
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBridgeConfig {
    /// 调用超时（毫秒），`None` 或 0 表示不限
    pub call_timeout_ms: Option<u64>,
    /// 额外的同步调用豁免
    pub sync_exempt: Vec<String>,
    pub event_buffer: Option<u32>,
    /// 为空时安装全部监听子系统
    pub listeners: Vec<FfiListenerKind>,
}

impl From<FfiBridgeConfig> for BridgeConfig {
    fn from(config: FfiBridgeConfig) -> Self {
        let mut builder = BridgeConfig::builder();
        builder = match config.call_timeout_ms {
            Some(0) | None => builder.no_call_timeout(),
            Some(ms) => builder.call_timeout(Duration::from_millis(ms)),
        };
        for name in config.sync_exempt {
            builder = builder.sync_exempt(name);
        }
        if let Some(capacity) = config.event_buffer {
            builder = builder.event_buffer(capacity.max(1) as usize);
        }
        if !config.listeners.is_empty() {
            builder = builder.listeners(config.listeners.into_iter().map(ListenerKind::from));
        }
        builder.build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiBindingState {
    Uninitialized,
    Initializing,
    Listening,
    Ready,
    TornDown,
}

impl From<BindingState> for FfiBindingState {
    fn from(state: BindingState) -> Self {
        match state {
            BindingState::Uninitialized => FfiBindingState::Uninitialized,
            BindingState::Initializing => FfiBindingState::Initializing,
            BindingState::Listening => FfiBindingState::Listening,
            BindingState::Ready => FfiBindingState::Ready,
            BindingState::TornDown => FfiBindingState::TornDown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiListenerKind {
    User,
    Friend,
    Group,
    Conversation,
    AdvancedMsg,
    BatchMsg,
    CustomBusiness,
    Signaling,
}

impl From<FfiListenerKind> for ListenerKind {
    fn from(kind: FfiListenerKind) -> Self {
        match kind {
            FfiListenerKind::User => ListenerKind::User,
            FfiListenerKind::Friend => ListenerKind::Friend,
            FfiListenerKind::Group => ListenerKind::Group,
            FfiListenerKind::Conversation => ListenerKind::Conversation,
            FfiListenerKind::AdvancedMsg => ListenerKind::AdvancedMsg,
            FfiListenerKind::BatchMsg => ListenerKind::BatchMsg,
            FfiListenerKind::CustomBusiness => ListenerKind::CustomBusiness,
            FfiListenerKind::Signaling => ListenerKind::Signaling,
        }
    }
}

impl From<ListenerKind> for FfiListenerKind {
    fn from(kind: ListenerKind) -> Self {
        match kind {
            ListenerKind::User => FfiListenerKind::User,
            ListenerKind::Friend => FfiListenerKind::Friend,
            ListenerKind::Group => FfiListenerKind::Group,
            ListenerKind::Conversation => FfiListenerKind::Conversation,
            ListenerKind::AdvancedMsg => FfiListenerKind::AdvancedMsg,
            ListenerKind::BatchMsg => FfiListenerKind::BatchMsg,
            ListenerKind::CustomBusiness => FfiListenerKind::CustomBusiness,
            ListenerKind::Signaling => FfiListenerKind::Signaling,
        }
    }
}
