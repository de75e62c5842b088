//! 配置
//!
//! - `InitConfig`：交给原生 `init_sdk` 的 JSON 配置
//! - `BridgeConfig`：bridge 自身的行为参数（超时、同步调用豁免、事件缓冲等）

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::error::{BridgeError, Result};
use crate::event_code::ListenerKind;

/// 原生 SDK 初始化配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitConfig {
    /// HTTP API 地址
    pub api_addr: String,
    /// WebSocket 地址
    pub ws_addr: String,
    /// 日志级别，1..=6，数值越大越详细
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<u32>,
    /// 平台 ID（1 iOS，2 Android，3 Windows，4 macOS，5 Web，7 Linux ...）
    #[serde(rename = "platformID")]
    pub platform_id: i32,
    /// 数据目录
    pub data_dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_log_standard_output: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_external_extensions: Option<bool>,
    /// 宿主系统类型（如 "electron"、"uniapp"）
    pub system_type: String,
}

impl InitConfig {
    pub fn new<S: Into<String>>(api_addr: S, ws_addr: S, platform_id: i32, data_dir: S) -> Self {
        Self {
            api_addr: api_addr.into(),
            ws_addr: ws_addr.into(),
            log_level: None,
            platform_id,
            data_dir: data_dir.into(),
            log_file_path: None,
            is_log_standard_output: None,
            is_external_extensions: None,
            system_type: "rust".to_string(),
        }
    }

    pub fn with_log_level(mut self, level: u32) -> Self {
        self.log_level = Some(level);
        self
    }

    pub fn with_log_file<S: Into<String>>(mut self, path: S) -> Self {
        self.log_file_path = Some(path.into());
        self
    }

    pub fn with_system_type<S: Into<String>>(mut self, system_type: S) -> Self {
        self.system_type = system_type.into();
        self
    }

    /// 原生侧要求的 JSON 字符串
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// 基本校验：地址与数据目录不能为空
    pub fn validate(&self) -> Result<()> {
        if self.api_addr.trim().is_empty() {
            return Err(BridgeError::InvalidArgument("apiAddr is empty".into()));
        }
        if self.ws_addr.trim().is_empty() {
            return Err(BridgeError::InvalidArgument("wsAddr is empty".into()));
        }
        if self.data_dir.trim().is_empty() {
            return Err(BridgeError::InvalidArgument("dataDir is empty".into()));
        }
        Ok(())
    }

    /// 原生日志级别对应的 tracing 级别
    pub fn tracing_level(&self) -> Level {
        self.log_level.map_or(Level::INFO, native_log_level)
    }
}

/// 原生数值日志级别映射到 tracing 级别
///
/// 6 = debug，5 = info，4 = warn，3 及以下 = error，大于 6 = trace。
pub fn native_log_level(level: u32) -> Level {
    match level {
        0..=3 => Level::ERROR,
        4 => Level::WARN,
        5 => Level::INFO,
        6 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// 安装全局 tracing subscriber
///
/// `RUST_LOG` 优先于传入的级别。重复安装返回 false。
pub fn install_tracing(level: Level) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

/// bridge 行为配置
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// 单次调用的最长等待时间；`None` 表示不限
    ///
    /// 进度模式下按空闲计时：每次进度通知都会重新开始计时。
    pub call_timeout: Option<Duration>,
    /// 同步调用返回空结果时不视为错误的调用名
    pub sync_exempt: Vec<String>,
    /// 事件广播通道容量
    pub event_buffer: usize,
    /// 初始化时安装的监听子系统
    pub listeners: Vec<ListenerKind>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            call_timeout: Some(Duration::from_secs(60)),
            sync_exempt: vec!["un_init_sdk".to_string()],
            event_buffer: 1000,
            listeners: ListenerKind::ALL.to_vec(),
        }
    }
}

impl BridgeConfig {
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::new()
    }
}

pub struct BridgeConfigBuilder {
    config: BridgeConfig,
}

impl BridgeConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: BridgeConfig::default(),
        }
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout = Some(timeout);
        self
    }

    /// 关闭调用超时
    pub fn no_call_timeout(mut self) -> Self {
        self.config.call_timeout = None;
        self
    }

    /// 追加同步调用豁免
    pub fn sync_exempt<S: Into<String>>(mut self, name: S) -> Self {
        let name = name.into();
        if !self.config.sync_exempt.contains(&name) {
            self.config.sync_exempt.push(name);
        }
        self
    }

    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.config.event_buffer = capacity;
        self
    }

    /// 设置要安装的监听子系统
    pub fn listeners<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = ListenerKind>,
    {
        self.config.listeners = kinds.into_iter().collect();
        self
    }

    pub fn build(self) -> BridgeConfig {
        self.config
    }
}

impl Default for BridgeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
