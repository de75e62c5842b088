//! 宿主实现的回调接口

use crate::types::{FfiArg, FfiListenerKind, ProgressEvent};

/// 宿主侧的原生库
///
/// 宿主负责把调用转交给原生入口，原生回调再通过 `BridgeHandle::deliver_*` 送回。
/// `call` 不能阻塞到原生侧完成。
#[uniffi::export(callback_interface)]
pub trait NativeCaller: Send + Sync {
    /// 发起异步调用；返回 `false` 表示无法发起（如符号缺失）
    fn call(&self, name: String, operation_id: String, args: Vec<FfiArg>) -> bool;

    /// 同步调用，`None` 表示原生入口返回了空指针
    fn call_sync(&self, name: String, operation_id: String, args: Vec<FfiArg>) -> Option<String>;

    /// 安装某个子系统的监听回调
    fn set_listener(&self, kind: FfiListenerKind) -> bool;

    /// `init_sdk(listener, operationID, configJson)`
    fn init_sdk(&self, operation_id: String, config_json: String) -> bool;
}

/// 事件监听器
#[uniffi::export(callback_interface)]
pub trait EventListener: Send + Sync {
    fn on_event(&self, name: String, err_code: i32, err_msg: String, data_json: String);
}

/// 进度观察者回调接口
///
/// 用于跟踪发送消息、上传文件等调用的进度
#[uniffi::export(callback_interface)]
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);
}
