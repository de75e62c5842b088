//! C ABI 回调蹦床
//!
//! 原生库只接受 C 函数指针作为回调。这里提供三种回调形态的 `extern "C"` 实现，
//! 它们把参数解码后转给当前挂接的分发器（`Responder` + `EventSink`）。
//!
//! - `(int event, const char* data)`：监听回调
//! - `(const char* opid, int errCode, const char* errMsg, const char* data)`：调用回调
//! - `(..., int progress)`：带进度的调用回调
//!
//! 蹦床永远不会向 C 侧展开 panic；空指针按空字符串处理，非法 UTF-8 有损解码。
//! 进程内同一时刻只有一个分发器，后挂接的生效。

use parking_lot::RwLock;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use tracing::{error, info, warn};

use crate::native::{EventSink, Responder};

/// `CB_I_S`
pub type ListenerCallback = unsafe extern "C" fn(event: c_int, data: *const c_char);

/// `CB_S_I_S_S`
pub type ResponseCallback = unsafe extern "C" fn(
    operation_id: *const c_char,
    err_code: c_int,
    err_msg: *const c_char,
    data: *const c_char,
);

/// `CB_S_I_S_S_I`
pub type ProgressCallback = unsafe extern "C" fn(
    operation_id: *const c_char,
    err_code: c_int,
    err_msg: *const c_char,
    data: *const c_char,
    progress: c_int,
);

struct Dispatcher {
    id: u64,
    responder: Responder,
    sink: EventSink,
}

/// 挂接凭证，`detach` 时只会移除自己挂接的分发器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachToken(u64);

static DISPATCHER: OnceLock<RwLock<Option<Dispatcher>>> = OnceLock::new();
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

fn slot() -> &'static RwLock<Option<Dispatcher>> {
    DISPATCHER.get_or_init(|| RwLock::new(None))
}

/// 挂接分发器，替换之前的分发器
pub fn attach(responder: Responder, sink: EventSink) -> AttachToken {
    let id = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
    let previous = slot().write().replace(Dispatcher {
        id,
        responder,
        sink,
    });
    if let Some(previous) = previous {
        warn!("C ABI dispatcher #{} replaced by #{}", previous.id, id);
    } else {
        info!("C ABI dispatcher #{} attached", id);
    }
    AttachToken(id)
}

/// 移除分发器；已被其它分发器替换时不做任何事
pub fn detach(token: AttachToken) -> bool {
    let mut slot = slot().write();
    if slot.as_ref().map(|d| d.id) == Some(token.0) {
        *slot = None;
        info!("C ABI dispatcher #{} detached", token.0);
        true
    } else {
        false
    }
}

pub fn is_attached() -> bool {
    slot().read().is_some()
}

/// 监听回调指针，交给原生 `set_*_listener` / `init_sdk`
pub fn listener_callback() -> ListenerCallback {
    imbridge_listener_callback
}

/// 调用回调指针
pub fn response_callback() -> ResponseCallback {
    imbridge_response_callback
}

/// 带进度的调用回调指针
pub fn progress_callback() -> ProgressCallback {
    imbridge_progress_callback
}

/// 监听回调 `(event, data)`
///
/// # Safety
///
/// `data` 必须为空指针或指向以 NUL 结尾的字符串，且在调用期间有效。
pub unsafe extern "C" fn imbridge_listener_callback(event: c_int, data: *const c_char) {
    boundary("listener", || {
        let data = decode(data);
        let sink = slot().read().as_ref().map(|d| d.sink.clone());
        match sink {
            Some(sink) => {
                sink.emit(event, &data);
            }
            None => warn!("native event {} arrived with no dispatcher attached", event),
        }
    });
}

/// 调用回调 `(operationID, errCode, errMsg, data)`
///
/// # Safety
///
/// 所有指针必须为空指针或指向以 NUL 结尾的字符串，且在调用期间有效。
pub unsafe extern "C" fn imbridge_response_callback(
    operation_id: *const c_char,
    err_code: c_int,
    err_msg: *const c_char,
    data: *const c_char,
) {
    boundary("response", || {
        let (operation_id, err_msg, data) = (decode(operation_id), decode(err_msg), decode(data));
        match responder() {
            Some(responder) => {
                responder.respond(&operation_id, err_code, &err_msg, &data);
            }
            None => warn!("response for {} arrived with no dispatcher attached", operation_id),
        }
    });
}

/// 带进度的调用回调 `(operationID, errCode, errMsg, data, progress)`
///
/// # Safety
///
/// 所有指针必须为空指针或指向以 NUL 结尾的字符串，且在调用期间有效。
pub unsafe extern "C" fn imbridge_progress_callback(
    operation_id: *const c_char,
    err_code: c_int,
    err_msg: *const c_char,
    data: *const c_char,
    progress: c_int,
) {
    boundary("progress", || {
        let (operation_id, err_msg, data) = (decode(operation_id), decode(err_msg), decode(data));
        match responder() {
            Some(responder) => {
                responder.respond_with_progress(&operation_id, err_code, &err_msg, &data, progress);
            }
            None => warn!("progress for {} arrived with no dispatcher attached", operation_id),
        }
    });
}

fn responder() -> Option<Responder> {
    slot().read().as_ref().map(|d| d.responder.clone())
}

fn boundary<F: FnOnce()>(kind: &str, f: F) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        error!("panic caught at C ABI {} callback", kind);
    }
}

unsafe fn decode(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

#[cfg(test)]
pub(crate) static TEST_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());
