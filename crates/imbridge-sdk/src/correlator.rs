//! 调用关联器
//!
//! 把“带回调指针的原生调用”变成可 await 的结果：
//!
//! 1. 生成（或接收）operationID
//! 2. 把一对 resolve/reject 回调连到 oneshot 通道，进度模式下再连一个进度通道
//! 3. 在注册表中登记挂起条目
//! 4. 发起原生调用，把 `Responder` 交给原生侧
//! 5. 立即返回 `PendingCall`
//!
//! 同步原生入口走 `invoke_sync`，直接把返回值包装成响应信封。

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::BridgeConfig;
use crate::envelope::{Payload, ProgressUpdate, ResponseEnvelope};
use crate::error::{BridgeError, Result, ERR_UNKNOWN};
use crate::native::{NativeBridge, Responder};
use crate::operation::{CallMode, NativeArg, OperationId};
use crate::registry::{HandlerRegistry, ProgressFn};

type Completion = Arc<Mutex<Option<oneshot::Sender<Result<ResponseEnvelope>>>>>;

/// 调用关联器
pub struct CallCorrelator {
    registry: Arc<HandlerRegistry>,
    native: Arc<dyn NativeBridge>,
    call_timeout: Option<Duration>,
    sync_exempt: HashSet<String>,
}

impl CallCorrelator {
    pub fn new(native: Arc<dyn NativeBridge>, config: &BridgeConfig) -> Self {
        Self::with_registry(native, Arc::new(HandlerRegistry::new()), config)
    }

    pub fn with_registry(
        native: Arc<dyn NativeBridge>,
        registry: Arc<HandlerRegistry>,
        config: &BridgeConfig,
    ) -> Self {
        Self {
            registry,
            native,
            call_timeout: config.call_timeout,
            sync_exempt: config.sync_exempt.iter().cloned().collect(),
        }
    }

    /// 以新生成的 operationID 发起异步调用
    pub fn invoke(&self, name: &str, args: &[NativeArg], mode: CallMode) -> Result<PendingCall> {
        self.invoke_with_id(name, OperationId::generate(), args, mode)
    }

    /// 以调用方提供的 operationID 发起异步调用
    pub fn invoke_with_id(
        &self,
        name: &str,
        operation_id: OperationId,
        args: &[NativeArg],
        mode: CallMode,
    ) -> Result<PendingCall> {
        let (tx, rx) = oneshot::channel();
        let completion: Completion = Arc::new(Mutex::new(Some(tx)));

        let on_resolve = {
            let completion = completion.clone();
            Box::new(move |response: ResponseEnvelope| complete(&completion, Ok(response)))
        };
        let on_reject = Box::new(move |error: BridgeError| complete(&completion, Err(error)));

        let (progress_fn, progress_rx) = match mode {
            CallMode::Progress => {
                let (ptx, prx) = mpsc::unbounded_channel();
                let f: ProgressFn = Arc::new(move |update: ProgressUpdate| {
                    // 接收端已放弃时忽略
                    let _ = ptx.send(update);
                });
                (Some(f), Some(prx))
            }
            CallMode::OneShot => (None, None),
        };

        self.registry
            .register(operation_id.clone(), mode, on_resolve, on_reject, progress_fn)?;

        debug!("invoke {} [{}] ({}, {} args)", name, operation_id, mode, args.len());
        if let Err(e) = self.native.call(name, &operation_id, args, self.responder()) {
            self.registry.remove(&operation_id);
            warn!("native call {} [{}] failed to issue: {}", name, operation_id, e);
            return Err(e);
        }

        Ok(PendingCall {
            operation_id,
            receiver: rx,
            progress: progress_rx,
            registry: self.registry.clone(),
            timeout: self.call_timeout,
            finished: false,
        })
    }

    /// 同步调用
    pub fn invoke_sync(&self, name: &str, args: &[NativeArg]) -> Result<ResponseEnvelope> {
        self.invoke_sync_with_id(name, OperationId::generate(), args)
    }

    /// 同步调用：空结果视为未知错误，豁免列表中的调用除外
    pub fn invoke_sync_with_id(
        &self,
        name: &str,
        operation_id: OperationId,
        args: &[NativeArg],
    ) -> Result<ResponseEnvelope> {
        debug!("invoke_sync {} [{}] ({} args)", name, operation_id, args.len());
        let raw = self.native.call_sync(name, &operation_id, args)?;
        match raw.filter(|s| !s.is_empty()) {
            Some(data) => Ok(ResponseEnvelope::success(operation_id, Payload::decode(&data))),
            None if self.is_sync_exempt(name) => {
                Ok(ResponseEnvelope::success(operation_id, Payload::empty()))
            }
            None => {
                warn!("native {} [{}] returned no result", name, operation_id);
                Err(BridgeError::native_failure(ResponseEnvelope::failure(
                    operation_id,
                    ERR_UNKNOWN,
                    "UnknownError",
                )))
            }
        }
    }

    pub fn is_sync_exempt(&self, name: &str) -> bool {
        self.sync_exempt.contains(name)
    }

    /// 原生回调入口
    pub fn responder(&self) -> Responder {
        Responder::new(self.registry.clone())
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn native(&self) -> &Arc<dyn NativeBridge> {
        &self.native
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    pub fn pending_count(&self) -> usize {
        self.registry.len()
    }
}

fn complete(completion: &Completion, result: Result<ResponseEnvelope>) {
    if let Some(tx) = completion.lock().take() {
        // 调用方已放弃等待时结果直接丢弃
        let _ = tx.send(result);
    }
}

/// 一次尚未完成的原生调用
///
/// `await` 得到终结结果。未完成时被 drop 会移除对应的挂起条目，
/// 之后到达的回调按未知 operationID 处理。
pub struct PendingCall {
    operation_id: OperationId,
    receiver: oneshot::Receiver<Result<ResponseEnvelope>>,
    progress: Option<mpsc::UnboundedReceiver<ProgressUpdate>>,
    registry: Arc<HandlerRegistry>,
    timeout: Option<Duration>,
    finished: bool,
}

impl PendingCall {
    pub fn operation_id(&self) -> &OperationId {
        &self.operation_id
    }

    /// 取出进度通道（仅进度模式）
    ///
    /// 通道在终结回调之后关闭，因此不会在结果之后再收到进度。
    pub fn take_progress(&mut self) -> Option<mpsc::UnboundedReceiver<ProgressUpdate>> {
        self.progress.take()
    }

    /// 覆盖本次调用的超时
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// 非阻塞地检查结果
    pub fn try_result(&mut self) -> Option<Result<ResponseEnvelope>> {
        match self.receiver.try_recv() {
            Ok(result) => {
                self.finished = true;
                Some(result)
            }
            Err(_) => None,
        }
    }

    /// 等待终结结果
    pub async fn wait(self) -> Result<ResponseEnvelope> {
        self.wait_with_progress(|_| {}).await
    }

    /// 等待终结结果，期间把进度交给 `on_progress`
    ///
    /// 一次性调用的超时从开始等待时算起；进度模式下是空闲超时，每次进度通知重新计时。
    /// 不在 tokio 运行时中等待时不计时。
    pub async fn wait_with_progress<F>(mut self, mut on_progress: F) -> Result<ResponseEnvelope>
    where
        F: FnMut(ProgressUpdate) + Send,
    {
        let mut progress = self.progress.take();
        let limit = match self.timeout {
            Some(limit) if tokio::runtime::Handle::try_current().is_err() => {
                warn!(
                    "operation {} awaited outside a tokio runtime, {:?} timeout disabled",
                    self.operation_id, limit
                );
                None
            }
            other => other,
        };

        let outcome = match limit {
            Some(limit) => {
                let deadline = tokio::time::sleep(limit);
                tokio::pin!(deadline);
                loop {
                    tokio::select! {
                        // 先排空进度，保证进度先于结果
                        biased;
                        update = next_progress(&mut progress), if progress.is_some() => match update {
                            Some(update) => {
                                on_progress(update);
                                deadline.as_mut().reset(Instant::now() + limit);
                            }
                            None => progress = None,
                        },
                        result = &mut self.receiver => {
                            break result
                                .unwrap_or_else(|_| Err(BridgeError::Canceled(self.operation_id.clone())));
                        }
                        _ = &mut deadline => break self.expire(limit),
                    }
                }
            }
            None => drive(&self.operation_id, &mut self.receiver, progress, &mut on_progress).await,
        };
        self.finished = true;
        outcome
    }

    fn expire(&mut self, limit: Duration) -> Result<ResponseEnvelope> {
        self.registry.remove(&self.operation_id);
        // 超时与终结回调竞争时以已到达的结果为准
        if let Ok(result) = self.receiver.try_recv() {
            return result;
        }
        warn!("operation {} timed out after {:?}", self.operation_id, limit);
        Err(BridgeError::Timeout {
            operation_id: self.operation_id.clone(),
            timeout: limit,
        })
    }
}

async fn next_progress(
    progress: &mut Option<mpsc::UnboundedReceiver<ProgressUpdate>>,
) -> Option<ProgressUpdate> {
    match progress {
        Some(rx) => rx.recv().await,
        None => None,
    }
}

async fn drive<F>(
    operation_id: &OperationId,
    receiver: &mut oneshot::Receiver<Result<ResponseEnvelope>>,
    progress: Option<mpsc::UnboundedReceiver<ProgressUpdate>>,
    on_progress: &mut F,
) -> Result<ResponseEnvelope>
where
    F: FnMut(ProgressUpdate),
{
    if let Some(mut rx) = progress {
        while let Some(update) = rx.recv().await {
            on_progress(update);
        }
    }
    match receiver.await {
        Ok(result) => result,
        Err(_) => Err(BridgeError::Canceled(operation_id.clone())),
    }
}

impl IntoFuture for PendingCall {
    type Output = Result<ResponseEnvelope>;
    type IntoFuture = BoxFuture<'static, Result<ResponseEnvelope>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if matches!(self.receiver.try_recv(), Err(oneshot::error::TryRecvError::Empty))
            && self.registry.remove(&self.operation_id)
        {
            debug!("operation {} abandoned by caller", self.operation_id);
        }
    }
}

impl std::fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCall")
            .field("operation_id", &self.operation_id)
            .field("timeout", &self.timeout)
            .field("finished", &self.finished)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::LoopbackBridge;

    fn correlator(native: Arc<LoopbackBridge>, timeout: Option<Duration>) -> CallCorrelator {
        let mut config = BridgeConfig::default();
        config.call_timeout = timeout;
        CallCorrelator::new(native, &config)
    }

    #[tokio::test]
    async fn test_invoke_registers_then_issues() {
        let native = Arc::new(LoopbackBridge::new());
        let correlator = correlator(native.clone(), None);

        let call = correlator
            .invoke("get_total_unread_msg_count", &[], CallMode::OneShot)
            .unwrap();
        let op = call.operation_id().clone();
        assert!(correlator.registry().contains(&op));

        let recorded = native.last_call().unwrap();
        assert_eq!(recorded.name, "get_total_unread_msg_count");
        assert_eq!(recorded.operation_id, op);

        native.respond(&op, 0, "", "7");
        let response = call.await.unwrap();
        assert_eq!(response.data, Payload::Json(serde_json::json!(7)));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_issue_failure_removes_entry() {
        let native = Arc::new(LoopbackBridge::new());
        native.fail_issue("missing_symbol");
        let correlator = correlator(native, None);

        let err = correlator
            .invoke("missing_symbol", &[], CallMode::OneShot)
            .unwrap_err();
        assert!(matches!(err, BridgeError::Native(_)));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_caller_id_fails_before_native_call() {
        let native = Arc::new(LoopbackBridge::new());
        let correlator = correlator(native.clone(), None);

        let _first = correlator
            .invoke_with_id("logout", "fixed".into(), &[], CallMode::OneShot)
            .unwrap();
        let err = correlator
            .invoke_with_id("logout", "fixed".into(), &[], CallMode::OneShot)
            .unwrap_err();
        assert!(matches!(err, BridgeError::DuplicateOperationId(_)));
        assert_eq!(native.calls().len(), 1);
    }

    #[test]
    fn test_sync_empty_result_convention() {
        let native = Arc::new(LoopbackBridge::new());
        let correlator = correlator(native.clone(), None);

        native.set_sync_result("get_at_all_tag", Some("AtAllTag"));
        let ok = correlator.invoke_sync("get_at_all_tag", &[]).unwrap();
        assert_eq!(ok.data, Payload::Raw("AtAllTag".into()));

        native.set_sync_result("get_login_user", None);
        let err = correlator.invoke_sync("get_login_user", &[]).unwrap_err();
        assert_eq!(err.err_code(), ERR_UNKNOWN);

        native.set_sync_result("un_init_sdk", Some(""));
        let exempt = correlator.invoke_sync("un_init_sdk", &[]).unwrap();
        assert!(exempt.is_success());
        assert!(exempt.data.is_empty());
    }

    #[tokio::test]
    async fn test_try_result_and_drop_cleanup() {
        let native = Arc::new(LoopbackBridge::new());
        let correlator = correlator(native.clone(), None);

        let mut call = correlator.invoke("logout", &[], CallMode::OneShot).unwrap();
        assert!(call.try_result().is_none());
        let op = call.operation_id().clone();
        drop(call);
        assert_eq!(correlator.pending_count(), 0);
        assert!(!native.respond(&op, 0, "", ""));
    }

    #[test]
    fn test_pending_until_native_responds() {
        let native = Arc::new(LoopbackBridge::new());
        let correlator = correlator(native.clone(), None);

        let call = correlator.invoke("logout", &[], CallMode::OneShot).unwrap();
        let op = call.operation_id().clone();
        let mut waiting = tokio_test::task::spawn(call.wait());
        tokio_test::assert_pending!(waiting.poll());

        native.respond(&op, 0, "", "");
        assert!(waiting.is_woken());
        let response = tokio_test::assert_ready_ok!(waiting.poll());
        assert_eq!(response.operation_id, op);
    }

    #[test]
    fn test_wait_outside_runtime_skips_timer() {
        let native = Arc::new(LoopbackBridge::new());
        let correlator = correlator(native.clone(), Some(Duration::from_secs(5)));

        let call = correlator.invoke("logout", &[], CallMode::OneShot).unwrap();
        let op = call.operation_id().clone();
        let responder = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            native.respond(&op, 0, "", "")
        });

        let response = futures::executor::block_on(call.wait()).unwrap();
        assert!(response.is_success());
        assert!(responder.join().unwrap());
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_removes_entry() {
        let native = Arc::new(LoopbackBridge::new());
        let correlator = correlator(native.clone(), Some(Duration::from_secs(5)));

        let call = correlator.invoke("login", &[], CallMode::OneShot).unwrap();
        let op = call.operation_id().clone();
        let err = call.await.unwrap_err();
        assert!(matches!(err, BridgeError::Timeout { ref operation_id, .. } if operation_id == &op));
        assert_eq!(correlator.pending_count(), 0);
        assert!(!native.respond(&op, 0, "", "{}"));
    }
}
