//! 延迟调用
//!
//! [`Deferred`] 表示一个尚未开始的异步操作，只能被启动一次，或在启动前被取消。
//! 熔断器拒绝调用时会主动取消它，保证被拒绝的调用不会产生任何副作用，
//! 同时通过取消回调释放上游资源。

use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::trace;

const UNSTARTED: u8 = 0;
const STARTED: u8 = 1;
const CANCELLED: u8 = 2;

/// 延迟调用状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredState {
    /// 尚未开始
    Unstarted,
    /// 已启动
    Started,
    /// 已取消，永远不会启动
    Cancelled,
}

impl DeferredState {
    fn from_u8(value: u8) -> Self {
        match value {
            STARTED => DeferredState::Started,
            CANCELLED => DeferredState::Cancelled,
            _ => DeferredState::Unstarted,
        }
    }
}

type Task<T, E> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T, E>> + Send>;
type CancelHook = Box<dyn FnOnce() + Send>;

/// 单次使用的延迟调用
///
/// 未启动就被丢弃时等同于取消，取消回调仍会执行。
///
/// # 示例
/// ```rust
/// use breakeron::deferred::{Deferred, DeferredState};
///
/// let call = Deferred::new(|| async { Ok::<_, std::io::Error>(42) });
/// let handle = call.handle();
/// call.cancel();
/// assert_eq!(handle.state(), DeferredState::Cancelled);
/// ```
pub struct Deferred<T: 'static, E: 'static> {
    task: Option<Task<T, E>>,
    on_cancel: Option<CancelHook>,
    state: Arc<AtomicU8>,
}

impl<T: 'static, E: 'static> Deferred<T, E> {
    /// 创建延迟调用
    ///
    /// `operation` 在 [`Deferred::start`] 之前不会被调用。
    pub fn new<F, Fut>(operation: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self {
            task: Some(Box::new(move || operation().boxed())),
            on_cancel: None,
            state: Arc::new(AtomicU8::new(UNSTARTED)),
        }
    }

    /// 设置取消回调，用于释放尚未启动的上游资源
    pub fn with_cancel<C>(mut self, on_cancel: C) -> Self
    where
        C: FnOnce() + Send + 'static,
    {
        self.on_cancel = Some(Box::new(on_cancel));
        self
    }

    /// 获取状态观察句柄
    pub fn handle(&self) -> DeferredHandle {
        DeferredHandle {
            state: Arc::clone(&self.state),
        }
    }

    pub fn state(&self) -> DeferredState {
        DeferredState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// 启动调用
    pub fn start(mut self) -> BoxFuture<'static, Result<T, E>> {
        self.on_cancel = None;
        match self.task.take() {
            Some(task) => {
                self.state.store(STARTED, Ordering::Release);
                task()
            }
            // task 只会在 start/cancel 中被取走，而两者都消耗 self
            None => unreachable!("deferred call already consumed"),
        }
    }

    /// 取消调用，操作永远不会被启动
    pub fn cancel(mut self) {
        self.cancel_in_place();
    }

    fn cancel_in_place(&mut self) {
        if self.task.take().is_none() {
            return;
        }
        self.state.store(CANCELLED, Ordering::Release);
        if let Some(on_cancel) = self.on_cancel.take() {
            on_cancel();
        }
        trace!("延迟调用已取消");
    }
}

impl<T: 'static, E: 'static> Drop for Deferred<T, E> {
    fn drop(&mut self) {
        self.cancel_in_place();
    }
}

impl<T: 'static, E: 'static> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("state", &self.state())
            .finish()
    }
}

/// 延迟调用状态句柄
#[derive(Debug, Clone)]
pub struct DeferredHandle {
    state: Arc<AtomicU8>,
}

impl DeferredHandle {
    pub fn state(&self) -> DeferredState {
        DeferredState::from_u8(self.state.load(Ordering::Acquire))
    }
}
