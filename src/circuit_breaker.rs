//! 熔断器实现
//!
//! 提供熔断器功能，支持三状态转换、惰性恢复和级联熔断。
//!
//! # 特性
//!
//! - **三状态**: Closed（关闭）、Open（打开）、HalfOpen（半开）
//! - **自动熔断**: 失败次数达到阈值自动熔断
//! - **惰性恢复**: 不使用后台定时器，每次持锁操作时按时间推进状态
//! - **级联熔断**: 下游熔断信号会立即触发本熔断器，并同步重试时间
//! - **串行执行**: 锁在整个受保护调用期间持有，同一熔断器同时最多执行一个调用
//! - **错误分类**: `record_only` 和 `process_exception` 决定哪些错误计入失败
//!
//! # 锁
//!
//! 锁在受保护调用的整个 await 期间持有。多个熔断器可以共享同一把
//! [`BreakerLock`]，但共享锁的熔断器之间不能相互嵌套调用，否则会死锁。
//!
//! `process_exception` 不能 panic。panic 会打断错误分类，本次失败不会被记录，
//! panic 会继续向调用方传播。

use crate::constants::{DEFAULT_COOLDOWN_SECS, DEFAULT_RESET_PERIOD_SECS, MAX_BREAKER_NAME_LENGTH};
use crate::deferred::Deferred;
use crate::error::{BreakerError, CallError, TripSignal};
use crate::report::{BreakerReport, Reportable, Status, Threshold};
use crate::state::{deadline, BreakerState, CircuitState};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::MutexGuard;
use tracing::{debug, error, info, trace, warn};

const OUTCOME_SUCCESS: &str = "success";
const OUTCOME_FAILURE: &str = "failure";
const OUTCOME_IGNORED: &str = "ignored";
const OUTCOME_TRIPPED: &str = "tripped";
const OUTCOME_REJECTED: &str = "rejected";

/// 错误过滤函数
pub type ExceptionFilter = Arc<dyn Fn(&(dyn StdError + 'static)) -> bool + Send + Sync>;

/// 可计入失败的错误集合
///
/// 默认匹配所有错误。按类型匹配时检查错误本身，以及内层熔断器原样透传的
/// `CallError::Failed`，不检查 `source()` 链。
///
/// # 示例
/// ```rust
/// use breakeron::circuit_breaker::RecordOnly;
///
/// let record_only = RecordOnly::of::<std::io::Error>();
/// let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
/// assert!(record_only.matches(&err));
/// ```
#[derive(Clone, Default)]
pub struct RecordOnly {
    matchers: Vec<ExceptionFilter>,
}

impl RecordOnly {
    /// 匹配所有错误
    pub fn everything() -> Self {
        Self::default()
    }

    /// 只匹配类型为 `T` 的错误
    pub fn of<T>() -> Self
    where
        T: StdError + Send + Sync + 'static,
    {
        Self::everything().or::<T>()
    }

    /// 使用自定义谓词匹配
    pub fn matching<F>(predicate: F) -> Self
    where
        F: Fn(&(dyn StdError + 'static)) -> bool + Send + Sync + 'static,
    {
        Self::everything().or_matching(predicate)
    }

    /// 追加类型 `T`
    ///
    /// 内层熔断器透传的 `CallError::Failed(T)` 同样匹配。
    pub fn or<T>(self) -> Self
    where
        T: StdError + Send + Sync + 'static,
    {
        self.or_matching(|err| {
            err.is::<T>()
                || err
                    .downcast_ref::<CallError<T>>()
                    .and_then(CallError::failure)
                    .is_some()
        })
    }

    /// 追加自定义谓词
    pub fn or_matching<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&(dyn StdError + 'static)) -> bool + Send + Sync + 'static,
    {
        self.matchers.push(Arc::new(predicate));
        self
    }

    /// 是否匹配所有错误
    pub fn is_everything(&self) -> bool {
        self.matchers.is_empty()
    }

    pub fn matches(&self, err: &(dyn StdError + 'static)) -> bool {
        self.is_everything() || self.matchers.iter().any(|matcher| matcher(err))
    }
}

impl fmt::Debug for RecordOnly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_everything() {
            f.write_str("RecordOnly(everything)")
        } else {
            write!(f, "RecordOnly({} matchers)", self.matchers.len())
        }
    }
}

/// 熔断器锁
///
/// 可在多个熔断器之间共享；未指定时每个熔断器创建自己的锁。
/// 基于 `tokio::sync::Mutex`，等待者按先来后到获得锁。
#[derive(Clone, Default)]
pub struct BreakerLock {
    inner: Arc<tokio::sync::Mutex<()>>,
}

impl BreakerLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取锁
    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.inner.lock().await
    }

    /// 两个句柄是否指向同一把锁
    pub fn ptr_eq(&self, other: &BreakerLock) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for BreakerLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerLock")
            .field("locked", &self.inner.try_lock().is_err())
            .finish()
    }
}

/// 熔断器配置
#[derive(Clone)]
pub struct BreakerConfig {
    /// 失败阈值（达到此值时熔断）
    pub max_failures: u32,
    /// 重置周期（关闭状态下无失败超过此时间则清空计数）
    pub reset_period: Duration,
    /// 冷却时间（打开状态后等待此时间再允许探测调用）
    pub cooldown: Duration,
    /// 可计入失败的错误集合
    pub record_only: RecordOnly,
    /// 进一步过滤 `record_only` 匹配的错误，不能 panic
    pub process_exception: Option<ExceptionFilter>,
    /// 外部提供的锁
    pub lock: Option<BreakerLock>,
}

impl BreakerConfig {
    /// 创建新的熔断器配置
    ///
    /// # 参数
    /// - `max_failures`: 失败阈值，必须大于0
    pub fn new(max_failures: u32) -> Self {
        Self {
            max_failures,
            reset_period: Duration::from_secs(DEFAULT_RESET_PERIOD_SECS),
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
            record_only: RecordOnly::everything(),
            process_exception: None,
            lock: None,
        }
    }

    /// 设置重置周期
    pub fn reset_period(mut self, reset_period: Duration) -> Self {
        self.reset_period = reset_period;
        self
    }

    /// 设置冷却时间
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// 设置可计入失败的错误集合
    pub fn record_only(mut self, record_only: RecordOnly) -> Self {
        self.record_only = record_only;
        self
    }

    /// 设置错误过滤函数
    pub fn process_exception<F>(mut self, filter: F) -> Self
    where
        F: Fn(&(dyn StdError + 'static)) -> bool + Send + Sync + 'static,
    {
        self.process_exception = Some(Arc::new(filter));
        self
    }

    /// 使用外部锁
    pub fn lock(mut self, lock: BreakerLock) -> Self {
        self.lock = Some(lock);
        self
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), BreakerError> {
        if self.max_failures == 0 {
            return Err(BreakerError::ConfigError(
                "max_failures 必须大于0".to_string(),
            ));
        }
        to_time_delta("reset_period", self.reset_period)?;
        to_time_delta("cooldown", self.cooldown)?;
        Ok(())
    }
}

impl fmt::Debug for BreakerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerConfig")
            .field("max_failures", &self.max_failures)
            .field("reset_period", &self.reset_period)
            .field("cooldown", &self.cooldown)
            .field("record_only", &self.record_only)
            .field("process_exception", &self.process_exception.is_some())
            .field("lock", &self.lock)
            .finish()
    }
}

fn to_time_delta(field: &str, duration: Duration) -> Result<TimeDelta, BreakerError> {
    TimeDelta::from_std(duration)
        .map_err(|_| BreakerError::ConfigError(format!("{} 超出范围: {:?}", field, duration)))
}

/// 失败分类结果，按优先级检查：级联熔断 > 计入失败 > 直接透传
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// 下游熔断器已熔断
    Cascaded { retry_at: DateTime<Utc> },
    /// 计入失败
    Qualifying,
    /// 不计入失败，原样返回
    PassThrough,
}

/// 熔断器
///
/// # 示例
/// ```rust
/// use breakeron::circuit_breaker::{BreakerConfig, CircuitBreaker};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() {
/// let config = BreakerConfig::new(5).cooldown(Duration::from_secs(60));
/// let breaker = CircuitBreaker::new("inventory", config).unwrap();
///
/// let result = breaker
///     .call(|| async { Ok::<_, std::io::Error>("stock") })
///     .await;
/// assert_eq!(result.unwrap(), "stock");
/// # }
/// ```
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    reset_period: TimeDelta,
    cooldown: TimeDelta,
    lock: BreakerLock,
    /// 只在持有 `lock` 时访问，且不跨越 await
    state: Mutex<CircuitState>,
}

impl CircuitBreaker {
    /// 创建新的熔断器
    ///
    /// # 参数
    /// - `name`: 熔断器名称，用于报告和错误信息
    /// - `config`: 熔断器配置
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Result<Self, BreakerError> {
        let name = name.into();
        if name.is_empty() {
            return Err(BreakerError::ConfigError("熔断器名称不能为空".to_string()));
        }
        if name.len() > MAX_BREAKER_NAME_LENGTH {
            return Err(BreakerError::ConfigError(format!(
                "熔断器名称过长，最大长度为{}",
                MAX_BREAKER_NAME_LENGTH
            )));
        }
        config.validate()?;

        let reset_period = to_time_delta("reset_period", config.reset_period)?;
        let cooldown = to_time_delta("cooldown", config.cooldown)?;
        let lock = config.lock.clone().unwrap_or_default();

        info!(
            "创建熔断器: name={}, max_failures={}, reset_period={:?}, cooldown={:?}",
            name, config.max_failures, config.reset_period, config.cooldown
        );

        Ok(Self {
            name,
            config,
            reset_period,
            cooldown,
            lock,
            state: Mutex::new(CircuitState::closed()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 获取配置
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// 熔断器使用的锁
    pub fn lock(&self) -> &BreakerLock {
        &self.lock
    }

    /// 执行延迟调用，自动处理熔断逻辑
    ///
    /// # 返回
    /// - `Ok(T)`: 调用成功
    /// - `Err(CallError::Tripped)`: 熔断器拒绝调用，或本次失败导致熔断
    /// - `Err(CallError::Failed)`: 调用失败但未熔断，原始错误不做包装
    ///
    /// 熔断器打开时，延迟调用会被取消，操作不会被启动。
    pub async fn run<T, E>(&self, call: Deferred<T, E>) -> Result<T, CallError<E>>
    where
        T: 'static,
        E: StdError + Send + Sync + 'static,
    {
        let _guard = self.lock.acquire().await;

        let state = self.reconcile(Utc::now());
        if let Some(retry_at) = state.retry_at() {
            call.cancel();
            warn!("熔断器打开，拒绝请求: name={}, retry_at={}", self.name, retry_at);
            self.observe(OUTCOME_REJECTED, BreakerState::Open);
            return Err(CallError::Tripped(TripSignal::new(&self.name, retry_at)));
        }

        match call.start().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => Err(self.on_failure(err)),
        }
    }

    /// 包装闭包并执行
    ///
    /// 等价于 `run(Deferred::new(operation))`。
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: 'static,
        E: StdError + Send + Sync + 'static,
    {
        self.run(Deferred::new(operation)).await
    }

    /// 获取状态报告
    ///
    /// 与 `run` 使用同一把锁，并先按当前时间推进状态。
    pub async fn report(&self) -> BreakerReport {
        let _guard = self.lock.acquire().await;
        let state = self.reconcile(Utc::now());

        BreakerReport {
            name: self.name.clone(),
            threshold: Threshold {
                max_failures: self.config.max_failures,
                frequency: self.config.reset_period,
            },
            status: Status::from_state(&state),
        }
    }

    /// 获取当前状态（已按时间推进）
    pub async fn state(&self) -> BreakerState {
        let _guard = self.lock.acquire().await;
        self.reconcile(Utc::now()).state()
    }

    /// 按时间推进状态，返回推进后的快照
    fn reconcile(&self, now: DateTime<Utc>) -> CircuitState {
        let mut state = self.state.lock();
        let before = *state;
        let after = before.reconcile(now, self.reset_period);

        if before.is_open() && after.is_half_open() {
            info!("熔断器状态变更: name={}, Open -> HalfOpen", self.name);
            self.set_state_gauge(BreakerState::HalfOpen);
        } else if before.failures > 0 && after.failures == 0 {
            debug!(
                "熔断器重置周期已过，清空失败计数: name={}, failures={}",
                self.name, before.failures
            );
        }

        *state = after;
        after
    }

    /// 调用成功时的处理
    fn on_success(&self) {
        let mut state = self.state.lock();
        if state.is_half_open() {
            *state = state.reset();
            info!("熔断器状态变更: name={}, HalfOpen -> Closed", self.name);
        } else {
            trace!("操作成功: name={}", self.name);
        }
        self.observe(OUTCOME_SUCCESS, state.state());
    }

    /// 调用失败时的处理
    fn on_failure<E>(&self, err: E) -> CallError<E>
    where
        E: StdError + Send + Sync + 'static,
    {
        let now = Utc::now();

        match self.classify(&err) {
            Outcome::PassThrough => {
                trace!("错误不计入失败: name={}, error={}", self.name, err);
                self.observe(OUTCOME_IGNORED, self.state.lock().state());
                CallError::Failed(err)
            }
            Outcome::Cascaded { retry_at: inner } => {
                let retry_at = deadline(inner, self.cooldown);
                let mut state = self.state.lock();
                let old_state = state.state();
                *state = state.record_failure(now).trip(retry_at);
                warn!(
                    "下游熔断器已熔断，级联熔断: name={}, {:?} -> Open, retry_at={}",
                    self.name, old_state, retry_at
                );
                self.observe(OUTCOME_TRIPPED, BreakerState::Open);
                CallError::Tripped(TripSignal::new(&self.name, retry_at).with_cause(err))
            }
            Outcome::Qualifying => {
                let mut state = self.state.lock();
                let old_state = state.state();
                let recorded = state.record_failure(now);

                if recorded.failures >= self.config.max_failures || recorded.is_half_open() {
                    let retry_at = deadline(now, self.cooldown);
                    *state = recorded.trip(retry_at);
                    warn!(
                        "熔断器状态变更: name={}, {:?} -> Open (failures={}), retry_at={}",
                        self.name, old_state, recorded.failures, retry_at
                    );
                    self.observe(OUTCOME_TRIPPED, BreakerState::Open);
                    CallError::Tripped(TripSignal::new(&self.name, retry_at).with_cause(err))
                } else {
                    *state = recorded;
                    debug!(
                        "操作失败: name={}, failures={}/{}",
                        self.name, recorded.failures, self.config.max_failures
                    );
                    self.observe(OUTCOME_FAILURE, recorded.state());
                    CallError::Failed(err)
                }
            }
        }
    }

    fn classify(&self, err: &(dyn StdError + 'static)) -> Outcome {
        if let Some(signal) = TripSignal::find_in(err) {
            return Outcome::Cascaded {
                retry_at: signal.retry_at(),
            };
        }

        if self.config.record_only.matches(err) && self.process_exception(err) {
            Outcome::Qualifying
        } else {
            Outcome::PassThrough
        }
    }

    fn process_exception(&self, err: &(dyn StdError + 'static)) -> bool {
        let Some(filter) = &self.config.process_exception else {
            return true;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| filter(err))) {
            Ok(record) => record,
            Err(payload) => {
                error!(
                    "process_exception 发生 panic，熔断器配置错误，本次失败不会被记录: name={}",
                    self.name
                );
                panic::resume_unwind(payload)
            }
        }
    }

    #[cfg(feature = "monitoring")]
    fn observe(&self, outcome: &str, state: BreakerState) {
        if let Some(metrics) = crate::monitoring::try_global() {
            metrics.record_call(&self.name, outcome, state);
        }
    }

    #[cfg(not(feature = "monitoring"))]
    fn observe(&self, _outcome: &str, _state: BreakerState) {}

    #[cfg(feature = "monitoring")]
    fn set_state_gauge(&self, state: BreakerState) {
        if let Some(metrics) = crate::monitoring::try_global() {
            metrics.set_state(&self.name, state);
        }
    }

    #[cfg(not(feature = "monitoring"))]
    fn set_state_gauge(&self, _state: BreakerState) {}
}

#[async_trait]
impl Reportable for CircuitBreaker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn report(&self) -> BreakerReport {
        CircuitBreaker::report(self).await
    }
}

impl fmt::Display for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().state();
        write!(f, "<CircuitBreaker: {} state: {}>", self.name, state)
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .finish()
    }
}
