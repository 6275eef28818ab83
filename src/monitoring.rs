//! 监控指标模块
//!
//! 为熔断器提供 Prometheus 指标：
//!
//! - `breakeron_calls_total{breaker, outcome}`: 调用结果计数
//! - `breakeron_state{breaker}`: 当前状态（0=closed, 1=half_open, 2=open）
//!
//! 熔断器只在设置了全局实例后才会上报指标。
//!
//! # 示例
//!
//! ```rust
//! use breakeron::monitoring::{set_global_metrics, BreakerMetrics};
//! use std::sync::Arc;
//!
//! let metrics = Arc::new(BreakerMetrics::new().unwrap());
//! set_global_metrics(Arc::clone(&metrics));
//! println!("{}", metrics.gather());
//! ```

use crate::state::BreakerState;
use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::sync::{Arc, OnceLock};
use tracing::error;

/// 熔断器监控指标
#[derive(Clone)]
pub struct BreakerMetrics {
    /// 调用结果计数
    pub calls_total: IntCounterVec,
    /// 熔断器状态
    pub state: IntGaugeVec,
    registry: Registry,
}

/// 全局指标实例
static GLOBAL_METRICS: OnceLock<Arc<BreakerMetrics>> = OnceLock::new();

/// 设置全局指标实例，只有第一次设置生效
pub fn set_global_metrics(metrics: Arc<BreakerMetrics>) {
    let _ = GLOBAL_METRICS.set(metrics);
}

/// 获取全局指标实例
pub fn try_global() -> Option<Arc<BreakerMetrics>> {
    GLOBAL_METRICS.get().cloned()
}

impl BreakerMetrics {
    /// 创建并注册指标
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let calls_total = IntCounterVec::new(
            Opts::new("breakeron_calls_total", "Calls observed by circuit breakers"),
            &["breaker", "outcome"],
        )?;
        let state = IntGaugeVec::new(
            Opts::new(
                "breakeron_state",
                "Circuit breaker state (0=closed, 1=half_open, 2=open)",
            ),
            &["breaker"],
        )?;

        registry.register(Box::new(calls_total.clone()))?;
        registry.register(Box::new(state.clone()))?;

        Ok(Self {
            calls_total,
            state,
            registry,
        })
    }

    /// 记录一次调用结果，并同步状态
    pub fn record_call(&self, breaker: &str, outcome: &str, state: BreakerState) {
        self.calls_total
            .with_label_values(&[breaker, outcome])
            .inc();
        self.set_state(breaker, state);
    }

    /// 设置熔断器状态
    pub fn set_state(&self, breaker: &str, state: BreakerState) {
        self.state
            .with_label_values(&[breaker])
            .set(state_value(state));
    }

    /// 获取指标注册表
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// 以 Prometheus 文本格式导出
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            error!("指标编码失败: {}", e);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

fn state_value(state: BreakerState) -> i64 {
    match state {
        BreakerState::Closed => 0,
        BreakerState::HalfOpen => 1,
        BreakerState::Open => 2,
    }
}
