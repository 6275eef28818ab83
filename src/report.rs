//! 熔断器状态报告
//!
//! [`BreakerReport`] 是在熔断器锁内生成的只读快照。

use crate::error::BreakerError;
use crate::state::{BreakerState, CircuitState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 熔断器状态报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerReport {
    /// 熔断器名称
    pub name: String,
    /// 阈值配置
    pub threshold: Threshold,
    /// 当前状态
    pub status: Status,
}

/// 阈值配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    /// 最大失败次数
    pub max_failures: u32,
    /// 重置周期
    pub frequency: Duration,
}

/// 状态快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub state: BreakerState,
    /// 失败次数
    pub failures: u32,
    /// 最近一次失败时间，仅在 failures > 0 时存在
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure_at: Option<DateTime<Utc>>,
    /// 重试时间，仅在 Open 时存在
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_at: Option<DateTime<Utc>>,
}

impl Status {
    pub(crate) fn from_state(state: &CircuitState) -> Self {
        Self {
            state: state.state(),
            failures: state.failures,
            last_failure_at: if state.failures > 0 {
                state.last_failure_at
            } else {
                None
            },
            retry_at: state.retry_at(),
        }
    }
}

impl BreakerReport {
    /// 序列化为JSON
    pub fn to_json(&self) -> Result<String, BreakerError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// 可生成状态报告的组件
#[async_trait]
pub trait Reportable: Send + Sync {
    /// 报告中使用的名称
    fn name(&self) -> &str;

    /// 生成状态报告
    async fn report(&self) -> BreakerReport;
}
