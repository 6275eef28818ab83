//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 熔断器状态机
//!
//! 状态转换全部由时间惰性驱动，没有后台定时器：每次持锁操作开始时调用
//! [`CircuitState::reconcile`]，根据当前时间推进状态。
//!
//! ```text
//! Closed   -> Open     : 失败次数达到阈值
//! Open     -> HalfOpen : now >= retry_at
//! HalfOpen -> Closed   : 探测调用成功
//! HalfOpen -> Open     : 探测调用失败
//! Closed   -> Closed   : now >= last_failure_at + reset_period，计数清零
//! ```

use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;

/// 熔断器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// 关闭状态（正常）
    Closed,
    /// 半开状态（探测）
    HalfOpen,
    /// 打开状态（熔断）
    Open,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::HalfOpen => "half_open",
            BreakerState::Open => "open",
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 状态阶段，Open 携带自己的重试截止时间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Closed,
    HalfOpen,
    Open { retry_at: DateTime<Utc> },
}

/// 熔断器内部状态：阶段 + 失败计数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitState {
    pub phase: Phase,
    /// 上次完全重置以来记录的失败次数
    pub failures: u32,
    /// 最近一次记录失败的时间，`None` 表示从未失败
    pub last_failure_at: Option<DateTime<Utc>>,
}

impl Default for CircuitState {
    fn default() -> Self {
        Self::closed()
    }
}

impl CircuitState {
    /// 初始状态：关闭，计数为 0
    pub fn closed() -> Self {
        Self {
            phase: Phase::Closed,
            failures: 0,
            last_failure_at: None,
        }
    }

    pub fn state(&self) -> BreakerState {
        match self.phase {
            Phase::Closed => BreakerState::Closed,
            Phase::HalfOpen => BreakerState::HalfOpen,
            Phase::Open { .. } => BreakerState::Open,
        }
    }

    /// 仅在 Open 时存在
    pub fn retry_at(&self) -> Option<DateTime<Utc>> {
        match self.phase {
            Phase::Open { retry_at } => Some(retry_at),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.phase, Phase::Open { .. })
    }

    pub fn is_half_open(&self) -> bool {
        matches!(self.phase, Phase::HalfOpen)
    }

    /// 按时间推进状态
    ///
    /// 两项检查相互独立且每次都执行：
    /// - Open 且 `now >= retry_at` 时进入 HalfOpen
    /// - Closed 且 `now >= last_failure_at + reset_period` 时清空计数
    pub fn reconcile(self, now: DateTime<Utc>, reset_period: TimeDelta) -> Self {
        let mut next = self;

        if let Phase::Open { retry_at } = next.phase {
            if now >= retry_at {
                next.phase = Phase::HalfOpen;
            }
        }

        if next.phase == Phase::Closed {
            let expired = match next.last_failure_at {
                Some(at) => now >= deadline(at, reset_period),
                None => true,
            };
            if expired {
                next = Self::closed();
            }
        }

        next
    }

    /// 记录一次失败
    pub fn record_failure(self, now: DateTime<Utc>) -> Self {
        Self {
            failures: self.failures.saturating_add(1),
            last_failure_at: Some(now),
            ..self
        }
    }

    /// 进入打开状态，保留计数
    pub fn trip(self, retry_at: DateTime<Utc>) -> Self {
        Self {
            phase: Phase::Open { retry_at },
            ..self
        }
    }

    /// 完全重置到关闭状态
    pub fn reset(self) -> Self {
        Self::closed()
    }
}

/// `at + delta`，溢出时取最大时间
pub fn deadline(at: DateTime<Utc>, delta: TimeDelta) -> DateTime<Utc> {
    at.checked_add_signed(delta)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
