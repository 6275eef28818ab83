//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 错误类型定义
//!
//! `CallError` 和 `BreakerError` 使用thiserror定义；`TripSignal` 手动实现
//! `Display` 和 `Error`，以便把原因本身作为 `source()` 暴露。
//!
//! - [`TripSignal`]: 熔断器已打开，携带熔断器名称和重试时间
//! - [`CallError`]: 受保护调用的结果错误，区分熔断与原始错误
//! - [`BreakerError`]: 配置、加载等库级错误

use chrono::{DateTime, SecondsFormat, Utc};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// 熔断信号
///
/// 熔断器拒绝调用或熔断时返回给调用方。下游熔断器返回的 `TripSignal`
/// 会被上游熔断器识别为级联熔断。
#[derive(Debug, Clone)]
pub struct TripSignal {
    name: String,
    retry_at: DateTime<Utc>,
    cause: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl fmt::Display for TripSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} is tripped, retry at {}",
            self.name,
            self.retry_at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
        )
    }
}

impl StdError for TripSignal {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

impl TripSignal {
    /// 创建熔断信号（无原因）
    pub fn new(name: impl Into<String>, retry_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            retry_at,
            cause: None,
        }
    }

    /// 附带触发熔断的原始错误
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// 熔断器名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 允许重试的时间
    pub fn retry_at(&self) -> DateTime<Utc> {
        self.retry_at
    }

    /// 触发熔断的原始错误
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// 在错误及其 `source()` 链中查找最近的熔断信号
    ///
    /// 包装 `TripSignal` 的自定义错误需要用 `#[source]` 暴露它。
    /// `#[error(transparent)]` 会把 `source()` 直接转发给信号的原因，
    /// 信号本身不在链上，因此不会被识别为级联熔断。
    pub fn find_in<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a TripSignal> {
        let mut current = Some(err);
        while let Some(e) = current {
            if let Some(signal) = e.downcast_ref::<TripSignal>() {
                return Some(signal);
            }
            current = e.source();
        }
        None
    }
}

/// 受保护调用的错误
#[derive(Error, Debug)]
pub enum CallError<E> {
    /// 熔断器拒绝或熔断
    #[error("{0}")]
    Tripped(#[source] TripSignal),

    /// 原始错误，未包装
    #[error(transparent)]
    Failed(E),
}

impl<E> CallError<E> {
    pub fn is_tripped(&self) -> bool {
        matches!(self, CallError::Tripped(_))
    }

    /// 获取熔断信号
    pub fn trip(&self) -> Option<&TripSignal> {
        match self {
            CallError::Tripped(signal) => Some(signal),
            CallError::Failed(_) => None,
        }
    }

    /// 获取原始错误
    pub fn failure(&self) -> Option<&E> {
        match self {
            CallError::Tripped(_) => None,
            CallError::Failed(e) => Some(e),
        }
    }

    pub fn into_failure(self) -> Option<E> {
        match self {
            CallError::Tripped(_) => None,
            CallError::Failed(e) => Some(e),
        }
    }
}

impl<E> From<TripSignal> for CallError<E> {
    fn from(signal: TripSignal) -> Self {
        CallError::Tripped(signal)
    }
}

/// Breakeron 库级错误
#[derive(Error, Debug)]
pub enum BreakerError {
    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 验证错误
    #[error("验证错误: {0}")]
    ValidationError(String),

    /// IO错误
    #[error("IO错误: {0}")]
    IoError(#[from] std::io::Error),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// YAML解析错误
    #[error("YAML解析错误: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML解析错误
    #[error("TOML解析错误: {0}")]
    TomlError(#[from] toml::de::Error),
}
