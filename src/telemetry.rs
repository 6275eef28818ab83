//! 日志初始化
//!
//! 库本身只通过 `tracing` 输出事件；应用可以用 [`init_tracing`] 安装一个
//! 基于 `tracing-subscriber` 的默认订阅者。

use crate::error::BreakerError;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 默认过滤规则
pub const DEFAULT_FILTER: &str = "breakeron=info";

/// 安装全局 fmt 订阅者
///
/// `RUST_LOG` 存在时优先使用，否则使用 `filter`。
/// 重复初始化返回 [`BreakerError::ConfigError`]。
pub fn init_tracing(filter: &str) -> Result<(), BreakerError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .map_err(|e| BreakerError::ConfigError(format!("无效的日志过滤规则: {}", e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|e| BreakerError::ConfigError(format!("日志初始化失败: {}", e)))?;

    info!("日志系统已初始化: filter={}", filter);
    Ok(())
}
