//! 熔断器容器
//!
//! [`BreakerBox`] 按名称缓存熔断器实例，并汇总它们的状态报告。
//! 同名熔断器只会创建一次，之后传入的不同配置会被忽略。

use crate::circuit_breaker::{BreakerConfig, CircuitBreaker};
use crate::config::BoxConfig;
use crate::error::BreakerError;
use crate::guard::Guarded;
use crate::report::{BreakerReport, Reportable};
use ahash::AHashMap as HashMap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info};

/// 熔断器容器
#[derive(Default)]
pub struct BreakerBox {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerBox {
    /// 创建空容器
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用已有熔断器创建容器，按熔断器名称索引
    pub fn with_breakers<I>(breakers: I) -> Self
    where
        I: IntoIterator<Item = Arc<CircuitBreaker>>,
    {
        let container = Self::new();
        for breaker in breakers {
            container
                .breakers
                .insert(breaker.name().to_string(), breaker);
        }
        container
    }

    /// 从文件配置创建容器
    pub fn from_config(config: &BoxConfig) -> Result<Self, BreakerError> {
        config.validate()?;

        let container = Self::new();
        for settings in &config.breakers {
            container.breaker(&settings.name, settings.to_breaker_config()?)?;
        }
        info!("从配置创建熔断器容器: {} 个熔断器", container.len());
        Ok(container)
    }

    /// 获取或创建熔断器
    ///
    /// 已存在同名熔断器时直接返回，`config` 被忽略。
    pub fn breaker(
        &self,
        name: &str,
        config: BreakerConfig,
    ) -> Result<Arc<CircuitBreaker>, BreakerError> {
        match self.breakers.entry(name.to_string()) {
            Entry::Occupied(entry) => {
                debug!("复用已有熔断器: name={}", name);
                Ok(Arc::clone(entry.get()))
            }
            Entry::Vacant(entry) => {
                let breaker = Arc::new(CircuitBreaker::new(name, config)?);
                entry.insert(Arc::clone(&breaker));
                Ok(breaker)
            }
        }
    }

    /// 用名为 `name` 的熔断器保护操作
    ///
    /// 多个操作使用同一名称时共享同一个熔断器。
    pub fn as_breaker<F>(
        &self,
        name: &str,
        config: BreakerConfig,
        operation: F,
    ) -> Result<Guarded<F>, BreakerError> {
        let breaker = self.breaker(name, config)?;
        Ok(Guarded::new(name, breaker, operation))
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.breakers.contains_key(name)
    }

    /// 所有熔断器名称（已排序）
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .breakers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// 移除熔断器
    pub fn remove(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.remove(name).map(|(_, breaker)| breaker)
    }

    /// 清除所有熔断器
    pub fn clear(&self) {
        self.breakers.clear();
    }

    /// 并发获取所有熔断器的状态报告，按报告中的名称索引
    pub async fn report(&self) -> HashMap<String, BreakerReport> {
        let breakers: Vec<Arc<CircuitBreaker>> = self
            .breakers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        collect_reports(breakers.iter().map(|breaker| breaker.as_ref())).await
    }
}

/// 并发收集报告，按报告中的名称索引
pub async fn collect_reports<'a, R, I>(sources: I) -> HashMap<String, BreakerReport>
where
    R: Reportable + ?Sized + 'a,
    I: IntoIterator<Item = &'a R>,
{
    join_all(sources.into_iter().map(|source| source.report()))
        .await
        .into_iter()
        .map(|report| (report.name.clone(), report))
        .collect()
}

lazy_static::lazy_static! {
    /// 全局熔断器容器实例
    pub static ref GLOBAL_BREAKER_BOX: BreakerBox = BreakerBox::new();
}
