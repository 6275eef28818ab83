//! 配置模块
//!
//! 定义熔断器容器的文件配置，支持 YAML、TOML 和 JSON。
//!
//! 文件配置只描述阈值和时间；`record_only`、`process_exception` 等运行时
//! 行为需要在代码中通过 [`BreakerConfig`] 设置。

use crate::circuit_breaker::BreakerConfig;
use crate::constants::{DEFAULT_CONFIG_VERSION, DEFAULT_COOLDOWN, DEFAULT_RESET_PERIOD};
use crate::error::BreakerError;
use ahash::AHashSet as HashSet;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 熔断器容器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub breakers: Vec<BreakerSettings>,
}

impl Default for BoxConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            breakers: Vec::new(),
        }
    }
}

/// 单个熔断器的文件配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerSettings {
    pub name: String,
    pub max_failures: u32,
    /// 重置周期，如 "30s"
    #[serde(default = "default_reset_period")]
    pub reset_period: String,
    /// 冷却时间，如 "30s"
    #[serde(default = "default_cooldown")]
    pub cooldown: String,
}

fn default_version() -> String {
    DEFAULT_CONFIG_VERSION.to_string()
}

fn default_reset_period() -> String {
    DEFAULT_RESET_PERIOD.to_string()
}

fn default_cooldown() -> String {
    DEFAULT_COOLDOWN.to_string()
}

impl BoxConfig {
    /// 从YAML字符串解析
    pub fn from_yaml_str(yaml: &str) -> Result<Self, BreakerError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// 从TOML字符串解析
    pub fn from_toml_str(toml: &str) -> Result<Self, BreakerError> {
        Ok(toml::from_str(toml)?)
    }

    /// 从JSON字符串解析
    pub fn from_json_str(json: &str) -> Result<Self, BreakerError> {
        Ok(serde_json::from_str(json)?)
    }

    /// 从文件加载，按扩展名选择格式
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BreakerError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "yaml" | "yml" => Self::from_yaml_str(&content),
            "toml" => Self::from_toml_str(&content),
            "json" => Self::from_json_str(&content),
            other => Err(BreakerError::ConfigError(format!(
                "不支持的配置文件格式: {}。支持的格式: yaml, yml, toml, json",
                other
            ))),
        }
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), BreakerError> {
        if self.version.is_empty() {
            return Err(BreakerError::ValidationError("版本号不能为空".to_string()));
        }

        let mut names = HashSet::new();
        for (index, settings) in self.breakers.iter().enumerate() {
            if !names.insert(settings.name.as_str()) {
                return Err(BreakerError::ValidationError(format!(
                    "熔断器名称重复: {}",
                    settings.name
                )));
            }

            settings.validate().map_err(|e| {
                BreakerError::ValidationError(format!("熔断器[{}]校验失败: {}", index, e))
            })?;
        }

        Ok(())
    }
}

impl BreakerSettings {
    pub fn new(name: impl Into<String>, max_failures: u32) -> Self {
        Self {
            name: name.into(),
            max_failures,
            reset_period: default_reset_period(),
            cooldown: default_cooldown(),
        }
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), BreakerError> {
        if self.name.is_empty() {
            return Err(BreakerError::ValidationError(
                "熔断器名称不能为空".to_string(),
            ));
        }
        self.to_breaker_config()?.validate()
    }

    /// 转换为运行时配置
    pub fn to_breaker_config(&self) -> Result<BreakerConfig, BreakerError> {
        Ok(BreakerConfig::new(self.max_failures)
            .reset_period(parse_duration(&self.reset_period)?)
            .cooldown(parse_duration(&self.cooldown)?))
    }
}

/// 解析时间字符串
///
/// # 支持的格式
///
/// - `500ms` - 500毫秒
/// - `10s` - 10秒
/// - `5m` - 5分钟
/// - `2h` - 2小时
/// - `1d` - 1天
///
/// # 示例
///
/// ```rust
/// use breakeron::config::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
/// ```
pub fn parse_duration(value: &str) -> Result<Duration, BreakerError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(BreakerError::ConfigError("时间不能为空".to_string()));
    }

    let (num_part, unit_part) =
        value.split_at(value.find(|c: char| c.is_alphabetic()).unwrap_or(value.len()));

    let num_str = num_part.trim();
    let unit = unit_part.trim().to_lowercase();

    if num_str.is_empty() {
        return Err(BreakerError::ConfigError(
            "时间格式错误：缺少数字部分".to_string(),
        ));
    }

    let num: u64 = num_str
        .parse()
        .map_err(|_| BreakerError::ConfigError(format!("无效的数字格式: {}", num_str)))?;

    if num == 0 {
        return Err(BreakerError::ConfigError("时间必须大于0".to_string()));
    }

    let multiplier_ms: u64 = match unit.as_str() {
        "ms" | "msec" | "millis" => 1,
        "" | "s" | "sec" | "second" | "seconds" => 1_000,
        "m" | "min" | "minute" | "minutes" => 60_000,
        "h" | "hr" | "hour" | "hours" => 3_600_000,
        "d" | "day" | "days" => 86_400_000,
        _ => {
            return Err(BreakerError::ConfigError(format!(
                "不支持的单位: {}。支持的单位: ms, s, m, h, d",
                unit
            )));
        }
    };

    let millis = num
        .checked_mul(multiplier_ms)
        .ok_or_else(|| BreakerError::ConfigError(format!("时间过大: {}", value)))?;

    Ok(Duration::from_millis(millis))
}
