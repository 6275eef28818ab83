//! 配置模块集成测试
//!
//! 测试配置文件加载与容器创建

use breakeron::{BoxConfig, BreakerBox, BreakerError, BreakerState};
use std::io::Write;
use std::time::Duration;

fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

/// 测试从YAML文件加载
#[tokio::test]
async fn test_load_yaml_file() {
    let file = write_config(
        ".yml",
        r#"
version: "1.0"
breakers:
  - name: "payments"
    max_failures: 3
    reset_period: "2m"
    cooldown: "15s"
"#,
    );

    let config = BoxConfig::from_file(file.path()).unwrap();
    let breakers = BreakerBox::from_config(&config).unwrap();

    let payments = breakers.get("payments").unwrap();
    assert_eq!(payments.config().max_failures, 3);
    assert_eq!(payments.config().reset_period, Duration::from_secs(120));
    assert_eq!(payments.config().cooldown, Duration::from_secs(15));
    assert_eq!(payments.state().await, BreakerState::Closed);
}

/// 测试从TOML文件加载
#[test]
fn test_load_toml_file() {
    let file = write_config(
        ".toml",
        r#"
version = "2.0"

[[breakers]]
name = "search"
max_failures = 10

[[breakers]]
name = "recommendations"
max_failures = 2
cooldown = "500ms"
"#,
    );

    let config = BoxConfig::from_file(file.path()).unwrap();
    assert_eq!(config.version, "2.0");
    assert_eq!(config.breakers.len(), 2);

    let breakers = BreakerBox::from_config(&config).unwrap();
    assert_eq!(
        breakers.get("recommendations").unwrap().config().cooldown,
        Duration::from_millis(500)
    );
}

/// 测试从JSON文件加载
#[test]
fn test_load_json_file() {
    let file = write_config(
        ".json",
        r#"{"version": "1.0", "breakers": [{"name": "ledger", "max_failures": 1, "cooldown": "1h"}]}"#,
    );

    let config = BoxConfig::from_file(file.path()).unwrap();
    let settings = &config.breakers[0];
    assert_eq!(
        settings.to_breaker_config().unwrap().cooldown,
        Duration::from_secs(3600)
    );
}

/// 测试文件不存在
#[test]
fn test_missing_file() {
    let result = BoxConfig::from_file("/nonexistent/breakers.yaml");
    assert!(matches!(result, Err(BreakerError::IoError(_))));
}

/// 测试格式错误
#[test]
fn test_malformed_files() {
    let yaml = write_config(".yaml", "breakers: [");
    assert!(matches!(
        BoxConfig::from_file(yaml.path()),
        Err(BreakerError::YamlError(_))
    ));

    let toml = write_config(".toml", "[[breakers]\nname = ");
    assert!(matches!(
        BoxConfig::from_file(toml.path()),
        Err(BreakerError::TomlError(_))
    ));

    let json = write_config(".json", "{\"breakers\": 1}");
    assert!(matches!(
        BoxConfig::from_file(json.path()),
        Err(BreakerError::SerdeError(_))
    ));
}

/// 测试非法阈值
#[test]
fn test_invalid_threshold_rejected() {
    let file = write_config(
        ".yaml",
        "breakers:\n  - name: \"zero\"\n    max_failures: 0\n",
    );

    let config = BoxConfig::from_file(file.path()).unwrap();
    assert!(matches!(
        BreakerBox::from_config(&config),
        Err(BreakerError::ValidationError(_))
    ));
}
