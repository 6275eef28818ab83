//! 熔断器容器集成测试
//!
//! 测试容器的复用、报告汇总和全局实例

use crate::common::*;
use breakeron::{
    collect_reports, BoxConfig, BreakerBox, BreakerSettings, BreakerState, CircuitBreaker,
    Reportable, GLOBAL_BREAKER_BOX,
};
use std::sync::Arc;
use std::time::Duration;

/// 测试同名操作共享熔断器
#[tokio::test]
async fn test_breaker_box_shared_by_name() {
    let breakers = BreakerBox::new();

    let read = breakers
        .as_breaker("users", fast_config(2), |id: u32| async move {
            if id == 0 {
                Err(DownstreamError("no such user".to_string()))
            } else {
                Ok(format!("user-{}", id))
            }
        })
        .unwrap();
    let write = breakers
        .as_breaker("users", fast_config(10), |name: String| async move {
            Ok::<_, DownstreamError>(name.len())
        })
        .unwrap();

    assert!(Arc::ptr_eq(read.breaker(), write.breaker()));
    assert_eq!(read.breaker().config().max_failures, 2);

    assert_eq!(read.call(7).await.unwrap(), "user-7");
    let _ = read.call(0).await;
    let err = read.call(0).await.unwrap_err();
    assert!(err.is_tripped());

    // 共享的熔断器已打开
    let err = write.call("alice".to_string()).await.unwrap_err();
    assert!(err.is_tripped());
}

/// 测试报告汇总
#[tokio::test]
async fn test_breaker_box_report() {
    let breakers = BreakerBox::new();
    let payments = breakers.breaker("payments", fast_config(1)).unwrap();
    breakers.breaker("inventory", fast_config(5)).unwrap();

    trip(&payments).await;

    let report = breakers.report().await;
    assert_eq!(report.len(), 2);
    assert_eq!(report["payments"].status.state, BreakerState::Open);
    assert!(report["payments"].status.retry_at.is_some());
    assert_eq!(report["inventory"].status.state, BreakerState::Closed);
    assert_eq!(report["inventory"].threshold.max_failures, 5);
    assert_eq!(
        report["inventory"].threshold.frequency,
        Duration::from_secs(30)
    );
}

/// 测试自定义报告来源
#[tokio::test]
async fn test_collect_reports_from_trait_objects() {
    let a = create_breaker("a", 1);
    let b = create_breaker("b", 1);
    let sources: Vec<Arc<dyn Reportable>> = vec![a as Arc<dyn Reportable>, b];

    let reports = collect_reports(sources.iter().map(|source| source.as_ref())).await;
    assert_eq!(reports.len(), 2);
    assert!(reports.contains_key("a"));
    assert!(reports.contains_key("b"));
}

/// 测试从配置创建容器
#[tokio::test]
async fn test_breaker_box_from_config() {
    let config = BoxConfig {
        version: "1.0".to_string(),
        breakers: vec![
            BreakerSettings::new("search", 2),
            BreakerSettings {
                name: "checkout".to_string(),
                max_failures: 1,
                reset_period: "1m".to_string(),
                cooldown: "100ms".to_string(),
            },
        ],
    };

    let breakers = BreakerBox::from_config(&config).unwrap();
    assert_eq!(
        breakers.names(),
        vec!["checkout".to_string(), "search".to_string()]
    );

    let checkout = breakers.get("checkout").unwrap();
    assert_eq!(checkout.config().cooldown, Duration::from_millis(100));

    trip(&checkout).await;
    wait_for_cooldown().await;
    assert_eq!(checkout.state().await, BreakerState::HalfOpen);
}

/// 测试无效配置不会创建容器
#[test]
fn test_breaker_box_from_invalid_config() {
    let config = BoxConfig {
        version: "1.0".to_string(),
        breakers: vec![BreakerSettings::new("dup", 1), BreakerSettings::new("dup", 1)],
    };
    assert!(BreakerBox::from_config(&config).is_err());
}

/// 测试全局容器
#[tokio::test]
async fn test_global_breaker_box() {
    let breaker = GLOBAL_BREAKER_BOX
        .breaker("global-integration", fast_config(3))
        .unwrap();
    assert!(GLOBAL_BREAKER_BOX.contains("global-integration"));

    let again = GLOBAL_BREAKER_BOX
        .breaker("global-integration", fast_config(1))
        .unwrap();
    assert!(Arc::ptr_eq(&breaker, &again));

    let existing: Arc<CircuitBreaker> = GLOBAL_BREAKER_BOX.remove("global-integration").unwrap();
    assert!(Arc::ptr_eq(&existing, &breaker));
}
