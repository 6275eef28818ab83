//! 级联熔断端到端测试
//!
//! 场景：api 熔断器调用 db 熔断器保护的操作。db 熔断后，
//! api 立即熔断，并在 db 的重试时间之后再冷却一段时间。

use crate::common::*;
use breakeron::{BreakerBox, BreakerState, CallError, RecordOnly, TripSignal};
use std::error::Error as StdError;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_downstream_trip_cascades_upstream() {
    init_test_logging();
    let breakers = BreakerBox::new();
    let db = breakers.breaker("db", fast_config(1)).unwrap();
    let api = breakers.breaker("api", fast_config(5)).unwrap();

    let db_calls = Arc::new(AtomicU32::new(0));

    let query = {
        let db = Arc::clone(&db);
        let db_calls = Arc::clone(&db_calls);
        move || async move {
            db.call(move || async move {
                db_calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(DownstreamError("connection refused".to_string()))
            })
            .await
        }
    };

    // db 第一次失败即熔断，api 收到熔断信号后立即熔断
    let err = api.call(query.clone()).await.unwrap_err();
    let api_signal = err.trip().unwrap().clone();
    assert_eq!(api_signal.name(), "api");

    let db_report = db.report().await;
    let db_retry_at = db_report.status.retry_at.unwrap();
    let expected = db_retry_at + chrono::TimeDelta::from_std(TEST_COOLDOWN).unwrap();
    assert_eq!(api_signal.retry_at(), expected);

    // 错误链：api 信号 -> db 的调用错误 -> db 信号 -> 原始错误
    let inner = TripSignal::find_in(api_signal.source().unwrap()).unwrap();
    assert_eq!(inner.name(), "db");
    assert_eq!(inner.retry_at(), db_retry_at);

    let api_report = api.report().await;
    assert_eq!(api_report.status.state, BreakerState::Open);
    assert_eq!(api_report.status.failures, 1);

    // api 打开时不再触达 db
    let err = api.call(query).await.unwrap_err();
    assert!(err.is_tripped());
    assert_eq!(db_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cascade_ignores_upstream_classifier() {
    let breakers = BreakerBox::new();
    let db = breakers.breaker("db", fast_config(1)).unwrap();
    // api 的过滤器拒绝所有错误，但级联熔断仍然生效
    let api = breakers
        .breaker("api", fast_config(5).process_exception(|_| false))
        .unwrap();

    let err = api
        .call({
            let db = Arc::clone(&db);
            move || async move {
                db.call(|| async { Err::<(), _>(DownstreamError("down".to_string())) })
                    .await
            }
        })
        .await
        .unwrap_err();

    assert!(err.is_tripped());
    let report = breakers.report().await;
    assert_eq!(report["db"].status.state, BreakerState::Open);
    assert_eq!(report["api"].status.state, BreakerState::Open);
}

#[tokio::test]
async fn test_non_tripping_downstream_failure_counts_normally() {
    let breakers = BreakerBox::new();
    let db = breakers.breaker("db", fast_config(3)).unwrap();
    let api = breakers.breaker("api", fast_config(2)).unwrap();

    for _ in 0..2 {
        let db = Arc::clone(&db);
        let result = api
            .call(move || async move { fail_once(&db).await })
            .await;
        if let Err(CallError::Failed(inner)) = &result {
            assert!(!inner.is_tripped());
        }
    }

    // db 只失败两次未熔断，api 按自身阈值熔断
    let report = breakers.report().await;
    assert_eq!(report["db"].status.state, BreakerState::Closed);
    assert_eq!(report["db"].status.failures, 2);
    assert_eq!(report["api"].status.state, BreakerState::Open);
}

#[tokio::test]
async fn test_type_scoped_upstream_counts_passed_through_failures() {
    let breakers = BreakerBox::new();
    let db = breakers.breaker("db", fast_config(100)).unwrap();
    let api = breakers
        .breaker(
            "api",
            fast_config(2).record_only(RecordOnly::of::<DownstreamError>()),
        )
        .unwrap();

    let mut results = Vec::new();
    for _ in 0..3 {
        let db = Arc::clone(&db);
        let result = api
            .call(move || async move { fail_once(&db).await })
            .await;
        results.push(result.unwrap_err().is_tripped());
    }

    // db 未熔断，原样透传的失败仍按 api 的类型范围计数
    assert_eq!(results, vec![false, true, true]);

    let report = breakers.report().await;
    assert_eq!(report["db"].status.state, BreakerState::Closed);
    assert_eq!(report["db"].status.failures, 2);
    assert_eq!(report["api"].status.state, BreakerState::Open);
    assert_eq!(report["api"].status.failures, 2);
}

#[tokio::test]
async fn test_type_scoped_upstream_ignores_other_failures() {
    let breakers = BreakerBox::new();
    let db = breakers.breaker("db", fast_config(100)).unwrap();
    let api = breakers
        .breaker(
            "api",
            fast_config(1).record_only(RecordOnly::of::<DownstreamError>()),
        )
        .unwrap();

    let db = Arc::clone(&db);
    let err = api
        .call(move || async move {
            db.call(|| async { Err::<(), _>(BadRequest("missing id".to_string())) })
                .await
        })
        .await
        .unwrap_err();

    assert!(!err.is_tripped());
    assert_eq!(api.state().await, BreakerState::Closed);
}
