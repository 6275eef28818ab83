//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Breakeron - Async Circuit Breaker
//!
//! Wraps fallible async operations and fails fast once a dependency keeps failing.
//!
//! # API Layers
//!
//! ## Prelude (Quick Start)
//!
//! Use `use breakeron::prelude::*;` to import all commonly used types.
//!
//! ## Core API
//!
//! - [`CircuitBreaker`] - Guards calls and tracks failures
//! - [`BreakerConfig`] - Threshold, timing and error classification
//! - [`Deferred`] - A not-yet-started call handed to the breaker
//! - [`CallError`] / [`TripSignal`] - Results of a guarded call
//!
//! ## Registry
//!
//! - [`BreakerBox`] - Named breakers created once and reported together
//! - [`BoxConfig`] - File configuration for a breaker box (YAML/TOML/JSON)
//!
//! ## Extensions (feature-gated)
//!
//! - Tracing subscriber setup (requires `telemetry` feature)
//! - Prometheus metrics (requires `monitoring` feature)
//!
//! # Examples
//!
//! ```rust
//! use breakeron::prelude::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     // 连续失败3次后熔断，冷却10秒
//!     let config = BreakerConfig::new(3).cooldown(Duration::from_secs(10));
//!     let breaker = CircuitBreaker::new("payments", config).unwrap();
//!
//!     let result = breaker
//!         .call(|| async { Ok::<_, std::io::Error>(42) })
//!         .await;
//!     assert_eq!(result.unwrap(), 42);
//!     assert_eq!(breaker.state().await, BreakerState::Closed);
//! }
//! ```
//!
//! # Features
//!
//! - **Lazy state transitions**: no background timers, time is evaluated on every locked operation
//! - **Cascading trips**: a trip signal from a downstream breaker trips the caller immediately
//! - **Error classification**: `record_only` type sets and `process_exception` filters
//! - **Shared locks**: several breakers can serialize on one lock

pub mod prelude;

pub mod breaker_box;
pub mod circuit_breaker;
pub mod config;
pub mod constants;
pub mod deferred;
pub mod error;
pub mod guard;
#[cfg(feature = "monitoring")]
pub mod monitoring;
pub mod report;
pub mod state;
#[cfg(feature = "telemetry")]
pub mod telemetry;

// 重新导出常用类型
pub use breaker_box::{collect_reports, BreakerBox, GLOBAL_BREAKER_BOX};
pub use circuit_breaker::{BreakerConfig, BreakerLock, CircuitBreaker, ExceptionFilter, RecordOnly};
pub use config::{parse_duration, BoxConfig, BreakerSettings};
pub use deferred::{Deferred, DeferredHandle, DeferredState};
pub use error::{BreakerError, CallError, TripSignal};
pub use guard::{guard, Guarded};
#[cfg(feature = "monitoring")]
pub use monitoring::{set_global_metrics, try_global, BreakerMetrics};
pub use report::{BreakerReport, Reportable, Status, Threshold};
pub use state::{BreakerState, CircuitState};
#[cfg(feature = "telemetry")]
pub use telemetry::init_tracing;
