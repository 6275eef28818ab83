//! Prelude module - Commonly used types for quick imports
//!
//! This module re-exports the most commonly used types from Breakeron,
//! allowing users to import them with a single `use breakeron::prelude::*;`
//! statement instead of importing each type individually.

// Core types - always available
pub use crate::circuit_breaker::{BreakerConfig, BreakerLock, CircuitBreaker, RecordOnly};
pub use crate::deferred::Deferred;
pub use crate::error::{BreakerError, CallError, TripSignal};
pub use crate::state::BreakerState;

// Registry and reporting
pub use crate::breaker_box::BreakerBox;
pub use crate::guard::{guard, Guarded};
pub use crate::report::{BreakerReport, Reportable};

// Feature-gated exports
#[cfg(feature = "monitoring")]
pub use crate::monitoring::BreakerMetrics;

#[cfg(feature = "telemetry")]
pub use crate::telemetry::init_tracing;
