//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Centralized configuration constants for Breakeron.
//!
//! All default values used by the runtime and file configuration are defined here.

// ============================================================================
// Circuit Breaker Constants
// ============================================================================

/// Default reset period (30 seconds).
///
/// A closed breaker with no recorded failure for this long clears its failure counter.
pub const DEFAULT_RESET_PERIOD_SECS: u64 = 30;

/// Default cooldown (30 seconds).
///
/// How long the breaker remains open before allowing a single exploratory call.
pub const DEFAULT_COOLDOWN_SECS: u64 = 30;

/// Default reset period as written in configuration files.
pub const DEFAULT_RESET_PERIOD: &str = "30s";

/// Default cooldown as written in configuration files.
pub const DEFAULT_COOLDOWN: &str = "30s";

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default configuration file version.
pub const DEFAULT_CONFIG_VERSION: &str = "1.0";

/// Maximum length of a breaker name.
///
/// Names appear in logs, metric labels and trip messages.
pub const MAX_BREAKER_NAME_LENGTH: usize = 128;
