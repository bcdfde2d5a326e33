//! Structured logging setup for alpine-autobuild
//!
//! Logs go to stderr through the `tracing` ecosystem so that command output on stdout
//! (plans, stats) stays machine readable. The subscriber can only be installed once per
//! process; later calls are ignored.
//!
//! # Environment Variables
//!
//! - `ALPINE_AUTOBUILD_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//! - `ALPINE_AUTOBUILD_LOG_JSON`: emit JSON lines instead of console output
//! - `RUST_LOG`: standard filtering, layered under the crate level

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

const CRATE_TARGET: &str = "alpine_autobuild";

/// Noisy dependencies held at `warn` unless `RUST_LOG` says otherwise.
const QUIET_TARGETS: &[&str] = &["h2", "hyper", "hyper_util", "reqwest", "bollard"];

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,

    /// JSON lines, for CI log collectors
    pub use_json: bool,

    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }
}

/// Parses a log level, case-insensitively. Unknown values fall back to `INFO`.
///
/// ```
/// use alpine_autobuild::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("DEBUG"), Level::DEBUG);
/// assert_eq!(parse_level("loud"), Level::INFO);
/// ```
pub fn parse_level(level_str: &str) -> Level {
    match level_str.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

fn directive(spec: String) -> Option<Directive> {
    spec.parse().ok()
}

fn build_filter(level: Level, rust_log_set: bool) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env();
    if let Some(d) = directive(format!("{}={}", CRATE_TARGET, level)) {
        filter = filter.add_directive(d);
    }

    if !rust_log_set {
        for target in QUIET_TARGETS {
            if let Some(d) = directive(format!("{}=warn", target)) {
                filter = filter.add_directive(d);
            }
        }
    }

    filter
}

pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = build_filter(config.level, env::var("RUST_LOG").is_ok());

        // try_init: a test harness may already own the global subscriber
        if config.use_json {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target),
                )
                .try_init();
        } else {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target),
                )
                .try_init();
        }
    });
}

/// Reads `ALPINE_AUTOBUILD_LOG_LEVEL` and `ALPINE_AUTOBUILD_LOG_JSON`.
pub fn config_from_env() -> LoggingConfig {
    let level = env::var("ALPINE_AUTOBUILD_LOG_LEVEL")
        .map(|v| parse_level(&v))
        .unwrap_or(Level::INFO);

    let use_json = env::var("ALPINE_AUTOBUILD_LOG_JSON")
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false);

    LoggingConfig {
        level,
        use_json,
        ..Default::default()
    }
}

pub fn init_from_env() {
    init_logging(config_from_env());
}
