//! Structured logging setup
//!
//! Initializes a `tracing` subscriber with an `EnvFilter`, optionally emitting
//! JSON lines. Initialization happens at most once per process.
//!
//! # Example
//!
//! ```no_run
//! use rootscope_core::logging;
//!
//! logging::init_from_env();
//! tracing::info!(trace_id = "1-5f84c7a1-3f1c", "Investigation requested");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Crates whose chatter is capped at `warn` unless `RUST_LOG` says otherwise
const NOISY_TARGETS: [&str; 3] = ["h2", "hyper", "reqwest"];

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    /// Emit JSON lines instead of human-readable output
    pub use_json: bool,
    pub include_target: bool,
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
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

    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            use_json: true,
            include_target: true,
            include_location: true,
        }
    }
}

/// Parses a log level, falling back to INFO for unknown values.
pub fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
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

fn build_filter(level: Level) -> EnvFilter {
    if env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }

    let mut filter = EnvFilter::new(level.to_string());
    for target in NOISY_TARGETS {
        if let Ok(directive) = format!("{}=warn", target).parse() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

/// Logs go to stderr so report output on stdout stays machine-readable.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = build_filter(config.level);

        if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location),
                )
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location),
                )
                .init();
        }
    });
}

/// Reads `ROOTSCOPE_LOG_LEVEL` and `ROOTSCOPE_LOG_JSON`.
pub fn init_from_env() {
    let level_str = env::var("ROOTSCOPE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let use_json = env::var("ROOTSCOPE_LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    init_logging(LoggingConfig {
        level: parse_level(&level_str),
        use_json,
        ..Default::default()
    });
}
