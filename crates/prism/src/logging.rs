//! Logging setup.
//!
//! Logs go to stderr; stdout carries result payloads. Each stage invocation
//! runs inside a `stage` span and ends with one info (success) or warn
//! (failure) event holding its redacted telemetry.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter directive for a configured level.
///
/// `--verbose` raises anything quieter than debug to debug. Unknown levels
/// fall back to info.
fn default_directive(level: &str, verbose: bool) -> &'static str {
    match (level.to_lowercase().as_str(), verbose) {
        ("trace", _) => "trace",
        (_, true) | ("debug", _) => "debug",
        ("warn", _) => "warn",
        ("error", _) => "error",
        _ => "info",
    }
}

/// Initialize the global subscriber. `RUST_LOG` overrides the level.
pub fn init(level: &str, verbose: bool, json_format: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level, verbose)));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Initialize logging from the `[logging]` section, with CLI overrides.
pub fn init_from_config(config: &prism_core::Config, verbose: bool, json_logs: bool) {
    let json_format = json_logs || config.logging.format.eq_ignore_ascii_case("json");
    init(&config.logging.level, verbose, json_format);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive("info", false), "info");
        assert_eq!(default_directive("WARN", false), "warn");
        assert_eq!(default_directive("warn", true), "debug");
        assert_eq!(default_directive("trace", true), "trace");
        assert_eq!(default_directive("loud", false), "info");
    }
}
