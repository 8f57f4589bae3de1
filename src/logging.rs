//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Environment variable that overrides the configured log filter.
pub const LOG_ENV: &str = "SWINGTRADER_LOG";

/// Filter directive: the environment wins over `[log] level`.
pub fn filter_directive(level: &str) -> String {
    std::env::var(LOG_ENV).unwrap_or_else(|_| level.to_string())
}

/// Installs the global fmt subscriber. `format` is `text` or `json`.
/// Events go to stderr so command output on stdout stays clean. A
/// subscriber installed earlier in the process is kept.
pub fn init_tracing(level: &str, format: &str) -> Result<(), String> {
    let env_filter = EnvFilter::try_new(filter_directive(level))
        .map_err(|err| format!("invalid log filter: {err}"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    let installed = if format.trim().eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if installed.is_err() {
        tracing::debug!("global subscriber already installed");
    }
    Ok(())
}
