//! Tracing subscriber initialization with structured logging.
//!
//! # Usage
//!
//! ```no_run
//! // Human-readable output at info level unless RUST_LOG says otherwise
//! persona_observe::tracing_setup::init_tracing(false, "info").unwrap();
//!
//! // One JSON object per line, for log shippers
//! persona_observe::tracing_setup::init_tracing(true, "info").unwrap();
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the global tracing subscriber.
///
/// - `RUST_LOG` wins when set; otherwise `default_directive` applies
///   (e.g. `"info"` or `"persona_core=debug,info"`).
/// - `json` switches the fmt layer to newline-delimited JSON with the current
///   span flattened into each event.
/// - Span close events are emitted so `gen_ai.chat` latency shows up in logs.
///
/// # Errors
///
/// Returns an error if the directive is invalid or a global subscriber has
/// already been set.
pub fn init_tracing(json: bool, default_directive: &str) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive)?,
    };

    if json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}

/// Map a `-v` count onto a default filter directive.
pub fn directive_for_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_for_verbosity() {
        assert_eq!(directive_for_verbosity(0), "info");
        assert_eq!(directive_for_verbosity(1), "debug");
        assert_eq!(directive_for_verbosity(4), "trace");
    }

    #[test]
    fn test_directives_parse() {
        for verbose in 0..3 {
            assert!(EnvFilter::try_new(directive_for_verbosity(verbose)).is_ok());
        }
    }
}
