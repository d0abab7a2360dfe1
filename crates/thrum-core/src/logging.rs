//! `tracing` bootstrap.
//!
//! Called once from the `thrum-daemon` binary's `main`. Respects
//! `RUST_LOG`/`THRUM_LOG` for filter overrides and falls back to `info` for
//! the crate's own targets and `warn` for dependencies.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Output format for the process's log lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for interactive terminals.
    #[default]
    Pretty,
    /// Newline-delimited JSON, for log aggregation.
    Json,
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_env("THRUM_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info,thrum=debug"))
}

/// Install the global `tracing` subscriber.
///
/// Idempotent in the sense that calling it twice in the same process is a
/// logic error the caller should avoid (the second `set_global_default`
/// call fails silently and is ignored) — tests that need isolated logging
/// should use `tracing::subscriber::set_default` instead of this function.
pub fn init(format: LogFormat) {
    let filter = default_filter();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE);

    let result = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    if let Err(err) = result {
        eprintln!("tracing subscriber already initialized: {err}");
    }
}
