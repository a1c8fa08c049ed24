use std::io::{self, IsTerminal};

use tracing::Level;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{Layer, filter, fmt};

/// Crate target prefix used to filter only library-originated logs.
pub const TARGET_PREFIX: &str = "ai_llm_service";

/// RFC3339 UTC timer, e.g. `2025-09-12T10:20:30Z`.
#[derive(Clone, Debug, Default)]
struct ChronoRfc3339Utc;

impl FormatTime for ChronoRfc3339Utc {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now();
        w.write_str(&now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
    }
}

/// Formatting layer that renders ONLY events emitted by this crate, up to `level`.
///
/// Uses a per-layer filter, so the binary's global filter must not drop
/// this crate's events before they reach it.
pub fn layer<S>(level: Level) -> impl Layer<S> + Send + Sync
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let use_ansi = io::stdout().is_terminal();

    let only_this_crate = filter::filter_fn(move |meta| {
        meta.target().starts_with(TARGET_PREFIX) && *meta.level() <= level
    });

    fmt::layer()
        .with_ansi(use_ansi)
        // span close carries durations of #[instrument]ed calls
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .event_format(
            fmt::format()
                .compact()
                .with_timer(ChronoRfc3339Utc)
                .with_level(true)
                .with_target(true)
                .with_source_location(true),
        )
        .with_filter(only_this_crate)
}
