//! Process-wide counters and tracing span helpers.
//!
//! Counters are plain atomics behind a `Lazy` static so they cost nothing to record and can
//! be read back as a [`MetricsSnapshot`] (the CLI prints one with `--verbose`).

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub static METRICS: Lazy<SteeltrackMetrics> = Lazy::new(SteeltrackMetrics::default);

#[derive(Debug, Default)]
pub struct SteeltrackMetrics {
    queries_total: AtomicU64,
    query_errors_total: AtomicU64,
    query_micros_total: AtomicU64,
    decrypt_fallbacks_total: AtomicU64,
    rows_imported_total: AtomicU64,
}

/// Point-in-time copy of [`SteeltrackMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queries_total: u64,
    pub query_errors_total: u64,
    pub query_time: Duration,
    pub decrypt_fallbacks_total: u64,
    pub rows_imported_total: u64,
}

impl SteeltrackMetrics {
    pub fn record_query(&self, elapsed: Duration) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.query_micros_total.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn record_query_error(&self) {
        self.query_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    /// A sensitive value could not be decrypted and was returned as stored
    pub fn record_decrypt_fallback(&self) {
        self.decrypt_fallbacks_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rows_imported(&self, rows: u64) {
        self.rows_imported_total.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_total: self.queries_total.load(Ordering::Relaxed),
            query_errors_total: self.query_errors_total.load(Ordering::Relaxed),
            query_time: Duration::from_micros(self.query_micros_total.load(Ordering::Relaxed)),
            decrypt_fallbacks_total: self.decrypt_fallbacks_total.load(Ordering::Relaxed),
            rows_imported_total: self.rows_imported_total.load(Ordering::Relaxed),
        }
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{info_span, Span};

    /// Span around a single statement; long statements are cut to keep spans readable
    pub fn execute_query_span(sql: &str) -> Span {
        let sql = sql.trim();
        let shown = match sql.char_indices().nth(120) {
            Some((idx, _)) => &sql[..idx],
            None => sql,
        };
        info_span!("steeltrack.query", db.system = "sqlite", db.statement = shown)
    }

    pub fn begin_transaction_span(depth: u32) -> Span {
        info_span!("steeltrack.transaction", depth)
    }

    pub fn migration_span(version: i64, name: &str) -> Span {
        info_span!("steeltrack.migration", version, name)
    }

    pub fn import_span(kind: &str, import_id: &uuid::Uuid) -> Span {
        info_span!("steeltrack.import", kind, import_id = %import_id)
    }

    /// Install a `fmt` subscriber that prints each closed span with its timing on stderr.
    ///
    /// Returns `false` when a global subscriber was already installed.
    pub fn init_fmt_subscriber() -> bool {
        use tracing_subscriber::fmt::format::FmtSpan;
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    }
}
