use std::sync::atomic::{AtomicU64, Ordering};

use crate::retry::RetryCause;

#[derive(Debug, Default)]
pub struct Metrics {
    pages: AtomicU64,
    events_received: AtomicU64,
    /// Summed over sinks, like [`crate::Saved::committed`].
    rows_committed: AtomicU64,
    unknown_skipped: AtomicU64,
    filtered_skipped: AtomicU64,
    transient_retries: AtomicU64,
    rate_limited_retries: AtomicU64,
    overload_retries: AtomicU64,
}

impl Metrics {
    pub fn record_page(&self, events: u64, rows: u64) {
        self.pages.fetch_add(1, Ordering::Relaxed);
        self.events_received.fetch_add(events, Ordering::Relaxed);
        self.rows_committed.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn record_skipped(&self, unknown: u64, filtered: u64) {
        self.unknown_skipped.fetch_add(unknown, Ordering::Relaxed);
        self.filtered_skipped.fetch_add(filtered, Ordering::Relaxed);
    }

    pub fn record_retry(&self, cause: RetryCause) {
        let counter = match cause {
            RetryCause::Transient => &self.transient_retries,
            RetryCause::RateLimited => &self.rate_limited_retries,
            RetryCause::Overloaded => &self.overload_retries,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rows_committed(&self) -> u64 {
        self.rows_committed.load(Ordering::Relaxed)
    }

    pub fn render_prometheus(&self) -> String {
        let pages = self.pages.load(Ordering::Relaxed);
        let events = self.events_received.load(Ordering::Relaxed);
        let rows = self.rows_committed.load(Ordering::Relaxed);
        let unknown = self.unknown_skipped.load(Ordering::Relaxed);
        let filtered = self.filtered_skipped.load(Ordering::Relaxed);
        let transient = self.transient_retries.load(Ordering::Relaxed);
        let rate_limited = self.rate_limited_retries.load(Ordering::Relaxed);
        let overloaded = self.overload_retries.load(Ordering::Relaxed);

        format!(
            "# TYPE sui_archive_pages_total counter\n\
sui_archive_pages_total {}\n\
# TYPE sui_archive_events_received_total counter\n\
sui_archive_events_received_total {}\n\
# TYPE sui_archive_rows_committed_total counter\n\
sui_archive_rows_committed_total {}\n\
# TYPE sui_archive_skipped_total counter\n\
sui_archive_skipped_total{{reason=\"unknown\"}} {}\n\
sui_archive_skipped_total{{reason=\"filtered\"}} {}\n\
# TYPE sui_archive_retries_total counter\n\
sui_archive_retries_total{{cause=\"transient\"}} {}\n\
sui_archive_retries_total{{cause=\"rate_limited\"}} {}\n\
sui_archive_retries_total{{cause=\"overloaded\"}} {}\n",
            pages, events, rows, unknown, filtered, transient, rate_limited, overloaded
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_counters() {
        let metrics = Metrics::default();
        metrics.record_page(3, 2);
        metrics.record_skipped(1, 0);
        metrics.record_retry(RetryCause::RateLimited);

        let text = metrics.render_prometheus();
        assert!(text.contains("sui_archive_pages_total 1\n"));
        assert!(text.contains("sui_archive_rows_committed_total 2\n"));
        assert!(text.contains("sui_archive_skipped_total{reason=\"unknown\"} 1\n"));
        assert!(text.contains("sui_archive_retries_total{cause=\"rate_limited\"} 1\n"));
        assert_eq!(metrics.rows_committed(), 2);
    }
}
