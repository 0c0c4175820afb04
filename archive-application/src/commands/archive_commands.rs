use std::time::Duration;

use archive_domain::{current_millis, next_window, EventId, EventQuery};
use tracing::{debug, info, warn};

use crate::plan::{Feed, RunMode};
use crate::polling::{poll_window, StopReason, WindowOutcome};
use crate::{ArchiveError, ArchiveState};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub iterations: u64,
    pub pages: u64,
    pub events_received: u64,
    pub rows_committed: u64,
    pub unknown_skipped: u64,
    pub filtered_skipped: u64,
    pub last_stop: Option<StopReason>,
}

impl RunSummary {
    fn absorb(&mut self, outcome: &WindowOutcome) {
        self.iterations += 1;
        self.pages += outcome.pages;
        self.events_received += outcome.events_received;
        self.rows_committed += outcome.rows_committed;
        self.unknown_skipped += outcome.unknown_skipped;
        self.filtered_skipped += outcome.filtered_skipped;
        self.last_stop = Some(outcome.stop);
    }
}

pub async fn run_archive(state: &ArchiveState, mode: &RunMode) -> Result<RunSummary, ArchiveError> {
    match mode {
        RunMode::Bulk { query, cursor } => {
            let outcome = run_bulk(state, query, cursor.clone()).await?;
            let mut summary = RunSummary::default();
            summary.absorb(&outcome);
            Ok(summary)
        }
        RunMode::Perpetual {
            feed,
            poll_interval,
        } => run_perpetual(state, feed, *poll_interval).await,
    }
}

/// One pass over `query`. Cursor-paged queries without an explicit cursor resume from the
/// stored one.
pub async fn run_bulk(
    state: &ArchiveState,
    query: &EventQuery,
    cursor: Option<EventId>,
) -> Result<WindowOutcome, ArchiveError> {
    let cursor = match cursor {
        Some(cursor) => Some(cursor),
        None => stored_cursor(state, query).await?,
    };
    info!(query = %query, cursor = ?cursor, sinks = ?state.router.sink_names(), "bulk run starting");

    state.router.start_all().await?;
    let outcome = poll_window(state, query, cursor).await;
    let stopped = state.router.stop_all().await;
    let outcome = outcome?;
    stopped?;

    info!(
        stop = ?outcome.stop,
        pages = outcome.pages,
        events = outcome.events_received,
        rows = outcome.rows_committed,
        unknown = outcome.unknown_skipped,
        filtered = outcome.filtered_skipped,
        "bulk run finished"
    );
    Ok(outcome)
}

/// Keeps fetching newly appeared events until cancelled or the outer range is exhausted.
pub async fn run_perpetual(
    state: &ArchiveState,
    feed: &Feed,
    poll_interval: Duration,
) -> Result<RunSummary, ArchiveError> {
    if !state.router.redelivery_safe() {
        return Err(ArchiveError::Config(
            "perpetual mode needs sinks that tolerate re-delivery; use the database target"
                .to_string(),
        ));
    }
    let Some(high_water) = state.high_water.clone() else {
        return Err(ArchiveError::Config(
            "perpetual mode needs a durable high-water mark".to_string(),
        ));
    };
    if matches!(feed, Feed::Cursor(_)) && state.cursor_store.is_none() {
        return Err(ArchiveError::Config(
            "perpetual cursor mode needs a cursor store".to_string(),
        ));
    }

    let mut summary = RunSummary::default();
    while !state.shutdown.is_cancelled() {
        let (query, cursor, is_final) = match feed {
            Feed::Windows { outer, duration } => {
                let max = high_water.max_committed_timestamp(*outer).await?;
                let window =
                    next_window(max, *outer, duration.as_millis() as i64, current_millis())?;
                info!(window = %window.range, is_final = window.is_final, "next window");
                (EventQuery::TimeRange(window.range), None, window.is_final)
            }
            Feed::Cursor(query) => (*query, stored_cursor(state, query).await?, false),
        };

        state.router.start_all().await?;
        let outcome = poll_window(state, &query, cursor).await;
        let stopped = state.router.stop_all().await;
        let outcome = outcome?;
        stopped?;
        summary.absorb(&outcome);

        info!(
            iteration = summary.iterations,
            stop = ?outcome.stop,
            pages = outcome.pages,
            rows = outcome.rows_committed,
            total_rows = summary.rows_committed,
            "iteration finished"
        );
        debug!(metrics = %state.metrics.render_prometheus(), "archive metrics");

        if outcome.stop == StopReason::Cancelled || is_final {
            break;
        }
        let idle = outcome.no_more_data() || outcome.rows_committed == 0;
        if idle && !state.pause(poll_interval).await {
            break;
        }
    }
    Ok(summary)
}

async fn stored_cursor(
    state: &ArchiveState,
    query: &EventQuery,
) -> Result<Option<EventId>, ArchiveError> {
    if !query.is_cursor_paged() {
        return Ok(None);
    }
    let Some(store) = &state.cursor_store else {
        return Ok(None);
    };
    let cursor = store.load_cursor(&query.cursor_key()).await?;
    if cursor.is_none() {
        warn!(query = %query, "no stored cursor, starting from the beginning");
    }
    Ok(cursor)
}
