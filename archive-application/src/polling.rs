// Polling engine
// Drives one query to completion: call, classify, decode, save, advance.

use archive_domain::{Decoded, EventId, EventPage, EventQuery, SuiEvent, GET_EVENTS_METHOD};
use tracing::{debug, info, warn};

use crate::retry::Disposition;
use crate::router::Saved;
use crate::{ArchiveError, ArchiveState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Events were routed to sinks but none committed a new row: everything from here on is
    /// already stored.
    CaughtUp,
    /// The node returned no next cursor.
    EndOfCursor,
    NoMorePages,
    /// The node answered -32602 for the current cursor.
    NoMoreData,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowOutcome {
    pub stop: StopReason,
    pub pages: u64,
    pub events_received: u64,
    pub rows_committed: u64,
    pub unknown_skipped: u64,
    pub filtered_skipped: u64,
    pub last_cursor: Option<EventId>,
}

impl WindowOutcome {
    fn new(cursor: Option<EventId>) -> Self {
        Self {
            stop: StopReason::EndOfCursor,
            pages: 0,
            events_received: 0,
            rows_committed: 0,
            unknown_skipped: 0,
            filtered_skipped: 0,
            last_cursor: cursor,
        }
    }

    pub fn no_more_data(&self) -> bool {
        self.stop == StopReason::NoMoreData
    }

    fn finish(mut self, stop: StopReason) -> Self {
        self.stop = stop;
        self
    }
}

/// Pages through `query` starting after `cursor` until a stop condition is reached.
pub async fn poll_window(
    state: &ArchiveState,
    query: &EventQuery,
    cursor: Option<EventId>,
) -> Result<WindowOutcome, ArchiveError> {
    let mut outcome = WindowOutcome::new(cursor.clone());
    let mut cursor = cursor;

    loop {
        if state.shutdown.is_cancelled() {
            return Ok(outcome.finish(StopReason::Cancelled));
        }

        let params = query.params(cursor.as_ref(), state.page_limit);
        let result = match state.source.call(GET_EVENTS_METHOD, params).await {
            Ok(result) => result,
            Err(err) => match state.retry.classify(&err) {
                Disposition::NoMoreData => {
                    debug!(cursor = ?cursor, "no more data");
                    return Ok(outcome.finish(StopReason::NoMoreData));
                }
                Disposition::Retry { cause, delay } => {
                    state.metrics.record_retry(cause);
                    warn!(?cause, delay_ms = delay.as_millis() as u64, "retrying call: {}", err);
                    if !delay.is_zero() && !state.pause(delay).await {
                        return Ok(outcome.finish(StopReason::Cancelled));
                    }
                    continue;
                }
                Disposition::Fatal => return Err(ArchiveError::Protocol(err.to_string())),
            },
        };

        let page =
            EventPage::from_result(result).map_err(|err| ArchiveError::Protocol(err.to_string()))?;

        let mut batch: Vec<SuiEvent> = Vec::with_capacity(page.records.len());
        let mut unknown = 0;
        let mut filtered = 0;
        for record in page.records {
            match state.registry.decode_record(record)? {
                Decoded::Event(event) => batch.push(event),
                Decoded::Unknown(tag) => {
                    debug!(tag = %tag, "skipping unknown event");
                    unknown += 1;
                }
                Decoded::Filtered(_) => filtered += 1,
            }
        }

        let saved = if batch.is_empty() {
            Saved::default()
        } else {
            state.router.save(&batch).await?
        };
        let rows = saved.committed;
        let unrouted = batch.len() as u64 - saved.routed;
        if unrouted > 0 {
            debug!(unrouted, "no sink accepts these events");
            filtered += unrouted;
        }

        outcome.pages += 1;
        outcome.events_received += batch.len() as u64;
        outcome.rows_committed += rows;
        outcome.unknown_skipped += unknown;
        outcome.filtered_skipped += filtered;
        state.metrics.record_page(batch.len() as u64, rows);
        state.metrics.record_skipped(unknown, filtered);

        if let Some(next) = &page.next_cursor {
            if query.is_cursor_paged() {
                if let Some(store) = &state.cursor_store {
                    store.save_cursor(&query.cursor_key(), next).await?;
                }
            }
            outcome.last_cursor = Some(next.clone());
        }
        info!(
            page = outcome.pages,
            events = batch.len(),
            rows,
            next_cursor = ?page.next_cursor,
            has_more = page.has_more,
            "page committed"
        );

        if saved.routed > 0 && rows == 0 {
            return Ok(outcome.finish(StopReason::CaughtUp));
        }
        let Some(next) = page.next_cursor else {
            return Ok(outcome.finish(StopReason::EndOfCursor));
        };
        if !page.has_more {
            return Ok(outcome.finish(StopReason::NoMorePages));
        }
        cursor = Some(next);
    }
}
