// Query builders for `sui_getEvents`

use std::fmt;

use serde_json::{json, Value};

use crate::value_objects::{EventId, EventKind, TimeRange};

pub const GET_EVENTS_METHOD: &str = "sui_getEvents";

/// One of the three mutually exclusive query modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventQuery {
    /// Bounded interval, used by bulk export and every perpetual window.
    TimeRange(TimeRange),
    /// A single variant, paged purely by cursor.
    EventType(EventKind),
    /// Every variant, paged purely by cursor.
    All,
}

impl EventQuery {
    pub fn payload(&self) -> Value {
        match self {
            EventQuery::TimeRange(range) => json!({ "TimeRange": range }),
            EventQuery::EventType(kind) => json!({ "EventType": kind.query_name() }),
            EventQuery::All => json!("All"),
        }
    }

    /// Positional params: `[query, cursor]`, or `[query, cursor, limit, descending]`
    /// when a page size is requested.
    pub fn params(&self, cursor: Option<&EventId>, limit: Option<u32>) -> Value {
        let cursor = cursor.map_or(Value::Null, |id| json!(id));
        match limit {
            Some(limit) => json!([self.payload(), cursor, limit, false]),
            None => json!([self.payload(), cursor]),
        }
    }

    /// Cursor-paged queries resume from a durable cursor; time ranges resume from
    /// the durable high-water timestamp instead.
    pub fn is_cursor_paged(&self) -> bool {
        !matches!(self, EventQuery::TimeRange(_))
    }

    /// Key under which the durable cursor of a cursor-paged query is stored.
    pub fn cursor_key(&self) -> String {
        match self {
            EventQuery::TimeRange(range) => format!("time_range:{}-{}", range.start_ms, range.end_ms),
            EventQuery::EventType(kind) => format!("event_type:{}", kind.tag()),
            EventQuery::All => "all".to_string(),
        }
    }
}

impl fmt::Display for EventQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventQuery::TimeRange(range) => write!(f, "time range {}", range),
            EventQuery::EventType(kind) => write!(f, "{} events", kind),
            EventQuery::All => f.write_str("all events"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_range_payload_matches_node_contract() {
        let query = EventQuery::TimeRange(TimeRange::new(1678169502291, 1678169602291));
        assert_eq!(
            query.params(None, None),
            json!([{"TimeRange": {"startTime": 1678169502291i64, "endTime": 1678169602291i64}}, null])
        );
    }

    #[test]
    fn cursor_and_limit_are_positional() {
        let cursor = EventId::new("Cmocd2cZ", 9);
        let query = EventQuery::EventType(EventKind::MoveEvent);
        assert_eq!(
            query.params(Some(&cursor), Some(100)),
            json!([{"EventType": "MoveEvent"}, {"txDigest": "Cmocd2cZ", "eventSeq": 9}, 100, false])
        );
        assert_eq!(EventQuery::All.params(None, None), json!(["All", null]));
    }

    #[test]
    fn only_time_ranges_are_window_paged() {
        assert!(!EventQuery::TimeRange(TimeRange::new(0, 1)).is_cursor_paged());
        assert!(EventQuery::All.is_cursor_paged());
        assert_eq!(EventQuery::EventType(EventKind::Publish).cursor_key(), "event_type:publish");
    }
}
