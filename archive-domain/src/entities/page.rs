// Page entity
// One `sui_getEvents` result, reduced to what the ingestion engine needs.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::utils::i64_from_number_or_string;
use crate::value_objects::EventId;

#[derive(Debug, Error)]
#[error("malformed page: {0}")]
pub struct MalformedPage(pub String);

#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    pub id: EventId,
    pub timestamp: i64,
    /// Discriminant key of the event, e.g. `moveEvent`.
    pub tag: String,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventPage {
    /// In delivery order.
    pub records: Vec<PageRecord>,
    /// `None` when the node returned null or the zero cursor.
    pub next_cursor: Option<EventId>,
    pub has_more: bool,
}

#[derive(Deserialize)]
struct RawPage {
    data: Vec<RawRecord>,
    #[serde(rename = "nextCursor", default)]
    next_cursor: Option<EventId>,
    #[serde(rename = "hasMore", default)]
    has_more: Option<bool>,
}

#[derive(Deserialize)]
struct RawRecord {
    #[serde(deserialize_with = "i64_from_number_or_string")]
    timestamp: i64,
    id: EventId,
    event: Map<String, Value>,
}

impl EventPage {
    pub fn from_result(result: Value) -> Result<Self, MalformedPage> {
        let raw: RawPage =
            serde_json::from_value(result).map_err(|err| MalformedPage(err.to_string()))?;

        let mut records = Vec::with_capacity(raw.data.len());
        for record in raw.data {
            let Some((tag, payload)) = record.event.into_iter().next() else {
                return Err(MalformedPage(format!("event {} has no variant", record.id)));
            };
            records.push(PageRecord {
                id: record.id,
                timestamp: record.timestamp,
                tag,
                payload,
            });
        }

        let next_cursor = raw.next_cursor.and_then(EventId::non_zero);
        let has_more = raw.has_more.unwrap_or(next_cursor.is_some());
        Ok(Self {
            records,
            next_cursor,
            has_more,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
