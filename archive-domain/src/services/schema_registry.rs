use serde_json::Value;
use thiserror::Error;

use crate::entities::{PageRecord, SuiEvent};
use crate::services::flatten::flatten_except;
use crate::value_objects::{EventId, EventKind};

/// Attributes declared as documents rather than scalars.
const DOCUMENT_ATTRIBUTES: &[&str] = &["fields"];

#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Event(SuiEvent),
    /// A tag outside the known set, e.g. `epochChange` or `checkpoint`.
    Unknown(String),
    /// A known kind excluded by the registry's filter.
    Filtered(EventKind),
}

#[derive(Debug, Error)]
#[error("cannot decode {kind} event {id}: {source}")]
pub struct DecodeError {
    pub id: EventId,
    pub kind: EventKind,
    #[source]
    pub source: serde_json::Error,
}

/// Maps page records to typed events.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaRegistry {
    only: Option<EventKind>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts decoding to `kind`; other known kinds come back as [`Decoded::Filtered`].
    pub fn only(kind: EventKind) -> Self {
        Self { only: Some(kind) }
    }

    pub fn filter(&self) -> Option<EventKind> {
        self.only
    }

    pub fn decode(
        &self,
        tag: &str,
        document: Value,
        id: &EventId,
        timestamp: i64,
    ) -> Result<Decoded, DecodeError> {
        let Some(kind) = EventKind::from_tag(tag) else {
            return Ok(Decoded::Unknown(tag.to_string()));
        };
        if self.only.is_some_and(|only| only != kind) {
            return Ok(Decoded::Filtered(kind));
        }

        let payload = flatten_except(document, DOCUMENT_ATTRIBUTES);
        let mut event = SuiEvent::decode(kind, payload).map_err(|source| DecodeError {
            id: id.clone(),
            kind,
            source,
        })?;
        event.stamp(id, timestamp);
        Ok(Decoded::Event(event))
    }

    pub fn decode_record(&self, record: PageRecord) -> Result<Decoded, DecodeError> {
        self.decode(&record.tag, record.payload, &record.id, record.timestamp)
    }
}
