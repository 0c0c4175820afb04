// Event identity value object

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::u64_from_number_or_string;

/// Position of one event in the remote stream: the transaction that emitted it and
/// the event's index inside that transaction. Doubles as the pagination cursor and as
/// the deduplication key of every persisted row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId {
    #[serde(rename = "txDigest")]
    pub tx_digest: String,
    #[serde(rename = "eventSeq", deserialize_with = "u64_from_number_or_string")]
    pub event_seq: u64,
}

impl EventId {
    pub fn new(tx_digest: impl Into<String>, event_seq: u64) -> Self {
        Self {
            tx_digest: tx_digest.into(),
            event_seq,
        }
    }

    /// The node reports `{"txDigest": "", "eventSeq": 0}` when it has no further cursor.
    pub fn is_zero(&self) -> bool {
        self.tx_digest.is_empty() && self.event_seq == 0
    }

    /// Maps the zero value to `None` so "absent" has a single representation.
    pub fn non_zero(self) -> Option<Self> {
        if self.is_zero() {
            None
        } else {
            Some(self)
        }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_digest, self.event_seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_numeric_and_textual_sequence() {
        let id: EventId =
            serde_json::from_value(json!({"txDigest": "Cmocd2cZ", "eventSeq": 9})).expect("id");
        assert_eq!(id, EventId::new("Cmocd2cZ", 9));

        let id: EventId =
            serde_json::from_value(json!({"txDigest": "Cmocd2cZ", "eventSeq": "9"})).expect("id");
        assert_eq!(id.event_seq, 9);
    }

    #[test]
    fn zero_cursor_is_absent() {
        assert_eq!(EventId::default().non_zero(), None);
        assert!(EventId::new("abc", 0).non_zero().is_some());
    }

    #[test]
    fn serializes_with_wire_names() {
        let value = serde_json::to_value(EventId::new("abc", 3)).expect("json");
        assert_eq!(value, json!({"txDigest": "abc", "eventSeq": 3}));
    }
}
