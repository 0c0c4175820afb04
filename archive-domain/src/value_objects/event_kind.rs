// Event kind value object

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of event variants this archiver stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    TransferObject,
    Publish,
    CoinBalanceChange,
    MoveEvent,
    MutateObject,
    DeleteObject,
    NewObject,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::TransferObject,
        EventKind::Publish,
        EventKind::CoinBalanceChange,
        EventKind::MoveEvent,
        EventKind::MutateObject,
        EventKind::DeleteObject,
        EventKind::NewObject,
    ];

    /// Discriminant key wrapping the payload in a page record.
    pub fn tag(&self) -> &'static str {
        match self {
            EventKind::TransferObject => "transferObject",
            EventKind::Publish => "publish",
            EventKind::CoinBalanceChange => "coinBalanceChange",
            EventKind::MoveEvent => "moveEvent",
            EventKind::MutateObject => "mutateObject",
            EventKind::DeleteObject => "deleteObject",
            EventKind::NewObject => "newObject",
        }
    }

    /// Name the node expects in an `EventType` query.
    pub fn query_name(&self) -> &'static str {
        match self {
            EventKind::TransferObject => "TransferObject",
            EventKind::Publish => "Publish",
            EventKind::CoinBalanceChange => "CoinBalanceChange",
            EventKind::MoveEvent => "MoveEvent",
            EventKind::MutateObject => "MutateObject",
            EventKind::DeleteObject => "DeleteObject",
            EventKind::NewObject => "NewObject",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            EventKind::TransferObject => "transfer_object_event",
            EventKind::Publish => "publish_event",
            EventKind::CoinBalanceChange => "coin_balance_change_event",
            EventKind::MoveEvent => "move_event",
            EventKind::MutateObject => "mutate_object_event",
            EventKind::DeleteObject => "delete_object_event",
            EventKind::NewObject => "new_object_event",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for EventKind {
    type Err = String;

    /// Accepts the record tag, the query name or the table name, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| {
                kind.tag().eq_ignore_ascii_case(wanted)
                    || kind.query_name().eq_ignore_ascii_case(wanted)
                    || kind.table().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| format!("unknown event type: {}", wanted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(EventKind::from_tag("epochChange"), None);
        assert_eq!(EventKind::from_tag("MoveEvent"), None);
    }

    #[test]
    fn parses_any_naming() {
        assert_eq!("moveEvent".parse::<EventKind>(), Ok(EventKind::MoveEvent));
        assert_eq!("MoveEvent".parse::<EventKind>(), Ok(EventKind::MoveEvent));
        assert_eq!(" coin_balance_change_event ".parse::<EventKind>(), Ok(EventKind::CoinBalanceChange));
        assert!("checkpoint".parse::<EventKind>().is_err());
    }
}
