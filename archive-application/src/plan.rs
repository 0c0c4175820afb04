use std::fmt;
use std::time::Duration;

use archive_domain::{EventId, EventQuery, TimeRange};

/// What a perpetual run fetches on each iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feed {
    /// Consecutive time windows computed from the high-water mark.
    Windows {
        outer: Option<TimeRange>,
        duration: Duration,
    },
    /// A cursor-paged query resumed from its stored cursor.
    Cursor(EventQuery),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Bulk {
        query: EventQuery,
        cursor: Option<EventId>,
    },
    Perpetual {
        feed: Feed,
        poll_interval: Duration,
    },
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Bulk { query, cursor } => {
                write!(f, "bulk {}", query)?;
                if let Some(cursor) = cursor {
                    write!(f, " after {}", cursor)?;
                }
                Ok(())
            }
            RunMode::Perpetual {
                feed: Feed::Windows { outer, duration },
                poll_interval,
            } => {
                write!(f, "perpetual windows of {}s", duration.as_secs())?;
                if let Some(outer) = outer {
                    write!(f, " within {}", outer)?;
                }
                write!(f, ", polling every {}s", poll_interval.as_secs())
            }
            RunMode::Perpetual {
                feed: Feed::Cursor(query),
                poll_interval,
            } => write!(
                f,
                "perpetual {}, polling every {}s",
                query,
                poll_interval.as_secs()
            ),
        }
    }
}
