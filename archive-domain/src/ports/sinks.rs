use async_trait::async_trait;

use crate::entities::SuiEvent;
use crate::value_objects::{EventId, TimeRange};

/// Durable destination for decoded events.
#[async_trait]
pub trait EventSink: Send + Sync {
    fn name(&self) -> &str;

    /// Whether saving the same event twice leaves a single row and counts it once.
    fn redelivery_safe(&self) -> bool;

    async fn start(&self) -> anyhow::Result<()>;

    /// Persists one page worth of events and returns the number of rows newly committed.
    /// Zero for a non-empty batch means every event was already stored.
    async fn save(&self, events: &[SuiEvent]) -> anyhow::Result<u64>;

    async fn stop(&self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait HighWaterMark: Send + Sync {
    /// Largest committed event timestamp in milliseconds, optionally restricted to `[start, end)`.
    async fn max_committed_timestamp(&self, within: Option<TimeRange>)
        -> anyhow::Result<Option<i64>>;
}

#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn load_cursor(&self, query_key: &str) -> anyhow::Result<Option<EventId>>;
    async fn save_cursor(&self, query_key: &str, cursor: &EventId) -> anyhow::Result<()>;
}
