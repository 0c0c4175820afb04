use std::sync::Arc;

use archive_domain::ports::{CursorStore, EventSource, HighWaterMark};
use archive_domain::SchemaRegistry;
use tokio_util::sync::CancellationToken;

use crate::retry::RetryPolicy;
use crate::{Metrics, SinkRouter};

/// Everything a run needs, wired once by the binary.
#[derive(Clone)]
pub struct ArchiveState {
    pub source: Arc<dyn EventSource>,
    pub router: Arc<SinkRouter>,
    pub high_water: Option<Arc<dyn HighWaterMark>>,
    pub cursor_store: Option<Arc<dyn CursorStore>>,
    pub registry: SchemaRegistry,
    pub retry: RetryPolicy,
    pub page_limit: Option<u32>,
    pub metrics: Arc<Metrics>,
    pub shutdown: CancellationToken,
}

impl ArchiveState {
    /// Sleeps for `duration` unless shutdown is requested first. Returns false when interrupted.
    pub async fn pause(&self, duration: std::time::Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
