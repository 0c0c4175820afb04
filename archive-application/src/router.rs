use std::sync::Arc;

use archive_domain::ports::EventSink;
use archive_domain::{EventKind, SuiEvent};
use tracing::{debug, error};

struct Route {
    sink: Arc<dyn EventSink>,
    kinds: Vec<EventKind>,
}

/// Outcome of routing one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Saved {
    /// Events of the batch that at least one sink accepts.
    pub routed: u64,
    /// Rows newly committed, summed over sinks: an event stored by two sinks counts twice.
    pub committed: u64,
}

/// Sends each event to every sink registered for its kind.
#[derive(Default)]
pub struct SinkRouter {
    routes: Vec<Route>,
}

impl SinkRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, sink: Arc<dyn EventSink>, kinds: &[EventKind]) -> Self {
        self.routes.push(Route {
            sink,
            kinds: kinds.to_vec(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn sink_names(&self) -> Vec<String> {
        self.routes
            .iter()
            .map(|route| route.sink.name().to_string())
            .collect()
    }

    /// True when every registered sink tolerates re-delivery.
    pub fn redelivery_safe(&self) -> bool {
        !self.routes.is_empty() && self.routes.iter().all(|route| route.sink.redelivery_safe())
    }

    pub async fn start_all(&self) -> anyhow::Result<()> {
        for route in &self.routes {
            route.sink.start().await?;
        }
        Ok(())
    }

    /// Stops every sink, reporting the first failure after all of them were attempted.
    pub async fn stop_all(&self) -> anyhow::Result<()> {
        let mut first_err = None;
        for route in &self.routes {
            if let Err(err) = route.sink.stop().await {
                error!(sink = route.sink.name(), "failed to stop sink: {:#}", err);
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn accepts(&self, kind: EventKind) -> bool {
        self.routes.iter().any(|route| route.kinds.contains(&kind))
    }

    /// Saves `events` in every sink routed for their kind. Events no sink accepts are dropped
    /// and left out of `routed`.
    pub async fn save(&self, events: &[SuiEvent]) -> anyhow::Result<Saved> {
        let routed = events
            .iter()
            .filter(|event| self.accepts(event.kind()))
            .count() as u64;
        let mut committed = 0;
        for route in &self.routes {
            let batch: Vec<SuiEvent> = events
                .iter()
                .filter(|event| route.kinds.contains(&event.kind()))
                .cloned()
                .collect();
            if batch.is_empty() {
                continue;
            }
            let rows = route.sink.save(&batch).await?;
            debug!(sink = route.sink.name(), events = batch.len(), rows, "batch saved");
            committed += rows;
        }
        Ok(Saved { routed, committed })
    }
}

#[cfg(test)]
mod tests {
    use archive_domain::EventId;

    use super::*;
    use crate::testing::{event, MemorySink};

    #[tokio::test]
    async fn routes_by_kind_and_sums_rows() {
        let moves = Arc::new(MemorySink::default());
        let everything = Arc::new(MemorySink::default());
        let router = SinkRouter::new()
            .route(moves.clone(), &[EventKind::MoveEvent])
            .route(everything.clone(), &EventKind::ALL);

        let batch = vec![
            event(EventKind::MoveEvent, "A", 0, 1),
            event(EventKind::Publish, "A", 1, 1),
        ];
        let saved = router.save(&batch).await.expect("save");
        assert_eq!(saved, Saved { routed: 2, committed: 3 });
        assert_eq!(moves.ids(), vec![EventId::new("A", 0)]);
        assert_eq!(everything.ids().len(), 2);

        let saved = router.save(&batch).await.expect("save");
        assert_eq!(saved, Saved { routed: 2, committed: 0 });
    }

    #[tokio::test]
    async fn events_without_a_route_are_not_counted_as_routed() {
        let publishes = Arc::new(MemorySink::append_only());
        let router = SinkRouter::new().route(publishes.clone(), &[EventKind::Publish]);
        assert!(router.accepts(EventKind::Publish));
        assert!(!router.accepts(EventKind::NewObject));

        let batch = vec![
            event(EventKind::NewObject, "A", 0, 1),
            event(EventKind::Publish, "A", 1, 1),
            event(EventKind::MoveEvent, "A", 2, 1),
        ];
        let saved = router.save(&batch).await.expect("save");
        assert_eq!(saved, Saved { routed: 1, committed: 1 });
        assert_eq!(publishes.ids(), vec![EventId::new("A", 1)]);

        let saved = router.save(&batch[..1]).await.expect("save");
        assert_eq!(saved, Saved::default());
    }

    #[tokio::test]
    async fn redelivery_safety_needs_every_sink() {
        let router = SinkRouter::new().route(Arc::new(MemorySink::default()), &EventKind::ALL);
        assert!(router.redelivery_safe());

        let router = router.route(Arc::new(MemorySink::append_only()), &EventKind::ALL);
        assert!(!router.redelivery_safe());
        assert!(!SinkRouter::new().redelivery_safe());
    }

    #[tokio::test]
    async fn start_and_stop_reach_every_sink() {
        let first = Arc::new(MemorySink::default());
        let second = Arc::new(MemorySink::default());
        let router = SinkRouter::new()
            .route(first.clone(), &EventKind::ALL)
            .route(second.clone(), &[EventKind::Publish]);

        router.start_all().await.expect("start");
        router.stop_all().await.expect("stop");
        assert_eq!(*first.starts.lock().expect("starts"), 1);
        assert_eq!(*second.stops.lock().expect("stops"), 1);
    }
}
