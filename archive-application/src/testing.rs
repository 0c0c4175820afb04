// In-memory ports shared by the engine and orchestrator tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use archive_domain::ports::{CursorStore, EventSink, EventSource, HighWaterMark};
use archive_domain::{CallError, EventId, EventKind, SchemaRegistry, SuiEvent, TimeRange};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::retry::RetryPolicy;
use crate::{ArchiveState, Metrics, SinkRouter};

/// Sink keyed by event id; `append_only` turns off deduplication.
#[derive(Default)]
pub struct MemorySink {
    pub append_only: bool,
    pub rows: Mutex<Vec<SuiEvent>>,
    pub starts: Mutex<u32>,
    pub stops: Mutex<u32>,
}

impl MemorySink {
    pub fn append_only() -> Self {
        Self {
            append_only: true,
            ..Self::default()
        }
    }

    pub fn ids(&self) -> Vec<EventId> {
        self.rows
            .lock()
            .expect("rows")
            .iter()
            .map(SuiEvent::id)
            .collect()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn redelivery_safe(&self) -> bool {
        !self.append_only
    }

    async fn start(&self) -> anyhow::Result<()> {
        *self.starts.lock().expect("starts") += 1;
        Ok(())
    }

    async fn save(&self, events: &[SuiEvent]) -> anyhow::Result<u64> {
        let mut rows = self.rows.lock().expect("rows");
        let mut seen: HashSet<EventId> = if self.append_only {
            HashSet::new()
        } else {
            rows.iter().map(SuiEvent::id).collect()
        };
        let mut committed = 0;
        for event in events {
            if seen.insert(event.id()) {
                rows.push(event.clone());
                committed += 1;
            }
        }
        Ok(committed)
    }

    async fn stop(&self) -> anyhow::Result<()> {
        *self.stops.lock().expect("stops") += 1;
        Ok(())
    }
}

#[async_trait]
impl HighWaterMark for MemorySink {
    async fn max_committed_timestamp(
        &self,
        within: Option<TimeRange>,
    ) -> anyhow::Result<Option<i64>> {
        Ok(self
            .rows
            .lock()
            .expect("rows")
            .iter()
            .map(SuiEvent::timestamp)
            .filter(|ts| within.map_or(true, |range| range.contains(*ts)))
            .max())
    }
}

#[derive(Default)]
pub struct MemoryCursorStore {
    pub cursors: Mutex<HashMap<String, EventId>>,
}

impl MemoryCursorStore {
    pub fn load_cursor_now(&self, query_key: &str) -> Option<EventId> {
        self.cursors.lock().expect("cursors").get(query_key).cloned()
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn load_cursor(&self, query_key: &str) -> anyhow::Result<Option<EventId>> {
        Ok(self.cursors.lock().expect("cursors").get(query_key).cloned())
    }

    async fn save_cursor(&self, query_key: &str, cursor: &EventId) -> anyhow::Result<()> {
        self.cursors
            .lock()
            .expect("cursors")
            .insert(query_key.to_string(), cursor.clone());
        Ok(())
    }
}

/// Replays scripted replies and records every call's params. Once the script runs out the
/// node reports -32602.
#[derive(Default)]
pub struct ScriptedSource {
    replies: Mutex<VecDeque<Result<Value, CallError>>>,
    pub calls: Mutex<Vec<Value>>,
}

impl ScriptedSource {
    pub fn new(replies: Vec<Result<Value, CallError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::default(),
        }
    }

    pub fn push(&self, reply: Result<Value, CallError>) {
        self.replies.lock().expect("replies").push_back(reply);
    }

    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().expect("calls").clone()
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn call(&self, method: &str, params: Value) -> Result<Value, CallError> {
        assert_eq!(method, "sui_getEvents");
        self.calls.lock().expect("calls").push(params);
        self.replies
            .lock()
            .expect("replies")
            .pop_front()
            .unwrap_or_else(|| {
                Err(CallError::Rpc {
                    code: -32602,
                    message: "cursor not found".to_string(),
                })
            })
    }
}

pub fn event(kind: EventKind, digest: &str, seq: u64, timestamp: i64) -> SuiEvent {
    let mut event = SuiEvent::empty(kind);
    event.stamp(&EventId::new(digest, seq), timestamp);
    event
}

pub fn record(tag: &str, digest: &str, seq: u64, timestamp: i64) -> Value {
    let mut event = serde_json::Map::new();
    event.insert(
        tag.to_string(),
        json!({"sender": "0xa1", "recipient": {"AddressOwner": "0xb2"}, "version": 1}),
    );
    json!({
        "timestamp": timestamp,
        "txDigest": digest,
        "id": {"txDigest": digest, "eventSeq": seq},
        "event": event
    })
}

pub fn page(records: Vec<Value>, next: Option<(&str, u64)>, has_more: bool) -> Value {
    let next = next.map(|(digest, seq)| json!({"txDigest": digest, "eventSeq": seq}));
    json!({"data": records, "nextCursor": next, "hasMore": has_more})
}

pub fn rate_limited() -> Result<Value, CallError> {
    Err(CallError::transport(Some(429), "too many requests"))
}

pub fn state(source: Arc<ScriptedSource>, sink: Arc<MemorySink>) -> ArchiveState {
    let router = SinkRouter::new().route(sink.clone(), &EventKind::ALL);
    ArchiveState {
        source,
        router: Arc::new(router),
        high_water: Some(sink),
        cursor_store: None,
        registry: SchemaRegistry::new(),
        retry: RetryPolicy::default(),
        page_limit: None,
        metrics: Arc::new(Metrics::default()),
        shutdown: CancellationToken::new(),
    }
}
