use std::collections::{BTreeMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use clickhouse::{Client, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use archive_domain::{
    current_millis, ColumnType, CursorStore, EventId, EventKind, EventSink, HighWaterMark,
    SuiEvent, TimeRange,
};

pub const CURSOR_TABLE: &str = "archive_cursor";

#[derive(Debug, Row, Serialize, Deserialize)]
struct KeyRow {
    tx_digest: String,
    event_seq: u64,
}

#[derive(Debug, Row, Deserialize)]
struct MaxRow {
    m: Option<i64>,
}

#[derive(Debug, Row, Serialize, Deserialize)]
struct CursorRow {
    query_key: String,
    tx_digest: String,
    event_seq: u64,
    updated_at: i64,
}

/// Idempotent ClickHouse persistence: one `ReplacingMergeTree` table per event kind keyed by
/// `(tx_digest, event_seq)`. Rows already present are not inserted again and not counted.
#[derive(Clone)]
pub struct ClickhouseSink {
    client: Client,
    database: String,
}

macro_rules! insert_variant {
    ($sink:ident, $kind:expr, $events:expr, $variant:path) => {{
        let rows: Vec<_> = $events
            .iter()
            .filter_map(|event| match event {
                $variant(row) => Some(row),
                _ => None,
            })
            .collect();
        $sink.insert_rows($kind, &rows).await
    }};
}

impl ClickhouseSink {
    /// `client` must not be bound to `database`; the database is created on start.
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    fn table(&self, name: &str) -> String {
        format!("{}.{}", self.database, name)
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        let create_db = format!("CREATE DATABASE IF NOT EXISTS {}", self.database);
        self.client.query(&create_db).execute().await?;

        for kind in EventKind::ALL {
            self.client
                .query(&create_table_sql(&self.database, kind))
                .execute()
                .await?;
        }
        self.client
            .query(&create_cursor_table_sql(&self.database))
            .execute()
            .await?;
        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        let _: u8 = self.client.query("SELECT toUInt8(1)").fetch_one().await?;
        Ok(())
    }

    async fn existing_keys(&self, kind: EventKind, events: &[&SuiEvent]) -> Result<HashSet<EventId>> {
        let digests: Vec<String> = events
            .iter()
            .map(|event| event.id().tx_digest)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let query = format!(
            "SELECT tx_digest, event_seq FROM {} WHERE has(?, tx_digest)",
            self.table(kind.table())
        );
        let rows = self
            .client
            .query(&query)
            .bind(digests)
            .fetch_all::<KeyRow>()
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| EventId::new(row.tx_digest, row.event_seq))
            .collect())
    }

    async fn insert_rows<T>(&self, kind: EventKind, rows: &[&T]) -> Result<()>
    where
        T: Row + Serialize,
    {
        let mut insert = self.client.insert(&self.table(kind.table()))?;
        for row in rows {
            insert.write(*row).await?;
        }
        insert.end().await?;
        Ok(())
    }

    async fn insert_kind(&self, kind: EventKind, events: &[&SuiEvent]) -> Result<()> {
        match kind {
            EventKind::TransferObject => {
                insert_variant!(self, kind, events, SuiEvent::TransferObject)
            }
            EventKind::Publish => insert_variant!(self, kind, events, SuiEvent::Publish),
            EventKind::CoinBalanceChange => {
                insert_variant!(self, kind, events, SuiEvent::CoinBalanceChange)
            }
            EventKind::MoveEvent => insert_variant!(self, kind, events, SuiEvent::Move),
            EventKind::MutateObject => insert_variant!(self, kind, events, SuiEvent::MutateObject),
            EventKind::DeleteObject => insert_variant!(self, kind, events, SuiEvent::DeleteObject),
            EventKind::NewObject => insert_variant!(self, kind, events, SuiEvent::NewObject),
        }
    }
}

#[async_trait]
impl EventSink for ClickhouseSink {
    fn name(&self) -> &str {
        "clickhouse"
    }

    fn redelivery_safe(&self) -> bool {
        true
    }

    async fn start(&self) -> Result<()> {
        self.ensure_schema().await?;
        debug!(database = %self.database, "clickhouse schema ready");
        Ok(())
    }

    async fn save(&self, events: &[SuiEvent]) -> Result<u64> {
        let mut by_kind: BTreeMap<EventKind, Vec<&SuiEvent>> = BTreeMap::new();
        for event in events {
            by_kind.entry(event.kind()).or_default().push(event);
        }

        let mut committed = 0;
        for (kind, batch) in by_kind {
            let existing = self.existing_keys(kind, &batch).await?;
            let fresh = fresh_events(&batch, &existing);
            if fresh.is_empty() {
                continue;
            }
            self.insert_kind(kind, &fresh).await?;
            debug!(
                table = kind.table(),
                received = batch.len(),
                inserted = fresh.len(),
                "rows inserted"
            );
            committed += fresh.len() as u64;
        }
        Ok(committed)
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl HighWaterMark for ClickhouseSink {
    async fn max_committed_timestamp(&self, within: Option<TimeRange>) -> Result<Option<i64>> {
        let query = max_timestamp_sql(&self.database, within);
        let row = self.client.query(&query).fetch_one::<MaxRow>().await?;
        Ok(row.m)
    }
}

#[async_trait]
impl CursorStore for ClickhouseSink {
    async fn load_cursor(&self, query_key: &str) -> Result<Option<EventId>> {
        let query = format!(
            "SELECT query_key, tx_digest, event_seq, updated_at \
             FROM {} FINAL WHERE query_key = ? ORDER BY updated_at DESC LIMIT 1",
            self.table(CURSOR_TABLE)
        );
        let rows = self
            .client
            .query(&query)
            .bind(query_key)
            .fetch_all::<CursorRow>()
            .await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| EventId::new(row.tx_digest, row.event_seq).non_zero()))
    }

    async fn save_cursor(&self, query_key: &str, cursor: &EventId) -> Result<()> {
        let mut insert = self.client.insert(&self.table(CURSOR_TABLE))?;
        insert
            .write(&CursorRow {
                query_key: query_key.to_string(),
                tx_digest: cursor.tx_digest.clone(),
                event_seq: cursor.event_seq,
                updated_at: current_millis(),
            })
            .await?;
        insert.end().await?;
        info!(query_key, cursor = %cursor, "cursor stored");
        Ok(())
    }
}

/// Events of `batch` that are neither stored yet nor repeated earlier in the batch.
pub fn fresh_events<'a>(batch: &[&'a SuiEvent], existing: &HashSet<EventId>) -> Vec<&'a SuiEvent> {
    let mut seen = HashSet::new();
    batch
        .iter()
        .copied()
        .filter(|event| {
            let id = event.id();
            !existing.contains(&id) && seen.insert(id)
        })
        .collect()
}

fn column_sql(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::Text | ColumnType::Decimal | ColumnType::Json => "String",
        ColumnType::OptionalText => "Nullable(String)",
        ColumnType::UInt64 => "UInt64",
        ColumnType::OptionalUInt64 => "Nullable(UInt64)",
        ColumnType::TimestampMillis => "DateTime64(3, 'UTC')",
    }
}

pub fn create_table_sql(database: &str, kind: EventKind) -> String {
    let columns: Vec<String> = kind
        .columns()
        .iter()
        .map(|column| format!("    {} {}", column.name, column_sql(column.ty)))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {}.{} (\n{}\n) ENGINE = ReplacingMergeTree\n\
         PARTITION BY toYYYYMM(timestamp)\n\
         ORDER BY (tx_digest, event_seq)",
        database,
        kind.table(),
        columns.join(",\n")
    )
}

pub fn create_cursor_table_sql(database: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {}.{} (\n\
         \x20   query_key String,\n\
         \x20   tx_digest String,\n\
         \x20   event_seq UInt64,\n\
         \x20   updated_at DateTime64(3, 'UTC')\n\
         ) ENGINE = ReplacingMergeTree(updated_at)\n\
         ORDER BY query_key",
        database, CURSOR_TABLE
    )
}

/// Largest committed timestamp in milliseconds across every event table.
pub fn max_timestamp_sql(database: &str, within: Option<TimeRange>) -> String {
    let filter = within
        .map(|range| {
            format!(
                " WHERE timestamp >= fromUnixTimestamp64Milli(toInt64({})) \
                 AND timestamp < fromUnixTimestamp64Milli(toInt64({}))",
                range.start_ms, range.end_ms
            )
        })
        .unwrap_or_default();
    let subqueries: Vec<String> = EventKind::ALL
        .iter()
        .map(|kind| {
            format!(
                "SELECT maxOrNull(toUnixTimestamp64Milli(timestamp)) AS m FROM {}.{}{}",
                database,
                kind.table(),
                filter
            )
        })
        .collect();
    format!("SELECT max(m) AS m FROM ({})", subqueries.join(" UNION ALL "))
}
