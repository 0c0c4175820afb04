use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use arrow_array::{ArrayRef, RecordBatch, StringArray, TimestampMillisecondArray, UInt64Array};
use arrow_schema::{DataType, Field, Schema, SchemaRef, TimeUnit};
use async_trait::async_trait;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde_json::{Map, Value};
use tracing::info;

use archive_domain::{Column, ColumnType, EventKind, EventSink, SuiEvent};

/// Append-only Parquet export: one Snappy file per event kind, one row group per save.
pub struct ParquetSink {
    folder: PathBuf,
    suffix: String,
    kinds: Vec<EventKind>,
    writers: Mutex<HashMap<EventKind, ArrowWriter<File>>>,
}

impl ParquetSink {
    pub fn new(folder: impl Into<PathBuf>, suffix: impl Into<String>, kinds: &[EventKind]) -> Self {
        Self {
            folder: folder.into(),
            suffix: suffix.into(),
            kinds: kinds.to_vec(),
            writers: Mutex::new(HashMap::new()),
        }
    }

    pub fn path_for(&self, kind: EventKind) -> PathBuf {
        file_path(&self.folder, kind, &self.suffix)
    }
}

pub fn file_path(folder: &Path, kind: EventKind, suffix: &str) -> PathBuf {
    folder.join(format!("{}{}.parquet", kind.tag(), suffix))
}

pub fn arrow_schema(kind: EventKind) -> SchemaRef {
    let fields: Vec<Field> = kind
        .columns()
        .iter()
        .map(|column| {
            let (data_type, nullable) = match column.ty {
                ColumnType::Text | ColumnType::Decimal | ColumnType::Json => (DataType::Utf8, false),
                ColumnType::OptionalText => (DataType::Utf8, true),
                ColumnType::UInt64 => (DataType::UInt64, false),
                ColumnType::OptionalUInt64 => (DataType::UInt64, true),
                ColumnType::TimestampMillis => (
                    DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into())),
                    false,
                ),
            };
            Field::new(column.name, data_type, nullable)
        })
        .collect();
    Arc::new(Schema::new(fields))
}

fn text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn column_array(column: &Column, rows: &[Map<String, Value>]) -> ArrayRef {
    let values = rows.iter().map(|row| row.get(column.name));
    match column.ty {
        ColumnType::Text | ColumnType::Decimal | ColumnType::Json => {
            Arc::new(StringArray::from_iter_values(values.map(text)))
        }
        ColumnType::OptionalText => Arc::new(
            values
                .map(|value| value.filter(|value| !value.is_null()).map(|value| text(Some(value))))
                .collect::<StringArray>(),
        ),
        ColumnType::UInt64 => Arc::new(UInt64Array::from_iter_values(
            values.map(|value| value.and_then(Value::as_u64).unwrap_or_default()),
        )),
        ColumnType::OptionalUInt64 => Arc::new(
            values
                .map(|value| value.and_then(Value::as_u64))
                .collect::<UInt64Array>(),
        ),
        ColumnType::TimestampMillis => Arc::new(
            TimestampMillisecondArray::from_iter_values(
                values.map(|value| value.and_then(Value::as_i64).unwrap_or_default()),
            )
            .with_timezone("UTC"),
        ),
    }
}

/// Builds one record batch of `kind` from events of that kind.
pub fn record_batch(kind: EventKind, events: &[&SuiEvent]) -> Result<RecordBatch> {
    let mut rows = Vec::with_capacity(events.len());
    for event in events {
        match event.to_row_value()? {
            Value::Object(row) => rows.push(row),
            other => return Err(anyhow!("{} row is not an object: {}", kind, other)),
        }
    }
    let columns: Vec<ArrayRef> = kind
        .columns()
        .iter()
        .map(|column| column_array(column, &rows))
        .collect();
    Ok(RecordBatch::try_new(arrow_schema(kind), columns)?)
}

#[async_trait]
impl EventSink for ParquetSink {
    fn name(&self) -> &str {
        "parquet"
    }

    fn redelivery_safe(&self) -> bool {
        false
    }

    async fn start(&self) -> Result<()> {
        fs::create_dir_all(&self.folder)
            .with_context(|| format!("cannot create {}", self.folder.display()))?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let mut writers = self
            .writers
            .lock()
            .map_err(|_| anyhow!("parquet writers lock poisoned"))?;
        for kind in &self.kinds {
            let path = self.path_for(*kind);
            let file = File::create(&path)
                .with_context(|| format!("cannot create {}", path.display()))?;
            let writer = ArrowWriter::try_new(file, arrow_schema(*kind), Some(props.clone()))?;
            writers.insert(*kind, writer);
            info!(path = %path.display(), "parquet file opened");
        }
        Ok(())
    }

    async fn save(&self, events: &[SuiEvent]) -> Result<u64> {
        let mut by_kind: HashMap<EventKind, Vec<&SuiEvent>> = HashMap::new();
        for event in events {
            by_kind.entry(event.kind()).or_default().push(event);
        }

        let mut writers = self
            .writers
            .lock()
            .map_err(|_| anyhow!("parquet writers lock poisoned"))?;
        let mut written = 0;
        for (kind, batch) in by_kind {
            let writer = writers
                .get_mut(&kind)
                .ok_or_else(|| anyhow!("no open parquet file for {} events", kind))?;
            writer.write(&record_batch(kind, &batch)?)?;
            writer.flush()?;
            written += batch.len() as u64;
        }
        Ok(written)
    }

    async fn stop(&self) -> Result<()> {
        let writers: Vec<(EventKind, ArrowWriter<File>)> = self
            .writers
            .lock()
            .map_err(|_| anyhow!("parquet writers lock poisoned"))?
            .drain()
            .collect();
        for (kind, writer) in writers {
            let metadata = writer.close()?;
            info!(
                path = %self.path_for(kind).display(),
                rows = metadata.num_rows,
                "parquet file closed"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive_domain::{CoinBalanceChangeEvent, EventId, PublishEvent};
    use arrow_array::Array;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    fn publish(seq: u64, version: Option<u64>) -> SuiEvent {
        let mut event = SuiEvent::Publish(PublishEvent {
            sender: "0xa1".to_string(),
            package_id: "0x9".to_string(),
            version,
            ..PublishEvent::default()
        });
        event.stamp(&EventId::new("A", seq), 1_678_169_502_291);
        event
    }

    fn read(path: &Path) -> (usize, Vec<RecordBatch>) {
        let file = File::open(path).expect("open parquet");
        let builder = ParquetRecordBatchReaderBuilder::try_new(file).expect("reader");
        let row_groups = builder.metadata().num_row_groups();
        let batches = builder
            .build()
            .expect("build")
            .collect::<Result<Vec<_>, _>>()
            .expect("batches");
        (row_groups, batches)
    }

    #[tokio::test]
    async fn writes_one_row_group_per_save() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = ParquetSink::new(dir.path(), "-2023-03-07", &EventKind::ALL);
        assert!(!sink.redelivery_safe());

        sink.start().await.expect("start");
        assert_eq!(
            sink.save(&[publish(0, Some(3)), publish(1, None)])
                .await
                .expect("save"),
            2
        );
        // Append-only: the same events are written again.
        assert_eq!(sink.save(&[publish(0, Some(3))]).await.expect("save"), 1);
        sink.stop().await.expect("stop");

        let path = dir.path().join("publish-2023-03-07.parquet");
        let (row_groups, batches) = read(&path);
        assert_eq!(row_groups, 2);
        let rows: usize = batches.iter().map(RecordBatch::num_rows).sum();
        assert_eq!(rows, 3);

        let first = &batches[0];
        let version = first
            .column_by_name("version")
            .expect("version")
            .as_any()
            .downcast_ref::<UInt64Array>()
            .expect("u64");
        assert_eq!(version.value(0), 3);
        assert!(version.is_null(1));
        let timestamp = first
            .column_by_name("timestamp")
            .expect("timestamp")
            .as_any()
            .downcast_ref::<TimestampMillisecondArray>()
            .expect("timestamp");
        assert_eq!(timestamp.value(0), 1_678_169_502_291);

        // Every kind gets its file, even without rows.
        assert!(dir.path().join("newObject-2023-03-07.parquet").exists());
    }

    #[tokio::test]
    async fn amounts_keep_every_digit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = ParquetSink::new(dir.path(), "", &[EventKind::CoinBalanceChange]);
        let mut event = SuiEvent::CoinBalanceChange(CoinBalanceChangeEvent {
            amount: "340282366920938463463374607431768211455".to_string(),
            ..CoinBalanceChangeEvent::default()
        });
        event.stamp(&EventId::new("C", 0), 1);

        sink.start().await.expect("start");
        sink.save(&[event]).await.expect("save");
        sink.stop().await.expect("stop");

        let (_, batches) = read(&dir.path().join("coinBalanceChange.parquet"));
        let amount = batches[0]
            .column_by_name("amount")
            .expect("amount")
            .as_any()
            .downcast_ref::<StringArray>()
            .expect("utf8");
        assert_eq!(amount.value(0), "340282366920938463463374607431768211455");
        assert!(!dir.path().join("publish.parquet").exists());
    }

    #[tokio::test]
    async fn kinds_without_a_file_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = ParquetSink::new(dir.path(), "", &[EventKind::Publish]);
        sink.start().await.expect("start");
        let result = sink.save(&[SuiEvent::empty(EventKind::MoveEvent)]).await;
        assert!(result.is_err());
        sink.stop().await.expect("stop");
    }
}
