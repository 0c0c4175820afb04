use std::sync::Arc;

use anyhow::Result;
use clickhouse::Client;
use tokio_util::sync::CancellationToken;
use tracing::info;

use archive_application::{ArchiveState, Metrics, SinkRouter};
use archive_domain::ports::{CursorStore, HighWaterMark};
use archive_domain::{EventKind, SchemaRegistry};
use archive_infrastructure::{ArchiveConfig, ClickhouseSink, JsonRpcClient, ParquetSink, RunPlan};

pub struct ArchiveContext {
    pub state: ArchiveState,
    pub plan: RunPlan,
}

impl ArchiveContext {
    pub async fn new(config: &ArchiveConfig, shutdown: CancellationToken) -> Result<Self> {
        let plan = config.plan()?;
        let source = Arc::new(JsonRpcClient::new(
            config.endpoint.clone(),
            config.request_timeout(),
        )?);

        let mut router = SinkRouter::new();
        let mut high_water: Option<Arc<dyn HighWaterMark>> = None;
        let mut cursor_store: Option<Arc<dyn CursorStore>> = None;

        if plan.target.uses_database() {
            let sink = Arc::new(ClickhouseSink::new(
                clickhouse_client(config),
                config.schema.clone(),
            ));
            sink.ping().await?;
            info!(url = %config.clickhouse_url, database = %config.schema, "clickhouse reachable");
            router = router.route(sink.clone(), &EventKind::ALL);
            high_water = Some(sink.clone());
            cursor_store = Some(sink);
        }

        if plan.target.uses_files() {
            let sink = Arc::new(ParquetSink::new(
                &config.folder,
                plan.file_suffix.clone(),
                &plan.file_kinds,
            ));
            router = router.route(sink, &plan.file_kinds);
        }

        let registry = match plan.filter {
            Some(kind) => SchemaRegistry::only(kind),
            None => SchemaRegistry::new(),
        };

        let state = ArchiveState {
            source,
            router: Arc::new(router),
            high_water,
            cursor_store,
            registry,
            retry: config.retry_policy(),
            page_limit: config.page_limit,
            metrics: Arc::new(Metrics::default()),
            shutdown,
        };

        Ok(Self { state, plan })
    }
}

/// Client for the ClickHouse server. Not bound to a database; the sink qualifies every table.
pub fn clickhouse_client(config: &ArchiveConfig) -> Client {
    let mut client = Client::default().with_url(&config.clickhouse_url);
    if let Some(user) = &config.clickhouse_user {
        client = client.with_user(user);
    }
    if let Some(password) = &config.clickhouse_password {
        client = client.with_password(password);
    }
    client
}
