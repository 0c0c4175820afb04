use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use archive_application::commands::run_archive;
use archive_infrastructure::{ArchiveConfig, RunPlan};

use crate::context::ArchiveContext;

/// Human-readable description of what a run would do.
pub fn describe_plan(config: &ArchiveConfig, plan: &RunPlan) -> String {
    let mut lines = vec![
        format!("mode:     {}", plan.mode),
        format!("endpoint: {}", config.endpoint),
        format!("target:   {}", plan.target),
    ];
    if let Some(kind) = plan.filter {
        lines.push(format!("filter:   {}", kind));
    }
    if plan.target.uses_files() {
        let kinds: Vec<_> = plan.file_kinds.iter().map(|kind| kind.tag()).collect();
        lines.push(format!("folder:   {}", config.folder));
        lines.push(format!("files:    {} (suffix {:?})", kinds.join(", "), plan.file_suffix));
    }
    if plan.target.uses_database() {
        lines.push(format!(
            "database: {} at {}",
            config.schema, config.clickhouse_url
        ));
    }
    lines.join("\n")
}

/// Runs the configured archive until it finishes or a shutdown signal arrives.
pub async fn run(config: ArchiveConfig) -> Result<()> {
    let shutdown = CancellationToken::new();
    let context = ArchiveContext::new(&config, shutdown.clone()).await?;
    let state = context.state;
    let plan = context.plan;

    let watcher = shutdown.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown_signal() => {
                info!("shutdown requested, finishing current page");
                watcher.cancel();
            }
            _ = watcher.cancelled() => {}
        }
    });

    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("archive", run_id = %run_id);
    let result = async {
        info!(mode = %plan.mode, target = %plan.target, sinks = ?state.router.sink_names(), "archive run starting");
        run_archive(&state, &plan.mode).await
    }
    .instrument(span.clone())
    .await;
    shutdown.cancel();

    let _entered = span.enter();
    info!(metrics = %state.metrics.render_prometheus(), "archive metrics");
    match result {
        Ok(summary) => {
            info!(
                iterations = summary.iterations,
                pages = summary.pages,
                events = summary.events_received,
                rows = summary.rows_committed,
                unknown = summary.unknown_skipped,
                filtered = summary.filtered_skipped,
                stop = ?summary.last_stop,
                "archive run finished"
            );
            Ok(())
        }
        Err(err) => {
            warn!(error = %err, "archive run failed");
            Err(err.into())
        }
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "sigterm handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_file_targets() {
        let config = ArchiveConfig {
            date: Some("2023-05-01".to_string()),
            ..ArchiveConfig::default()
        };
        let plan = config.plan().unwrap();
        let text = describe_plan(&config, &plan);
        assert!(text.contains("target:   file"));
        assert!(text.contains("-2023-05-01"));
        assert!(!text.contains("database:"));
    }
}
