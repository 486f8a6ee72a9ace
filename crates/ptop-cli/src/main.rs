mod args;
mod output;

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Router};
use clap::Parser;
use futures_util::{Stream, StreamExt};
use tokio_stream::wrappers::WatchStream;

use ptop_common::ClusterSnapshot;
use ptop_engine::metrics::{healthz_handler, metrics_handler};
use ptop_engine::{ProcessRunner, RefreshMetrics, RefreshScheduler};

use crate::args::{Args, Command};
use crate::output::print_snapshot;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let otel = ptop_common::telemetry::init_tracing(
        "ptop",
        &args.log_filter,
        args.otlp_endpoint.as_deref(),
        args.otlp_token.as_deref(),
    );

    let result = run(args).await;

    if let Some(provider) = otel {
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error=%e, "failed to flush spans");
        }
    }
    result
}

async fn run(args: Args) -> anyhow::Result<()> {
    let runner = Arc::new(ProcessRunner::new(args.command_timeout()));
    let scheduler = RefreshScheduler::new(args.refresh_config(), args.commands(), runner)
        .context("invalid refresh configuration")?;

    if let Some(addr) = &args.metrics_addr {
        serve_metrics(addr, scheduler.metrics()).await?;
    }

    match args.command {
        Command::Status { json } => {
            tokio::join!(scheduler.refresh_nodes_once(), scheduler.refresh_jobs_once());
            let snapshot = scheduler.snapshot();
            if json {
                println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
            } else {
                print_snapshot(&snapshot);
            }
        }
        Command::Watch => {
            tracing::info!(hosts = args.hosts.len(), "ptop watching cluster");
            let handle = scheduler.spawn();
            let snapshots = WatchStream::new(handle.subscribe());
            print_until(snapshots, tokio::signal::ctrl_c()).await;
            tracing::info!("shutting down refresh loops");
            handle.shutdown().await;
        }
    }
    Ok(())
}

/// Print snapshots until `shutdown` resolves or the stream ends. Returns how
/// many were printed.
async fn print_until<S, F>(mut snapshots: S, shutdown: F) -> usize
where
    S: Stream<Item = Arc<ClusterSnapshot>> + Unpin,
    F: Future,
{
    // one signal future for the whole loop so a signal that lands mid-print is kept
    tokio::pin!(shutdown);
    let mut printed = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            next = snapshots.next() => match next {
                Some(snapshot) => {
                    print_snapshot(&snapshot);
                    printed += 1;
                }
                None => break,
            },
        }
    }
    printed
}

/// Bind the metrics listener and serve it in the background.
async fn serve_metrics(addr: &str, metrics: Arc<RefreshMetrics>) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(metrics);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {addr}"))?;
    tracing::info!(%addr, "metrics listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error=%e, "metrics server exited");
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::{oneshot, watch};

    use super::*;

    #[tokio::test]
    async fn test_print_until_stops_on_shutdown() {
        let (tx, rx) = watch::channel(Arc::new(ClusterSnapshot::default()));
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(print_until(WatchStream::new(rx), stop_rx));

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(Arc::new(ClusterSnapshot::default())).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        stop_tx.send(()).unwrap();

        // the sender is still alive, so only the shutdown future can end the loop
        let printed = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("loop should stop on shutdown")
            .unwrap();
        assert!(printed >= 1);
        drop(tx);
    }

    #[tokio::test]
    async fn test_print_until_stops_when_stream_ends() {
        let snapshots = futures_util::stream::iter(vec![
            Arc::new(ClusterSnapshot::default()),
            Arc::new(ClusterSnapshot::default()),
        ]);
        let printed = print_until(snapshots, std::future::pending::<()>()).await;
        assert_eq!(printed, 2);
    }
}
