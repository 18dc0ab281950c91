use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::{error, info};

use deferd_api::{HttpApi, SchedulerApiAdapter};
use deferd_core::{Scheduler, Subscribe};
use deferd_exec::ShellRunner;
use deferd_observe::{Journal, logger_init};
use deferd_prometheus::PrometheusMetrics;

mod config;
use config::AgentConfig;

fn main() -> anyhow::Result<()> {
    // 1) Config + logger, before the runtime starts its worker threads
    let cfg = AgentConfig::from_env()?;
    logger_init(&cfg.logger)?;
    info!("logger initialized");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?
        .block_on(run(cfg))
}

async fn run(cfg: AgentConfig) -> anyhow::Result<()> {
    // 2) Subscribers
    let metrics = PrometheusMetrics::new()?;
    let subscribers: Vec<Arc<dyn Subscribe>> =
        vec![Arc::new(Journal::new()), Arc::new(metrics.clone())];

    // 3) Scheduler
    let scheduler = Scheduler::new(cfg.scheduler, Arc::new(ShellRunner::new()), subscribers)
        .await
        .context("failed to open task storage")?;
    info!(
        whitelist = ?scheduler.config().whitelist.iter().collect::<Vec<_>>(),
        "scheduler ready"
    );

    // 4) HTTP
    let app = HttpApi::new(Arc::new(SchedulerApiAdapter::new(scheduler)))
        .router()
        .merge(
            Router::new()
                .route("/metrics", get(metrics_handler))
                .with_state(metrics),
        );

    let listener = tokio::net::TcpListener::bind(cfg.listen)
        .await
        .with_context(|| format!("failed to bind {}", cfg.listen))?;
    info!(addr = %cfg.listen, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down...");
    Ok(())
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> Response {
    match metrics.encode() {
        Ok(body) => ([(CONTENT_TYPE, metrics.content_type())], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
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
