use std::sync::Arc;
use std::time::Duration;

use envconfig::Envconfig;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use login_ingester::{
    app_context::AppContext,
    config::Config,
    liveness::LivenessRegistry,
    pipeline::{Worker, WorkerSettings},
    queue::{QueueSource, SqsQueue},
    server::{serve, setup_metrics_routes, status_router},
};

fn setup_tracing() {
    let log_layer: tracing_subscriber::filter::Filtered<
        tracing_subscriber::fmt::Layer<tracing_subscriber::Registry>,
        EnvFilter,
        tracing_subscriber::Registry,
    > = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(log_layer).init();
}

fn start_status_server(config: &Config, liveness: LivenessRegistry) -> JoinHandle<()> {
    let bind = format!("{}:{}", config.host, config.port);
    let router = setup_metrics_routes(status_router(liveness));
    tokio::task::spawn(async move {
        serve(router, &bind)
            .await
            .expect("failed to start serving metrics");
    })
}

fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to install SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
        info!("shutdown signal received, finishing in-flight messages");
        cancel.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_tracing();
    info!("Starting up...");

    let config = Config::init_from_env()?;

    let context = match AppContext::new(&config).await {
        Ok(context) => Arc::new(context),
        Err(e) => {
            error!(error = %e, "cannot reach database, refusing to start");
            return Err(e.into());
        }
    };

    let queue = SqsQueue::new(&config.queue).await;
    if let Err(e) = queue.check_connectivity().await {
        error!(error = %e, "cannot reach queue, refusing to start");
        return Err(e.into());
    }
    let queue: Arc<dyn QueueSource> = Arc::new(queue);

    start_status_server(&config, context.liveness.clone());

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    let settings = WorkerSettings::from(&config);
    let mut workers = Vec::with_capacity(config.worker_count);
    for i in 0..config.worker_count {
        let liveness = context
            .liveness
            .register(&format!("worker-{i}"), Duration::from_secs(120));
        let worker = Worker::new(context.clone(), queue.clone(), settings.clone(), liveness);
        workers.push(tokio::spawn(worker.run(cancel.clone())));
    }

    info!(
        worker_count = config.worker_count,
        queue_url = %config.queue.queue_url,
        "ingestion running"
    );

    for worker in workers {
        worker.await?;
    }

    info!("shutdown complete");
    Ok(())
}
