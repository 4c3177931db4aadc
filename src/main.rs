use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_web::{dev::Service, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use futures_util::FutureExt;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_pipeline::{
    api,
    config::{ApiArgs, Cli, Command, ProcessorArgs, SharedArgs},
    domain::order::{OrderCommandHandler, ValidationPolicy},
    messaging::{OrderValidationHandler, RedpandaClient, ValidationConsumer, ValidationConsumerConfig},
    metrics::{metrics_handler, Metrics},
    shutdown,
    store::{self, PgOrderStore},
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG takes precedence over --log-filter / LOG_FILTER
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cli.shared.log_filter)),
        )
        .init();

    match cli.command {
        Command::Api(args) => run_api(&cli.shared, args).await,
        Command::Processor(args) => run_processor(&cli.shared, args).await,
        Command::Migrate => run_migrate(&cli.shared).await,
    }
}

async fn run_api(shared: &SharedArgs, args: ApiArgs) -> anyhow::Result<()> {
    tracing::info!(host = %args.http_host, port = args.http_port, "Starting order API");

    let pool = store::connect(&shared.database_url, shared.db_max_connections).await?;
    tracing::info!("Database connection successful");

    let metrics = Arc::new(Metrics::new()?);
    let redpanda = RedpandaClient::new(&shared.kafka_brokers)
        .context("failed to create Kafka producer")?;

    let orders = OrderCommandHandler::new(
        Arc::new(PgOrderStore::new(pool)),
        Arc::new(redpanda),
        metrics.clone(),
    );
    let (state, metrics_data) = api::app_data(orders, args.list_limit, metrics);

    // actix-web installs its own SIGINT/SIGTERM handling and drains
    // in-flight requests before returning.
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(metrics_data.clone())
            .wrap_fn(|req, srv| {
                let method = req.method().clone();
                let path = req.path().to_owned();
                let started = Instant::now();
                srv.call(req).map(move |res| {
                    if let Ok(res) = &res {
                        tracing::debug!(
                            method = %method,
                            path = %path,
                            status = res.status().as_u16(),
                            duration_ms = started.elapsed().as_millis() as u64,
                            "HTTP request"
                        );
                    }
                    res
                })
            })
            .configure(api::configure)
    })
    .client_request_timeout(Duration::from_secs(15))
    .keep_alive(Duration::from_secs(60))
    .shutdown_timeout(10)
    .bind((args.http_host.as_str(), args.http_port))
    .with_context(|| format!("failed to bind {}:{}", args.http_host, args.http_port))?
    .run()
    .await?;

    tracing::info!("HTTP server shutdown complete");
    Ok(())
}

async fn run_processor(shared: &SharedArgs, args: ProcessorArgs) -> anyhow::Result<()> {
    tracing::info!(group_id = %args.group_id, "Starting order processor");

    let pool = store::connect(&shared.database_url, shared.db_max_connections).await?;
    tracing::info!("Database connection successful");

    let metrics = Arc::new(Metrics::new()?);
    let redpanda = RedpandaClient::new(&shared.kafka_brokers)
        .context("failed to create Kafka producer")?;

    let handler = OrderValidationHandler::new(
        Arc::new(PgOrderStore::new(pool)),
        Arc::new(redpanda),
        ValidationPolicy::default(),
        metrics.clone(),
    );
    let consumer = ValidationConsumer::new(
        &ValidationConsumerConfig {
            brokers: shared.kafka_brokers.clone(),
            group_id: args.group_id.clone(),
            redelivery_delay: args.redelivery_delay,
        },
        handler,
        metrics.clone(),
    )
    .context("failed to create Kafka consumer")?;

    let metrics_data = web::Data::new(metrics);
    let metrics_server = HttpServer::new(move || {
        App::new()
            .app_data(metrics_data.clone())
            .route("/metrics", web::get().to(metrics_handler))
    })
    .workers(1)
    .disable_signals()
    .bind(("0.0.0.0", args.metrics_port))
    .with_context(|| format!("failed to bind metrics port {}", args.metrics_port))?
    .run();
    let metrics_server_handle = metrics_server.handle();
    actix_web::rt::spawn(async move {
        if let Err(e) = metrics_server.await {
            tracing::error!(error = %e, "Metrics server error");
        }
    });
    tracing::info!(port = args.metrics_port, "Metrics server listening");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    actix_web::rt::spawn(async move {
        if let Err(e) = shutdown::signal_handler().await {
            tracing::error!(error = %e, "Failed to install signal handlers, shutting down");
        }
        // Receiver already gone means the consumer stopped on its own.
        let _ = shutdown_tx.send(true);
    });

    if let Err(cancelled) = consumer.run(shutdown_rx).await {
        tracing::info!(reason = %cancelled, "Consumer stopped");
    }

    metrics_server_handle.stop(true).await;
    tracing::info!("Order processor shutdown complete");
    Ok(())
}

async fn run_migrate(shared: &SharedArgs) -> anyhow::Result<()> {
    let pool = store::connect(&shared.database_url, 1).await?;
    store::migrate(&pool).await?;
    tracing::info!("All migrations executed");
    Ok(())
}
