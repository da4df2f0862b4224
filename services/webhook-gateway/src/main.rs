use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use bus_adapter::KafkaBusProducer;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transactional_outbox::{metrics::OutboxMetrics, OutboxWorker, OutboxWorkerConfig, SqlxOutboxStore};
use webhook_gateway::handlers;
use webhook_gateway::state::AppState;
use webhook_ingestor::{DeadLetterStore, WebhookIdempotencyStore};

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = match webhook_gateway::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("configuration loading failed: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!("starting webhook-gateway v{}", env!("CARGO_PKG_VERSION"));

    let db_pool = match PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("database pool creation failed: {e}");
            std::process::exit(1);
        }
    };

    let bus_producer = match KafkaBusProducer::new(&config.bus.brokers, config.bus.topic_prefix.clone()) {
        Ok(p) => Arc::new(p),
        Err(e) => {
            tracing::error!("bus producer initialization failed: {e}");
            std::process::exit(1);
        }
    };

    let outbox_store = Arc::new(SqlxOutboxStore::new(db_pool.clone()));
    let idempotency = WebhookIdempotencyStore::new(db_pool.clone());
    let dead_letter = DeadLetterStore::new(db_pool.clone());

    let registry = prometheus::default_registry();
    let outbox_metrics = OutboxMetrics::new(registry);

    let worker_config = OutboxWorkerConfig {
        batch_size: config.outbox.batch_size,
        lease_ttl: config.outbox.lease_ttl(),
        poll_interval: config.outbox.poll_interval(),
        backoff_initial: config.outbox.backoff_initial(),
        backoff_max: config.outbox.backoff_max(),
        max_retries: config.outbox.max_retries,
    };

    let mut workers = Vec::with_capacity(config.outbox.worker_count);
    let mut wake_handle = None;
    for i in 0..config.outbox.worker_count {
        let worker = OutboxWorker::new(
            format!("webhook-gateway-worker-{i}"),
            outbox_store.clone(),
            bus_producer.clone(),
            worker_config.clone(),
        )
        .with_metrics(outbox_metrics.clone());
        if wake_handle.is_none() {
            wake_handle = Some(worker.wake_handle());
        }
        workers.push(worker);
    }
    let outbox_wake = wake_handle.expect("worker_count is always >= 1");

    let app_state = web::Data::new(AppState {
        db_pool: db_pool.clone(),
        outbox: outbox_store,
        idempotency,
        dead_letter,
        outbox_wake,
        webhook_secrets: config.webhook.clone(),
    });
    let db_pool_data = web::Data::new(db_pool.clone());

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!(%bind_address, "starting HTTP server");

    let cors_origins = config.cors.allowed_origins.clone();
    let server = HttpServer::new(move || {
        let mut cors = Cors::default();
        for origin in cors_origins.split(',') {
            let origin = origin.trim();
            if origin == "*" {
                cors = cors.allow_any_origin();
            } else {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors.allow_any_method().allow_any_header().max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .app_data(db_pool_data.clone())
            .app_data(web::PayloadConfig::new(2 * 1024 * 1024))
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .route("/health", web::get().to(handlers::health::health))
            .route("/ready", web::get().to(handlers::health::ready))
            .route("/metrics", web::get().to(webhook_gateway::metrics::serve_metrics))
            .route("/webhook/loyverse", web::post().to(handlers::loyverse::receive))
            .service(
                web::resource("/webhook/facebook")
                    .route(web::get().to(handlers::facebook::subscribe))
                    .route(web::post().to(handlers::facebook::receive)),
            )
            .route("/webhook/line", web::post().to(handlers::line::receive))
            .route("/webhook/grab", web::post().to(handlers::delivery::receive_grab))
            .route("/webhook/lineman", web::post().to(handlers::delivery::receive_lineman))
            .route("/webhook/omise", web::post().to(handlers::payment_gateway::receive_omise))
            .route("/webhook/2c2p", web::post().to(handlers::payment_gateway::receive_2c2p))
    })
    .bind(&bind_address)?
    .workers(4)
    .run();

    let server_handle = server.handle();
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let mut tasks: JoinSet<io::Result<()>> = JoinSet::new();

    tasks.spawn(async move { server.await });

    let worker_shutdowns: Vec<_> = workers.iter().map(|w| w.shutdown_handle()).collect();
    for worker in workers {
        tasks.spawn(async move {
            worker.run().await;
            Ok(())
        });
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = tasks.join_next() => {
                match result {
                    Some(Ok(Ok(_))) => tracing::info!("background task completed"),
                    Some(Ok(Err(e))) => {
                        tracing::error!("task returned error: {e}");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::error!("task join error: {e}");
                        break;
                    }
                    None => break,
                }
            }
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received, draining");
                let _ = shutdown_tx.send(());
                server_handle.stop(true).await;
                for handle in &worker_shutdowns {
                    handle.notify_one();
                }
                let drain = tokio::time::sleep(config.outbox.drain_timeout());
                tokio::pin!(drain);
                tokio::select! {
                    _ = drain => {}
                    _ = async { while tasks.join_next().await.is_some() {} } => {}
                }
                break;
            }
        }
    }

    tasks.shutdown().await;
    tracing::info!("webhook-gateway shutting down");
    Ok(())
}
