use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use bus_adapter::{BusConsumer, KafkaBusConsumer, KafkaBusProducer};
use idempotent_consumer::IdempotencyGuard;
use realtime_hub::metrics::HubMetrics;
use realtime_hub::Hub;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use realtime_gateway::bus_bridge::ChatBridgeHandler;
use realtime_gateway::handlers;
use realtime_gateway::state::AppState;

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
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = match realtime_gateway::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("configuration loading failed: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!("starting realtime-gateway v{}", env!("CARGO_PKG_VERSION"));

    let bus_producer = match KafkaBusProducer::new(&config.bus.brokers, config.bus.topic_prefix.clone()) {
        Ok(p) => Arc::new(p),
        Err(e) => {
            tracing::error!("bus producer initialization failed: {e}");
            std::process::exit(1);
        }
    };

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
    let idempotency = IdempotencyGuard::new(db_pool, config.database.idempotency_retention());

    let registry = prometheus::default_registry();
    let hub_metrics = HubMetrics::new(registry);

    let hub = Hub::new(config.hub.to_hub_config()).with_metrics(hub_metrics);
    let hub_handle = hub.handle();

    let app_state = web::Data::new(AppState {
        hub: hub_handle.clone(),
        bus_producer: bus_producer.clone(),
    });

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
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .route("/health", web::get().to(handlers::health::health))
            .route("/ready", web::get().to(handlers::health::ready))
            .route("/metrics", web::get().to(realtime_gateway::metrics::serve_metrics))
            .route("/api/v1/messages/", web::post().to(handlers::messages::send_message))
            .route("/ws", web::get().to(handlers::ws::upgrade))
    })
    .bind(&bind_address)?
    .workers(4)
    .run();

    let server_handle = server.handle();
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let mut tasks: JoinSet<io::Result<()>> = JoinSet::new();

    tasks.spawn(async move { server.await });

    let hub_shutdown = shutdown_tx.subscribe();
    tasks.spawn(async move {
        hub.run(hub_shutdown).await;
        Ok(())
    });

    let consumer = KafkaBusConsumer::new(config.bus.brokers.clone(), config.bus.topic_prefix.clone());
    let bridge = Arc::new(ChatBridgeHandler::new(hub_handle, idempotency.clone()));
    let consumer_group = config.bus.consumer_group.clone();
    let mut consumer_shutdown = shutdown_tx.subscribe();
    tasks.spawn(async move {
        tokio::select! {
            result = consumer.run("chat-messages", &consumer_group, bridge) => {
                if let Err(e) = result {
                    tracing::error!("bus consumer exited with error: {e}");
                }
            }
            _ = consumer_shutdown.recv() => {
                tracing::info!("bus consumer stopping on shutdown signal");
            }
        }
        Ok(())
    });

    let mut cleanup_shutdown = shutdown_tx.subscribe();
    tasks.spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match idempotency.cleanup_old_events().await {
                        Ok(count) => tracing::debug!(count, "cleaned up old idempotency records"),
                        Err(e) => tracing::warn!(error = %e, "idempotency cleanup failed"),
                    }
                }
                _ = cleanup_shutdown.recv() => break,
            }
        }
        Ok(())
    });

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
                tokio::time::sleep(std::time::Duration::from_secs(config.app.shutdown_timeout_secs)).await;
                break;
            }
        }
    }

    tasks.shutdown().await;
    tracing::info!("realtime-gateway shutting down");
    Ok(())
}
