use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::Message;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use packforge_api::config::ServerConfig;
use packforge_api::router::build_app_router;
use packforge_api::state::AppState;
use packforge_api::{auth, ws};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "packforge=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = packforge_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    packforge_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    packforge_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Auth backend (chosen once; swapped only by restart) ---
    let auth_backend: Arc<dyn auth::AuthBackend> =
        auth::select_backend(&config.auth_backend, pool.clone())
            .expect("Failed to initialize auth backend")
            .into();
    tracing::info!(backend = %config.auth_backend, "Auth backend loaded");

    // --- WebSocket manager + heartbeat ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager));

    // --- Aptly work queue + dispatcher ---
    let (aptly_queue, aptly_rx) = packforge_aptly::AptlyQueue::channel();
    let aptly_cancel = tokio_util::sync::CancellationToken::new();
    let dispatcher_handle = tokio::spawn(packforge_aptly::run_dispatcher(
        aptly_rx,
        packforge_aptly::AptlyClient::new(config.aptly.daemon_url.clone()),
        aptly_cancel.clone(),
    ));
    tracing::info!("Aptly dispatcher started");

    // --- Event bus, forwarded to WebSocket clients ---
    let event_bus = Arc::new(packforge_events::EventBus::default());
    let forward_manager = Arc::clone(&ws_manager);
    let mut event_rx = event_bus.subscribe();
    let forwarder_handle = tokio::spawn(async move {
        while let Ok(message) = event_rx.recv().await {
            if let Ok(text) = serde_json::to_string(&message) {
                forward_manager.broadcast(Message::Text(text.into())).await;
            }
        }
    });

    // --- App state + router ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        ws_manager: Arc::clone(&ws_manager),
        aptly_queue,
        event_bus,
        auth_backend,
    };
    let app = build_app_router(state, &config);

    // --- Serve ---
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid bind address");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind");
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Shutdown ---
    tracing::info!("Shutting down");
    ws_manager.shutdown_all().await;
    aptly_cancel.cancel();
    let _ = dispatcher_handle.await;
    heartbeat_handle.abort();
    forwarder_handle.abort();
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl-c");
}
