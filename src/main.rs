use deskqueue::bootstrap;
use deskqueue::config::Config;
use deskqueue::infrastructure::http::router::build_router;
use deskqueue::infrastructure::observability;
use deskqueue::infrastructure::persistence::Database;
use deskqueue::infrastructure::runtime::TokioTaskSpawner;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Tracing, OTLP and Prometheus; flushed when the guard drops
    let _observability = observability::init(&config)?;
    tracing::info!("Configuration loaded");

    // Initialize database connection
    let db = Database::connect(&config.database_url).await?;
    tracing::info!("Database connection established");

    // Run migrations
    db.run_migrations().await?;
    tracing::info!("Database migrations applied");

    let state = bootstrap::build_app_state(db.clone(), &config);

    let shutdown = CancellationToken::new();
    bootstrap::start_background_tasks(
        &state,
        &db,
        &config,
        &TokioTaskSpawner::new(),
        shutdown.clone(),
    );

    let app = build_router(state);

    // Start server
    let addr = config.server_address();
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
    shutdown.cancel();
}
