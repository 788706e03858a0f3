use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trailmap_db::{init_pool, run_migrations};
use trailmap_server::{create_router, AppState, Config};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            eprintln!(
                "Optional: TRAILMAP_LISTEN_ADDR, TRAILMAP_DATABASE_URL, TRAILMAP_MAX_ZOOM, \
                 TRAILMAP_TILE_MAX_AGE, TRAILMAP_DISPATCH_TIMEOUT_MS"
            );
            std::process::exit(1);
        }
    };

    tracing::info!("Starting Trailmap server");
    tracing::info!("Listen address: {}", config.listen_addr);
    tracing::info!("Database: {}", config.database_url);
    tracing::info!(
        "Serving tiles up to zoom {} with max-age {}s",
        config.tiles.max_zoom,
        config.tiles.max_age_secs
    );

    // Initialize database
    let pool = match init_pool(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Database error: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = run_migrations(&pool).await {
        eprintln!("Migration error: {}", e);
        std::process::exit(1);
    }

    let state = AppState::new(pool, config.tiles.clone(), config.dispatch_timeout);
    tracing::info!("Tile cache version {}", state.tiles.cache_version());

    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server running at http://{}", config.listen_addr);

    axum::serve(listener, app).await.expect("Server error");
}
