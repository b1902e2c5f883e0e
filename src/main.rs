use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seat_system::{config::Config, controllers, AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting seat assignment API");

    // Connect to the database, Redis and build the shared state
    let app_state = AppState::new(config.clone())
        .await
        .expect("Failed to initialize application state");
    info!("Database connected, migrations applied");

    // --- Start the web server ---

    // Create the main router
    let app = Router::new()
        .route("/", get(|| async { "Seat Assignment API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        // Mount the routes from the controllers module
        .nest("/api", controllers::routes())
        // Pass the application state to the router
        .with_state(app_state.clone())
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.app.port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app.into_make_service())
        .await
        .unwrap();
}
