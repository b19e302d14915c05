mod config;
mod domain;
mod error;
mod handlers;
mod middleware;
mod repositories;
mod routes;
mod utils;

use config::AppState;
use routes::create_routes;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{
    layer::SubscriberExt,
    util::SubscriberInitExt
};

/// Entry point dari Payment Service Serbisyo
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Setup logging dengan environment
    setup_logging();

    // Create application state (includes database connection)
    let app_state = AppState::from_env().await?;

    info!("🚀 Payment Service starting on {}:{}", app_state.config.server_host, app_state.config.server_port);
    info!("💳 Mode: {} | PayMongo API: {}",
        app_state.paymongo.get_environment_info(),
        app_state.config.paymongo_api_url
    );

    // Build dan start server dengan graceful shutdown
    start_server(app_state).await
}

/// Inisialisasi structured logging berdasarkan environment
fn setup_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("payment_service=debug,tower_http=debug"))
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Start server dengan graceful shutdown dan proper middleware
async fn start_server(app_state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    // Build application dengan middleware stack
    let app = create_routes(app_state.clone())
        .await
        .layer(TraceLayer::new_for_http());

    // Bind listener ke configured address
    let listener = TcpListener::bind(format!("{}:{}", app_state.config.server_host, app_state.config.server_port))
        .await?;

    info!("🌐 Server running on http://{}:{}", app_state.config.server_host, app_state.config.server_port);
    info!("📚 API Docs: http://{}:{}/docs", app_state.config.server_host, app_state.config.server_port);
    info!("🏥 Health Check: http://{}:{}/health", app_state.config.server_host, app_state.config.server_port);

    // Setup graceful shutdown signal handler
    let shutdown_signal = async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("🛑 Received shutdown signal");
    };

    // Run server dengan graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("✅ Payment Service shutdown successfully");
    Ok(())
}
