// Blog feed server

use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use blog_feed::{
    app_state::AppState,
    blog_interface::create_blog_router,
    config::Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    let addr: SocketAddr = config.server_address().parse()?;

    // Initialize application state
    let app_state = AppState::new(config).await?;

    let app = create_blog_router(app_state).layer(CorsLayer::permissive());

    tracing::info!("Blog feed server starting on http://{}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
