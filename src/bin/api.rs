use propvest::{
    api::start_server,
    config::AppConfig,
    gemini::GeminiClient,
    session::InMemorySessionStore,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;

    info!("🚀 PropVest Analyzer - API Server");
    info!("📍 Port: {}", config.port);

    let gemini = GeminiClient::with_settings(
        config.gemini_api_key.clone(),
        config.gemini_base_url.clone(),
        config.video_poll,
    )?;
    let sessions = Arc::new(InMemorySessionStore::with_limits(config.sessions));
    let _sweeper = sessions.spawn_sweeper(SWEEP_INTERVAL);
    info!(
        "🧹 Sessions: ttl {}s, max {}",
        config.sessions.ttl.as_secs(),
        config.sessions.max_sessions
    );

    info!("📡 Starting API server...");

    start_server(sessions, Arc::new(gemini), config.port).await?;

    Ok(())
}
