use omas_rs::build_configured_app;
use omas_rs::config::AppConfig;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("sqlx", LevelFilter::Warn)
        .parse_default_env()
        .init();

    let config = AppConfig::load()?;
    log::info!(
        "Configuration loaded: server={} backend={:?} purge={}",
        config.server_address(),
        config.repository.backend,
        config.repository.purge_supported
    );

    let app = build_configured_app(&config).await?;

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!(
        "Access services for server '{}' running on http://{}",
        config.service.server_name,
        bind_address
    );

    axum::serve(listener, app).await?;

    Ok(())
}
