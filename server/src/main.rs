use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use boxoffice_server::config::Config;
use boxoffice_server::routes::create_routes;
use boxoffice_server::services::SystemClock;
use boxoffice_server::state::AppState;
use boxoffice_server::store::PgStore;

const DEFAULT_LOG_FILTER: &str = "boxoffice_server=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(environment = %config.environment, "Configuration loaded");

    let store = PgStore::connect(&config).await?;
    tracing::info!("Successfully connected to database");

    sqlx::migrate!().run(store.pool()).await?;
    tracing::info!("Migrations run successfully");

    let state = AppState::new(
        Arc::new(store),
        Arc::new(SystemClock),
        Arc::new(config.environment),
    );
    let app = create_routes(state, &config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server running at http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
