use axum::{extract::Request, ServiceExt};
use dotenvy::dotenv;
use envconfig::Envconfig;
use tokio::net::TcpListener;

use pharmacy_control::{app, config::Config, db, services, shutdown_signal, state::AppState};

type Error = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load environment variables from a .env file if present
    dotenv().ok();

    // Initialize the logger with default settings or "info" level if not specified
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    log::info!("Starting the pharmacy control API...");

    let config = Config::init_from_env()?;

    let store = db::connect(&config.database_url, config.database_max_connections).await?;

    services::schedule_expiry_watch(
        store.clone(),
        &config.expiry_check_schedule,
        config.expiry_window_days,
    )
    .await?;

    let state = AppState::from_config(store, &config);

    let address = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&address).await?;
    log::info!("Server running on {}", address);

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app(state)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Shutting down gracefully");
    Ok(())
}
