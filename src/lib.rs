//! Pharmacy control API.
//!
//! Tracks medications, patients, doctors, stock withdrawals and user
//! accounts behind a bearer-token authenticated JSON API.
//!
//! | prefix             | resource                                  |
//! |--------------------|-------------------------------------------|
//! | `/api/auth`        | register, login, Google sign-in, users    |
//! | `/api/medications` | medication catalogue and stock levels     |
//! | `/api/patients`    | patients                                  |
//! | `/api/doctors`     | doctors                                   |
//! | `/api/stocks`      | stock withdrawals                         |
//!
//! Recording a withdrawal is the one operation with a business rule: the
//! medication's quantity is decremented and the withdrawal inserted as a
//! single unit, and the request is rejected if the stock does not cover it.

use axum::{middleware, routing::get, Router};
use tokio::signal;
use tower_http::{cors::CorsLayer, normalize_path::NormalizePath};

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod services;
pub mod state;
pub mod utils;
pub mod validation;

use handlers::{auth as users, doctors, medications, patients, stocks};
use state::AppState;

/// The routed application. Trailing slashes are trimmed before routing, so
/// `/api/medications/` reaches the same handler as `/api/medications`.
pub type App = NormalizePath<Router>;

pub fn app(state: AppState) -> App {
    let router = Router::new()
        .route("/", get(root))
        .nest("/api/auth", users::routes(state.clone()))
        .nest("/api/medications", medications::routes(state.clone()))
        .nest("/api/patients", patients::routes(state.clone()))
        .nest("/api/doctors", doctors::routes(state.clone()))
        .nest("/api/stocks", stocks::routes(state.clone()))
        .layer(middleware::from_fn(utils::log_requests))
        .layer(CorsLayer::permissive())
        .with_state(state);

    NormalizePath::trim_trailing_slash(router)
}

async fn root() -> &'static str {
    "Pharmacy Control API is running"
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        log::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
