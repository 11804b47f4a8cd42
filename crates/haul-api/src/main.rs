//! Binary entry point for the haul stack API server.

use haul_api::state::{AppConfig, AppState};

/// Initialize the tracing subscriber from the environment.
///
/// `RUST_LOG` controls the filter; `HAUL_LOG_FORMAT=json` switches to
/// structured JSON output for log aggregation.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("haul_api=info,tower_http=info"));

    if std::env::var("HAUL_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = AppConfig::from_env();
    let port = config.port;

    let pool = match haul_api::db::init_pool().await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize database");
            std::process::exit(1);
        }
    };

    let state = AppState::with_config(config, pool);

    // Reload the stores from the write-through replica.
    if let Some(pool) = state.db_pool.clone() {
        if let Err(e) = haul_api::db::load_into(&pool, &state).await {
            tracing::error!(error = %e, "failed to load state from database");
            std::process::exit(1);
        }
    }

    let app = haul_api::app(state);

    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, port, "failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!(port, "haul-api listening");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}
