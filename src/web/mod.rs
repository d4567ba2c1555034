pub mod error;
pub mod routes;
pub mod state;

use crate::auth::guard::require_session;
use crate::config::ServerConfig;
use crate::utils::error::Result;
use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use error::ApiError;
use routes::{auth, messaging, misc, resources, users};
use state::SharedState;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    if origins.is_empty() {
        cors
    } else {
        cors.allow_origin(AllowOrigin::list(origins))
            .allow_credentials(true)
    }
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".to_string())
}

/// 組裝路由；驗證中介層包住所有路徑，包含靜態檔案
pub fn build_router(state: SharedState) -> Router {
    let api = Router::new()
        .route(
            "/api/resources",
            get(resources::list_resources).post(resources::create_resource),
        )
        .route("/api/resources/:id", get(resources::get_resource))
        .route("/api/upload", post(resources::upload_resources))
        .route(
            "/api/misc/resource-spreadsheet",
            get(misc::resource_spreadsheet),
        )
        .route("/api/log-errors", post(misc::log_errors))
        .route("/api/update-coordinates", post(misc::update_coordinates))
        .route("/api/csp-report", post(misc::csp_report))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/check", get(auth::check))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/users", get(users::list_users))
        .route("/api/whatsapp", post(messaging::send_message));

    let app = match &state.config.server.static_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true)),
        None => api.fallback(not_found),
    };

    app.layer(middleware::from_fn_with_state(
        state.jwt.clone(),
        require_session,
    ))
    .layer(TraceLayer::new_for_http())
    .layer(cors_layer(&state.config.server))
    .with_state(state)
}

pub async fn serve(state: SharedState) -> Result<()> {
    let address = state.config.bind_address();
    let app = build_router(state);

    tracing::info!("Binding to {}", address);
    let listener = TcpListener::bind(&address).await?;
    tracing::info!("🚀 Server running on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
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
