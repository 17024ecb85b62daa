//! Router assembly and server lifecycle

use crate::error::{expose_internal_errors, HttpError, HttpResult};
use crate::routes::{self, health};
use crate::state::AppState;
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::header::{HeaderName, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::any::Any;
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Build the complete application router
pub fn build_router(state: AppState) -> Router {
    expose_internal_errors(state.app.environment.is_development());

    let frontend = ServeDir::new(&state.http.public_dir)
        .append_index_html_on_directories(true)
        .not_found_service(tower::service_fn(|_req: Request| async {
            Ok::<_, Infallible>(HttpError::not_found("The requested resource does not exist").into_response())
        }));

    Router::new()
        .merge(health::router())
        .nest("/api", routes::api_router(&state))
        .nest_service("/uploads", ServeDir::new(&state.uploads.upload_dir))
        .fallback_service(frontend)
        .layer(DefaultBodyLimit::max(state.http.max_body_size))
        .layer(CompressionLayer::new())
        .layer(cors_layer())
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
            ACCEPT,
        ])
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic payload".to_string());

    error!(%detail, "Request handler panicked");
    HttpError::internal(detail).into_response()
}

/// Bind the configured address and serve until a signal or `shutdown`
pub async fn serve(state: AppState, shutdown: CancellationToken) -> HttpResult<()> {
    let addr = format!("{}:{}", state.app.server.host, state.app.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| HttpError::startup(format!("Failed to bind to {}: {}", addr, e)))?;

    serve_on(listener, state, shutdown).await
}

/// Serve on an already bound listener
pub async fn serve_on(listener: TcpListener, state: AppState, shutdown: CancellationToken) -> HttpResult<()> {
    let local = listener
        .local_addr()
        .map_err(|e| HttpError::startup(format!("Listener has no local address: {}", e)))?;
    info!(addr = %local, environment = %state.app.environment, "Server listening");

    let router = build_router(state);
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .map_err(|e| HttpError::internal(format!("Server error: {}", e)))?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install the Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install the SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => warn!("Received Ctrl+C, shutting down gracefully"),
        _ = terminate => warn!("Received terminate signal, shutting down gracefully"),
        _ = shutdown.cancelled() => warn!("Shutdown requested, stopping the server"),
    }
}
