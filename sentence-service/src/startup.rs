//! Application startup and lifecycle management.
//!
//! Turns configuration into the model registry, wires the HTTP router, and
//! runs the server until a shutdown signal arrives.

use crate::config::{BackendKind, SentenceConfig};
use crate::handlers::{
    health::{health_check, root},
    metrics::metrics,
    sentence::generate_sentence,
};
use crate::middleware::metrics_middleware;
use crate::services::providers::{
    InferenceConfig, InferenceGenerator, MockTextGenerator, TextGenerator,
};
use crate::services::{ModelInvoker, SentenceSelector};
use axum::{
    http::StatusCode,
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use service_core::error::{AppError, ErrorResponse};
use service_core::middleware::tracing::request_id_middleware;
use service_core::observability::REQUEST_ID_HEADER;
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: SentenceConfig,
    pub selector: Arc<SentenceSelector>,
}

/// Build the ordered model registry described by `config`.
pub fn build_selector(config: &SentenceConfig) -> Result<SentenceSelector, AppError> {
    let mut invokers = Vec::with_capacity(config.models.model_ids.len());

    for model_id in &config.models.model_ids {
        let generator: Arc<dyn TextGenerator> = match config.models.backend {
            BackendKind::Inference => {
                let generator = InferenceGenerator::new(InferenceConfig {
                    base_url: config.inference.base_url.clone(),
                    model_id: model_id.clone(),
                    api_token: config.inference.api_token.clone(),
                    request_timeout: config.inference.request_timeout,
                })
                .map_err(|e| AppError::ConfigError(anyhow::Error::new(e)))?;
                Arc::new(generator)
            }
            BackendKind::Mock => Arc::new(MockTextGenerator::echo()),
        };

        tracing::info!(
            model = %model_id,
            provider = generator.provider(),
            "Registered text generation model"
        );

        invokers.push(ModelInvoker::new(
            model_id.clone(),
            generator,
            config.models.generation.clone(),
        ));
    }

    Ok(SentenceSelector::new(invokers, config.selection.strategy()))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    tracing::error!(details = %details, "Request handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: format!("An error occurred: {}", details),
            details: None,
        }),
    )
        .into_response()
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // GET routes also answer HEAD with the body stripped.
        .route("/", get(root))
        .route("/generate_sentence/", get(generate_sentence))
        .route("/generate_sentence", get(generate_sentence))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(from_fn(metrics_middleware))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    path = %request.uri().path(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with backends constructed from `config`.
    pub async fn build(config: SentenceConfig) -> Result<Self, AppError> {
        let selector = build_selector(&config)?;
        Self::build_with_selector(config, selector).await
    }

    /// Build the application around an already assembled selector.
    pub async fn build_with_selector(
        config: SentenceConfig,
        selector: SentenceSelector,
    ) -> Result<Self, AppError> {
        // Port 0 = random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            port,
            strategy = ?selector.strategy(),
            models = selector.model_ids().count(),
            "Sentence service listening"
        );

        let state = AppState {
            config,
            selector: Arc::new(selector),
        };

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until a shutdown signal arrives.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                std::io::Error::other(format!("HTTP server error: {}", e))
            })
    }
}
