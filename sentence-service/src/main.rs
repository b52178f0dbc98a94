use sentence_service::config::SentenceConfig;
use sentence_service::services::metrics::init_metrics;
use sentence_service::startup::Application;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // OTLP export is opt-in
    let otlp_endpoint = std::env::var("OTLP_ENDPOINT").ok();
    init_tracing("sentence-service", "info", otlp_endpoint.as_deref());

    if let Err(e) = init_metrics() {
        tracing::warn!(error = %e, "Failed to initialize Prometheus metrics");
    }

    let config = SentenceConfig::load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    let app = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    })?;

    app.run_until_stopped().await
}
