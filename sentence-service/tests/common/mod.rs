#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use sentence_service::config::{
    BackendKind, InferenceSettings, ModelsConfig, SelectionConfig, SentenceConfig,
};
use sentence_service::services::providers::{GenerationParams, TextGenerator};
use sentence_service::services::{FanOutStrategy, ModelInvoker, SentenceSelector};
use sentence_service::startup::{build_router, AppState};
use service_core::config::Config as CoreConfig;
use std::sync::Arc;
use tower::ServiceExt;

/// Config for a random port with mock backends.
pub fn test_config(model_ids: &[&str]) -> SentenceConfig {
    SentenceConfig {
        common: CoreConfig { port: 0 },
        models: ModelsConfig {
            model_ids: model_ids.iter().map(|id| id.to_string()).collect(),
            backend: BackendKind::Mock,
            generation: GenerationParams::default(),
        },
        selection: SelectionConfig::default(),
        inference: InferenceSettings::default(),
    }
}

pub fn selector(
    models: Vec<(&str, Arc<dyn TextGenerator>)>,
    strategy: FanOutStrategy,
) -> SentenceSelector {
    let invokers = models
        .into_iter()
        .map(|(id, generator)| ModelInvoker::new(id, generator, GenerationParams::default()))
        .collect();
    SentenceSelector::new(invokers, strategy)
}

pub fn router(selector: SentenceSelector) -> Router {
    let ids: Vec<String> = selector.model_ids().map(str::to_string).collect();
    let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
    build_router(AppState {
        config: test_config(&ids),
        selector: Arc::new(selector),
    })
}

/// Send a GET through the router and decode the JSON body.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).expect("response body is JSON");
    (status, body)
}
