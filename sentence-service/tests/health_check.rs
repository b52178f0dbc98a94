//! Integration tests for sentence-service over a real socket.
//!
//! The application is bound to a random port and backed by mock generators.

mod common;

use reqwest::Client;
use sentence_service::startup::Application;
use std::time::Duration;

/// Spawn the application on a random port and return the port number.
async fn spawn_app() -> u16 {
    let config = common::test_config(&["mock-a", "mock-b"]);
    let app = Application::build(config)
        .await
        .expect("Failed to build application");

    let port = app.port();

    tokio::spawn(async move {
        let _ = app.run_until_stopped().await;
    });

    // Wait for server to be ready by polling the liveness endpoint
    let client = Client::new();
    let url = format!("http://127.0.0.1:{}/", port);
    for _ in 0..50 {
        if client.get(&url).send().await.is_ok() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    port
}

#[tokio::test]
async fn root_reports_server_is_live() {
    let port = spawn_app().await;
    let client = Client::new();

    let response = client
        .get(format!("http://127.0.0.1:{}/", port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body, serde_json::json!({ "message": "Server is live!" }));
}

#[tokio::test]
async fn root_answers_head() {
    let port = spawn_app().await;
    let client = Client::new();

    let response = client
        .head(format!("http://127.0.0.1:{}/", port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
}

#[tokio::test]
async fn health_reports_registered_models() {
    let port = spawn_app().await;
    let client = Client::new();

    let body: serde_json::Value = client
        .get(format!("http://127.0.0.1:{}/health", port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");

    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "sentence-service");
    assert_eq!(body["models"], 2);
}

#[tokio::test]
async fn generate_sentence_with_mock_backend_contains_word() {
    let port = spawn_app().await;
    let client = Client::new();

    let response = client
        .get(format!("http://127.0.0.1:{}/generate_sentence/", port))
        .query(&[("word", "Lantern")])
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    let sentence = body["sentence"].as_str().expect("sentence field");
    assert!(sentence.to_lowercase().contains("lantern"));
    assert!(sentence.split_whitespace().count() <= 6);
}
