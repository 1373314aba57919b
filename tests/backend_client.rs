//! Backend client integration tests against a `wiremock` inference server

mod common;

use std::time::Duration;

use futures::StreamExt;
use laim::backend::{Backend, ChatMessage, GenerationOptions, OllamaBackend, Role};
use laim::config::BackendConfig;
use laim::error::LaimError;
use laim::relay::records;
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{backend_for, mount_stream, HI_THERE};

fn laim_error(err: &anyhow::Error) -> &LaimError {
    err.downcast_ref::<LaimError>()
        .unwrap_or_else(|| panic!("not a LaimError: {:#}", err))
}

#[tokio::test]
async fn test_chat_streams_records() {
    let server = MockServer::start().await;
    mount_stream(&server, "/api/chat", &HI_THERE).await;

    let backend = backend_for(&server);
    let body = backend
        .chat(
            "mistral",
            &[ChatMessage::new(Role::User, "hello")],
            &GenerationOptions::default(),
        )
        .await
        .expect("chat");

    let lines: Vec<String> = records(body, 1024)
        .map(|r| r.expect("record"))
        .collect()
        .await;
    assert_eq!(lines, HI_THERE.to_vec());
}

#[tokio::test]
async fn test_chat_payload_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_json(json!({
            "model": "mistral",
            "messages": [{ "role": "user", "content": "hello" }],
            "stream": true,
            "options": { "temperature": 0.5 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            common::ndjson(&[r#"{"done":true}"#]),
            "application/x-ndjson",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let options = GenerationOptions {
        temperature: Some(0.5),
        ..GenerationOptions::default()
    };
    backend_for(&server)
        .chat("mistral", &[ChatMessage::new(Role::User, "hello")], &options)
        .await
        .expect("chat");
}

#[tokio::test]
async fn test_generate_omits_empty_options() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_json(json!({
            "model": "mistral",
            "prompt": "why?",
            "stream": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            common::ndjson(&[r#"{"response":"because","done":true}"#]),
            "application/x-ndjson",
        ))
        .expect(1)
        .mount(&server)
        .await;

    backend_for(&server)
        .generate("mistral", "why?", &GenerationOptions::default())
        .await
        .expect("generate");
}

#[tokio::test]
async fn test_error_status_is_backend_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "error": "model 'nope' not found" })),
        )
        .mount(&server)
        .await;

    let err = backend_for(&server)
        .chat("nope", &[], &GenerationOptions::default())
        .await
        .err()
        .expect("should fail");
    match laim_error(&err) {
        LaimError::BackendRejected { status, body } => {
            assert_eq!(*status, 404);
            assert_eq!(body, "model 'nope' not found");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_refused_is_unavailable() {
    // Bind then drop a listener to get a port nobody is serving.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };
    let backend = OllamaBackend::new(BackendConfig {
        host: format!("http://127.0.0.1:{}", port),
        ..BackendConfig::default()
    })
    .expect("backend");

    let err = backend.list_models().await.expect_err("should fail");
    assert!(matches!(laim_error(&err), LaimError::BackendUnavailable(_)));
}

#[tokio::test]
async fn test_list_models_parses_tags() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                { "name": "mistral:latest", "size": 4109865159u64, "digest": "abc", "modified_at": "2024-01-01T00:00:00Z" },
                { "name": "phi3:mini" }
            ]
        })))
        .mount(&server)
        .await;

    let models = backend_for(&server).list_models().await.expect("list");
    let names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["mistral:latest", "phi3:mini"]);
    assert_eq!(models[0].size, 4_109_865_159);
}

#[tokio::test]
async fn test_malformed_tags_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("not json", "application/json"))
        .mount(&server)
        .await;

    let err = backend_for(&server).list_models().await.expect_err("fail");
    assert!(matches!(laim_error(&err), LaimError::BackendProtocol(_)));
}

#[tokio::test]
async fn test_delete_and_pull_payloads() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/delete"))
        .and(body_partial_json(json!({ "name": "tinyllama" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/pull"))
        .and(body_json(json!({ "name": "tinyllama", "stream": true })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            common::ndjson(&[r#"{"status":"pulling manifest"}"#, r#"{"status":"success"}"#]),
            "application/x-ndjson",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    backend.delete("tinyllama").await.expect("delete");
    let body = backend.pull("tinyllama").await.expect("pull");
    assert_eq!(records(body, 1024).count().await, 2);
}

#[tokio::test]
async fn test_list_timeout_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "models": [] }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let backend = OllamaBackend::new(BackendConfig {
        host: server.uri(),
        list_timeout_seconds: 1,
        ..BackendConfig::default()
    })
    .expect("backend");

    let err = backend.list_models().await.expect_err("should time out");
    assert!(matches!(laim_error(&err), LaimError::BackendUnavailable(_)));
}
