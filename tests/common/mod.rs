use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use laim::backend::{Backend, OllamaBackend};
use laim::config::{BackendConfig, Config, RecommenderConfig};
use laim::server::AppState;
use laim::store::{AsyncStore, ConversationStore};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// The three records of a chat answer "Hi there"
#[allow(dead_code)]
pub const HI_THERE: [&str; 3] = [
    r#"{"model":"mistral","message":{"role":"assistant","content":"Hi"},"done":false}"#,
    r#"{"model":"mistral","message":{"role":"assistant","content":" there"},"done":false}"#,
    r#"{"model":"mistral","message":{"role":"assistant","content":""},"done":true}"#,
];

#[allow(dead_code)]
pub fn create_temp_store() -> (ConversationStore, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("history.db");
    let store =
        ConversationStore::new_with_path(db_path).expect("failed to create store with path");
    (store, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Configuration pointing at `backend_url`, with Hugging Face lookups off
#[allow(dead_code)]
pub fn test_config(backend_url: &str) -> Config {
    Config {
        backend: BackendConfig {
            host: backend_url.to_string(),
            ..BackendConfig::default()
        },
        recommender: RecommenderConfig {
            enrich: false,
            ..RecommenderConfig::default()
        },
        ..Config::default()
    }
}

#[allow(dead_code)]
pub fn backend_for(server: &MockServer) -> OllamaBackend {
    OllamaBackend::new(test_config(&server.uri()).backend).expect("backend")
}

/// Application state wired to a mock backend and a temporary store
#[allow(dead_code)]
pub fn test_state(config: Config) -> (AppState, TempDir) {
    let (store, tmp) = create_temp_store();
    let backend: Arc<dyn Backend> =
        Arc::new(OllamaBackend::new(config.backend.clone()).expect("backend"));
    let state =
        AppState::with_parts(config, backend, AsyncStore::new(store)).expect("app state");
    (state, tmp)
}

/// Newline-terminated body made of `lines`
#[allow(dead_code)]
pub fn ndjson(lines: &[&str]) -> Vec<u8> {
    let mut body = String::new();
    for line in lines {
        body.push_str(line);
        body.push('\n');
    }
    body.into_bytes()
}

/// Serve `lines` as a streamed answer on `POST endpoint`
#[allow(dead_code)]
pub async fn mount_stream(server: &MockServer, endpoint: &str, lines: &[&str]) {
    Mock::given(method("POST"))
        .and(path(endpoint))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(ndjson(lines), "application/x-ndjson"),
        )
        .mount(server)
        .await;
}
