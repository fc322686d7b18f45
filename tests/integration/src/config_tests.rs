//! Configuration and lifecycle integration tests
//!
//! Config files on disk feeding a running gateway, environment overrides,
//! the PID file guarding a single instance, and shutdown with requests
//! still in flight.

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_providers::*;
use gateway_config::{load_config_from, read_config_file, ConfigError, LogFormat};
use gateway_server::{serve_with_deadline, AppState, LifecycleError, PidFile};
use serde_json::json;
use std::collections::HashMap;
use std::process::Command;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

#[tokio::test]
async fn test_gateway_from_config_file() {
    let backend = MockBackend::new().await;
    backend.mock_completion_for_model(FAST_PREFIX, "fast-model", "from file").await;

    let dir = TempDir::new().expect("tempdir");
    let path = write_config_file(dir.path(), &config_json(&backend.url(), routing_rules()));

    let config = load_config_from(&path).await.expect("load");
    assert_eq!(config.providers.len(), 2);
    let gateway = TestGateway::start(config).await;

    let response = gateway.messages(&messages_request(HAIKU_MODEL, "hi")).await;
    assert_status(&response, 200);
    let body = TestGateway::json_body(response).await;
    assert_eq!(body["content"][0]["text"], "from file");
}

#[tokio::test]
async fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().expect("tempdir");

    let config = read_config_file(&dir.path().join("absent.json")).await.expect("defaults");
    assert!(config.providers.is_empty());
    assert!(!config.has_default_provider());
    assert_eq!(config.log_format, LogFormat::Pretty);
}

#[tokio::test]
async fn test_unparsable_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").expect("write");

    let err = load_config_from(&path).await.unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[tokio::test]
async fn test_malformed_rule_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config_file(
        dir.path(),
        &config_json("http://127.0.0.1:1", json!({"background": "no-separator"})),
    );

    let err = load_config_from(&path).await.unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "Router.background"));
}

#[tokio::test]
async fn test_overrides_complete_the_default_provider() {
    let backend = MockBackend::new().await;
    backend.mock_completion(DEFAULT_PREFIX, "override").await;

    let dir = TempDir::new().expect("tempdir");
    let path = write_config_file(dir.path(), &json!({"PORT": 4100, "LOG_FORMAT": "json"}));
    let mut config = read_config_file(&path).await.expect("read");
    assert!(!config.has_default_provider());

    let env: HashMap<&str, String> = HashMap::from([
        ("OPENAI_API_KEY", "sk-env".to_string()),
        ("OPENAI_BASE_URL", format!("{}/v1", backend.url())),
        ("OPENAI_MODEL", "env-model".to_string()),
        ("ROUTER_PORT", "not-a-port".to_string()),
    ]);
    config.apply_overrides(|key| env.get(key).cloned());

    assert!(config.has_default_provider());
    assert_eq!(config.port, 4100);
    assert_eq!(config.log_format, LogFormat::Json);

    let gateway = TestGateway::start(config).await;
    let response = gateway.messages(&messages_request(CLAUDE_MODEL, "hi")).await;
    assert_status(&response, 200);
    assert_eq!(backend.received_bodies(DEFAULT_PREFIX).await[0]["model"], "env-model");
    assert_eq!(backend.received_auth(DEFAULT_PREFIX).await, ["Bearer sk-env"]);
}

#[test]
fn test_pid_file_lifecycle() {
    let dir = TempDir::new().expect("tempdir");
    let pid_file = PidFile::new(dir.path().join(".claude-router.pid"));

    assert!(!pid_file.is_running());
    pid_file.acquire().expect("acquire");
    assert!(pid_file.is_running());
    assert_eq!(pid_file.read_pid(), Some(std::process::id() as i32));

    // re-acquiring from the same process is allowed
    pid_file.acquire().expect("re-acquire");

    pid_file.cleanup();
    assert!(!pid_file.is_running());
    assert!(!pid_file.path().exists());
}

#[test]
fn test_second_instance_is_refused_and_stopped() {
    let dir = TempDir::new().expect("tempdir");
    let pid_file = PidFile::new(dir.path().join(".claude-router.pid"));

    let mut other = Command::new("sleep").arg("30").spawn().expect("spawn sleep");
    std::fs::write(pid_file.path(), other.id().to_string()).expect("write pid");

    let err = pid_file.acquire().unwrap_err();
    assert!(matches!(err, LifecycleError::AlreadyRunning(pid) if pid == other.id() as i32));

    assert_eq!(pid_file.stop().expect("stop"), Some(other.id() as i32));
    let status = other.wait().expect("wait");
    assert!(!status.success());
}

#[tokio::test]
async fn test_shutdown_does_not_wait_on_hung_stream() {
    let backend = MockBackend::new().await;
    backend
        .mock_completion_delayed(DEFAULT_PREFIX, "too late", Duration::from_secs(60))
        .await;

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = AppState::from_config(gateway_config(&backend.url(), routing_rules())).expect("state");
    let (signal_tx, signal_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(serve_with_deadline(
        listener,
        state,
        async {
            let _ = signal_rx.await;
        },
        async {
            tokio::time::sleep(Duration::from_millis(300)).await;
        },
    ));

    let in_flight = tokio::spawn(
        reqwest::Client::new()
            .post(format!("http://{addr}/v1/messages"))
            .json(&streaming_request(CLAUDE_MODEL, "hang"))
            .send(),
    );
    let waited = Instant::now();
    while backend.calls(DEFAULT_PREFIX).await == 0 {
        assert!(waited.elapsed() < Duration::from_secs(5), "request never reached the backend");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    signal_tx.send(()).expect("signal");
    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server must stop at the drain deadline")
        .expect("join");
    assert!(result.is_ok());
    in_flight.abort();
}
