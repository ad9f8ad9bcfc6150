use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use mas_probe::{Client, RestErrorKind, RestRequest};
use tokio::net::TcpListener;
use tokio::time::sleep;

#[derive(Clone, Debug)]
struct CapturedRequest {
    content_type: Option<String>,
    auth_token: Option<String>,
    body: Vec<u8>,
}

#[derive(Clone, Default)]
struct AppState {
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

async fn conversation_ok(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    };
    state
        .captured
        .lock()
        .expect("capture mutex poisoned")
        .push(CapturedRequest {
            content_type: header("content-type"),
            auth_token: header("x-auth-token"),
            body: body.to_vec(),
        });
    (StatusCode::OK, r#"{"answer":"hi"}"#)
}

async fn conversation_slow() -> (StatusCode, &'static str) {
    sleep(Duration::from_secs(2)).await;
    (StatusCode::OK, "late")
}

struct TestServer {
    addr: SocketAddr,
    state: AppState,
}

impl TestServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("loopback listener should bind");
        let addr = listener.local_addr().expect("listener should expose addr");
        let state = AppState::default();
        let app = Router::new()
            .route("/conversations/ok", post(conversation_ok))
            .route("/conversations/slow", post(conversation_slow))
            .with_state(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("test server should serve");
        });
        Self { addr, state }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

fn probe_shaped_request(url: String, token: &str) -> RestRequest {
    RestRequest::post(url)
        .with_header("Content-Type", "application/json")
        .with_header("X-Auth-Token", token.as_bytes().to_vec())
        .with_body(&br#"{"query":"hello"}"#[..])
        .with_timeout(Duration::from_secs(60))
}

#[tokio::test]
async fn e2e_conversation_roundtrip_preserves_headers_and_body() {
    let server = TestServer::start().await;
    let client = Client::new();

    let response = client
        .execute(probe_shaped_request(
            server.url("/conversations/ok"),
            "e2e-token",
        ))
        .await
        .expect("loopback POST should succeed");

    assert_eq!(response.status(), 200);
    assert_eq!(response.body(), br#"{"answer":"hi"}"#);

    let captured = server
        .state
        .captured
        .lock()
        .expect("capture mutex poisoned")
        .clone();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].content_type.as_deref(), Some("application/json"));
    assert_eq!(captured[0].auth_token.as_deref(), Some("e2e-token"));
    assert_eq!(captured[0].body, br#"{"query":"hello"}"#);
}

#[tokio::test]
async fn e2e_client_timeout_maps_to_timeout_kind() {
    let server = TestServer::start().await;
    let client = Client::new();

    let request = probe_shaped_request(server.url("/conversations/slow"), "e2e-token")
        .with_timeout(Duration::from_millis(200));
    let err = client
        .execute(request)
        .await
        .expect_err("200ms timeout should trigger before the 2s handler responds");

    assert_eq!(err.kind(), RestErrorKind::Timeout);
}

#[tokio::test]
async fn e2e_connection_refused_maps_to_connect_kind() {
    // Bind then drop a listener so the port is closed when the probe dials it.
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("loopback listener should bind");
    let addr = listener.local_addr().expect("listener should expose addr");
    drop(listener);

    let client = Client::new();
    let err = client
        .execute(probe_shaped_request(
            format!("http://{addr}/conversations/ok"),
            "e2e-token",
        ))
        .await
        .expect_err("closed port should refuse the connection");

    assert_eq!(err.kind(), RestErrorKind::Connect);
}
