//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Access token handed out by the mock metadata server.
#[allow(dead_code)]
pub const METADATA_TOKEN: &str = "from-metadata";

/// Project whose keys the mock KMS refuses to use.
#[allow(dead_code)]
pub const DENIED_PROJECT: &str = "denied";

/// One call seen by the mock KMS.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub authorization: Option<String>,
}

/// Handle to a running mock KMS.
pub struct MockKms {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

#[allow(dead_code)]
impl MockKms {
    pub fn base_url(&self) -> url::Url {
        url::Url::parse(&format!("http://{}", self.addr)).unwrap()
    }

    pub fn metadata_token_url(&self) -> url::Url {
        url::Url::parse(&format!(
            "http://{}/computeMetadata/v1/instance/service-accounts/default/token",
            self.addr
        ))
        .unwrap()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

/// Start a mock Cloud KMS plus metadata token endpoint on a free port.
///
/// "Encryption" reverses the plaintext bytes.
pub async fn start_mock_kms() -> MockKms {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));

    let app = Router::new()
        .route("/v1/{*rest}", post(kms_handler))
        .route(
            "/computeMetadata/v1/instance/service-accounts/default/token",
            get(metadata_token_handler),
        )
        .with_state(requests.clone());

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockKms { addr, requests }
}

async fn kms_handler(
    State(requests): State<Arc<Mutex<Vec<Recorded>>>>,
    Path(rest): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    requests.lock().unwrap().push(Recorded {
        path: format!("/v1/{rest}"),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });

    if rest.starts_with(&format!("projects/{DENIED_PROJECT}/")) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"error": {"code": 403, "message": "Permission denied"}})),
        )
            .into_response();
    }

    let reversed = |field: &str| -> Option<String> {
        let decoded = STANDARD.decode(body.get(field)?.as_str()?).ok()?;
        Some(STANDARD.encode(decoded.into_iter().rev().collect::<Vec<u8>>()))
    };

    if let Some(key) = rest.strip_suffix(":encrypt") {
        match reversed("plaintext") {
            Some(ciphertext) => Json(json!({"name": key, "ciphertext": ciphertext})).into_response(),
            None => StatusCode::BAD_REQUEST.into_response(),
        }
    } else if rest.ends_with(":decrypt") {
        match reversed("ciphertext") {
            Some(plaintext) => Json(json!({"plaintext": plaintext})).into_response(),
            None => StatusCode::BAD_REQUEST.into_response(),
        }
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn metadata_token_handler(headers: HeaderMap) -> Response {
    let flavored = headers
        .get("metadata-flavor")
        .is_some_and(|v| v == "Google");
    if !flavored {
        return StatusCode::FORBIDDEN.into_response();
    }
    Json(json!({
        "access_token": METADATA_TOKEN,
        "expires_in": 3599,
        "token_type": "Bearer"
    }))
    .into_response()
}
