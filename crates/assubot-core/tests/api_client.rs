//! Drives the REST client and the services on top of it against an
//! in-process mock of the backend.

use std::sync::Arc;

use assubot_core::api::ApiError;
use assubot_core::models::ListContractsArgs;
use assubot_core::realtime::transport::{ConnectOptions, SocketHandle};
use assubot_core::realtime::Connector;
use assubot_core::secure_storage::MemoryTokenStore;
use assubot_core::services::ContractScope;
use assubot_core::store::ProcessingStatus;
use assubot_core::{ApiClient, CoreConfig, CoreRuntime};
use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// Push channel that never connects; these tests only cover REST
struct SilentConnector;

impl Connector for SilentConnector {
    fn open(&self, _options: &ConnectOptions) -> SocketHandle {
        let (outbound, _outbound_rx) = mpsc::unbounded_channel();
        let (_signal_tx, signals) = mpsc::unbounded_channel();
        SocketHandle { outbound, signals }
    }
}

fn contract(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "name": "Assurance habitation",
        "summarizeStatus": status,
        "insurer": "MAIF",
        "createdAt": "2024-03-01T10:00:00Z"
    })
}

async fn get_contract(Path(id): Path<String>) -> impl IntoResponse {
    if id == "missing" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"status": "error", "data": {"message": "Contract not found"}})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "data": {"message": "Contract fetched", "resource": contract(&id, "pending")}
        })),
    )
}

async fn list_contracts() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "items": [contract("c1", "pending"), contract("c2", "success")],
            "total": 2,
            "page": 1,
            "limit": 20
        }
    }))
}

async fn summarize(Path(id): Path<String>) -> impl IntoResponse {
    if id == "poor" {
        return (
            StatusCode::PAYMENT_REQUIRED,
            Json(json!({
                "success": false,
                "error": {
                    "code": "INSUFFICIENT_CREDITS",
                    "message": "Not enough credits",
                    "required": 5,
                    "available": 2
                }
            })),
        );
    }
    (
        StatusCode::ACCEPTED,
        Json(json!({"success": true, "data": {"contractId": id, "queued": true}})),
    )
}

async fn login(Json(body): Json<Value>) -> impl IntoResponse {
    if body["password"] != "correct horse" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"status": "error", "data": {"message": "Invalid credentials"}})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "data": {
                "message": "Logged in",
                "resource": {
                    "token": "jwt-1",
                    "user": {"id": "u1", "email": body["email"], "creditBalance": 100}
                }
            }
        })),
    )
}

async fn me(headers: HeaderMap) -> impl IntoResponse {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some("Bearer jwt-1");
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"success": false, "error": "Token expired"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"success": true, "data": {"id": "u1", "email": "a@b.fr", "creditBalance": 42}})),
    )
}

/// Serve the mock backend on an ephemeral port and return its REST base URL
async fn spawn_backend() -> String {
    let app = Router::new()
        .route("/api/v1/contracts", get(list_contracts))
        .route("/api/v1/contracts/:id", get(get_contract))
        .route("/api/v1/contracts/:id/summarize", post(summarize))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/users/me", get(me));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api/v1", addr)
}

fn runtime(base_url: &str) -> CoreRuntime {
    let config = CoreConfig::new(base_url);
    let api = ApiClient::new(base_url);
    CoreRuntime::with_parts(
        config,
        api.clone(),
        Arc::new(SilentConnector),
        Arc::new(MemoryTokenStore::default()),
        Arc::new(api),
    )
    .unwrap()
}

#[tokio::test]
async fn test_wrapped_envelope_is_unwrapped() {
    let base = spawn_backend().await;
    let client = ApiClient::new(base);

    let value = client.get_value("/contracts/c1", &[]).await.unwrap();
    assert_eq!(value["id"], "c1");
    assert_eq!(value["insurer"], "MAIF");
}

#[tokio::test]
async fn test_wrapped_error_is_classified() {
    let base = spawn_backend().await;
    let client = ApiClient::new(base);

    let err = client.get_value("/contracts/missing", &[]).await.unwrap_err();
    assert_eq!(
        err,
        ApiError::NotFound {
            message: "Contract not found".to_string()
        }
    );
}

#[tokio::test]
async fn test_insufficient_credits_carries_amounts() {
    let base = spawn_backend().await;
    let rt = runtime(&base);

    let err = rt
        .contracts()
        .start_summarize(ContractScope::User, "poor")
        .await
        .unwrap_err();
    match err {
        ApiError::InsufficientCredits {
            required, available, ..
        } => {
            assert_eq!(required, Some(5));
            assert_eq!(available, Some(2));
        }
        other => panic!("expected insufficient credits, got {:?}", other),
    }
    assert_eq!(rt.processing().get_status("poor"), None);
}

#[tokio::test]
async fn test_list_then_summarize_marks_ongoing() {
    let base = spawn_backend().await;
    let rt = runtime(&base);

    let page = rt
        .contracts()
        .list_contracts(ContractScope::User, &ListContractsArgs::default())
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].created_at.unwrap().to_rfc3339(), "2024-03-01T10:00:00+00:00");

    rt.contracts()
        .start_summarize(ContractScope::User, "c1")
        .await
        .unwrap();

    let cached = rt
        .cache()
        .get(&ContractScope::User.list_key(&ListContractsArgs::default()))
        .unwrap();
    assert_eq!(cached["items"][0]["summarizeStatus"], "ongoing");
    assert_eq!(
        rt.processing().get_status("c1"),
        Some(ProcessingStatus::Processing)
    );
}

#[tokio::test]
async fn test_login_sets_bearer_for_later_calls() {
    let base = spawn_backend().await;
    let rt = runtime(&base);

    let err = rt.auth().login("a@b.fr", "wrong").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert!(!rt.store().read().session.is_authenticated());

    let user = rt.auth().login("a@b.fr", "correct horse").await.unwrap();
    assert_eq!(user.credit_balance, 100);
    assert_eq!(rt.api().token().as_deref(), Some("jwt-1"));

    let refreshed = rt.auth().refresh_profile().await.unwrap();
    assert_eq!(refreshed.credit_balance, 42);
    assert_eq!(rt.store().read().session.credit_balance(), Some(42));

    rt.auth().logout();
    let err = rt.auth().refresh_profile().await.unwrap_err();
    assert!(err.is_unauthorized());
}
