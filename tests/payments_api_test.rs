use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use mockito::{Matcher, Server};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use vandar_core::adapters::MemoryTransactionRepository;
use vandar_core::config::{AllowedIps, Config, ForwardedFor, GatewayConfig, LogFormat, RateLimits};
use vandar_core::domain::{Transaction, TransactionStatus};
use vandar_core::ports::{RepositoryError, RepositoryResult, TransactionRepository};
use vandar_core::{create_app, AppState};

const API_KEY: &str = "test-api-key";
const CALLBACK_URL: &str = "https://shop.example.com/payments/callback";

struct TestApp {
    base_url: String,
    repo: MemoryTransactionRepository,
    http: reqwest::Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http.post(self.url(path))
    }

    fn authed_post(&self, path: &str) -> reqwest::RequestBuilder {
        self.post(path).bearer_auth(API_KEY)
    }
}

/// Store whose writes always fail while reads go to `inner`.
#[derive(Clone, Default)]
struct ReadOnlyStore {
    inner: MemoryTransactionRepository,
}

fn disk_full() -> RepositoryError {
    RepositoryError::Storage("disk full".into())
}

#[async_trait]
impl TransactionRepository for ReadOnlyStore {
    async fn store(&self, _tx: &Transaction) -> RepositoryResult<()> {
        Err(disk_full())
    }

    async fn get(&self, token: &str) -> RepositoryResult<Transaction> {
        self.inner.get(token).await
    }

    async fn update(&self, _tx: &Transaction) -> RepositoryResult<Transaction> {
        Err(disk_full())
    }

    async fn list_by_status(&self, status: &TransactionStatus) -> RepositoryResult<Vec<Transaction>> {
        self.inner.list_by_status(status).await
    }
}

async fn spawn_app(gateway_url: &str, allowed_ips: AllowedIps) -> TestApp {
    let repo = MemoryTransactionRepository::new();
    let storage = Arc::new(repo.clone());
    spawn_app_with(gateway_url, allowed_ips, ForwardedFor::FirstEntry, repo, storage).await
}

/// `repo` is the view tests inspect; `storage` is what the service writes through.
async fn spawn_app_with(
    gateway_url: &str,
    allowed_ips: AllowedIps,
    forwarded_for: ForwardedFor,
    repo: MemoryTransactionRepository,
    storage: Arc<dyn TransactionRepository>,
) -> TestApp {
    let config = Config {
        server_port: 0,
        gateway: GatewayConfig::new(API_KEY, CALLBACK_URL).with_base_url(gateway_url),
        allowed_ips,
        forwarded_for,
        rate_limits: RateLimits::default(),
        log_format: LogFormat::Pretty,
    };

    let state = AppState::new(config, storage).unwrap();
    let app = create_app(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        base_url: format!("http://{}", addr),
        repo,
        http: reqwest::Client::new(),
    }
}

async fn spawn_app_with_failing_writes(gateway_url: &str) -> TestApp {
    let store = ReadOnlyStore::default();
    let repo = store.inner.clone();
    spawn_app_with(gateway_url, AllowedIps::Any, ForwardedFor::FirstEntry, repo, Arc::new(store)).await
}

#[tokio::test]
async fn test_health_is_unguarded() {
    let gateway = Server::new_async().await;
    let app = spawn_app(&gateway.url(), AllowedIps::Any).await;

    let response = app.http.get(app.url("/health")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["sandbox"], true);
}

#[tokio::test]
async fn test_init_rejects_missing_or_bad_credentials() {
    let mut gateway = Server::new_async().await;
    let mock = gateway
        .mock("POST", "/api/v4/send")
        .expect(0)
        .create_async()
        .await;
    let app = spawn_app(&gateway.url(), AllowedIps::Any).await;

    let attempts = [None, Some("Basic dGVzdA=="), Some("Bearer wrong-key"), Some(API_KEY)];
    for header in attempts {
        let mut request = app.post("/payments/init").json(&json!({ "amount": 20000 }));
        if let Some(value) = header {
            request = request.header("authorization", value);
        }

        let response = request.send().await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "header {header:?}");
        assert_eq!(response.headers()["x-frame-options"], "DENY");

        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({ "status": false, "message": "Unauthorized" }));
    }

    mock.assert_async().await;
    assert!(app.repo.is_empty().await);
}

#[tokio::test]
async fn test_init_payment_round_trip() {
    let mut gateway = Server::new_async().await;
    let mock = gateway
        .mock("POST", "/api/v4/send")
        .match_body(Matcher::PartialJson(json!({
            "amount": 20000,
            "callback_url": CALLBACK_URL,
            "mobile": "09121234567"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "status": 1, "token": "tok_abc" }).to_string())
        .expect(1)
        .create_async()
        .await;
    let app = spawn_app(&gateway.url(), AllowedIps::Any).await;

    let response = app
        .authed_post("/payments/init")
        .header("x-request-id", "client-req-7")
        .json(&json!({ "amount": 20000, "mobile": "09121234567" }))
        .send()
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "client-req-7");
    assert_eq!(
        response.headers()["content-security-policy"],
        "default-src 'self'"
    );
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert!(response.headers().contains_key("strict-transport-security"));
    assert!(response.headers().contains_key("referrer-policy"));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], 1);
    assert_eq!(body["token"], "tok_abc");

    let stored = app.repo.get("tok_abc").await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Init);
}

#[tokio::test]
async fn test_init_validation_errors_skip_gateway() {
    let mut gateway = Server::new_async().await;
    let mock = gateway
        .mock("POST", "/api/v4/send")
        .expect(0)
        .create_async()
        .await;
    let app = spawn_app(&gateway.url(), AllowedIps::Any).await;

    let response = app
        .authed_post("/payments/init")
        .json(&json!({ "amount": 500, "mobile": "555" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], false);
    assert_eq!(body["message"], "Validation failed");
    assert!(body["errors"]["amount"].is_string());
    assert!(body["errors"]["mobile"].is_string());

    mock.assert_async().await;
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let gateway = Server::new_async().await;
    let app = spawn_app(&gateway.url(), AllowedIps::Any).await;

    let response = app
        .authed_post("/payments/verify")
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], false);
}

#[tokio::test]
async fn test_refund_rate_limit_per_client_ip() {
    let mut gateway = Server::new_async().await;
    let mock = gateway
        .mock("POST", Matcher::Regex(r"^/v3/business/.+/refund$".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "status": true, "refund_id": "rf_1" }).to_string())
        .expect(6)
        .create_async()
        .await;
    let app = spawn_app(&gateway.url(), AllowedIps::Any).await;

    let refund = |ip: &'static str| {
        app.authed_post("/payments/refund")
            .header("x-forwarded-for", ip)
            .json(&json!({ "transaction_id": "98765" }))
            .send()
    };

    for _ in 0..5 {
        assert_eq!(refund("198.51.100.10").await.unwrap().status(), StatusCode::OK);
    }

    let limited = refund("198.51.100.10").await.unwrap();
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = limited.json().await.unwrap();
    assert_eq!(body["status"], false);

    assert_eq!(refund("198.51.100.11").await.unwrap().status(), StatusCode::OK);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_declined_refund_is_unprocessable() {
    let mut gateway = Server::new_async().await;
    let _mock = gateway
        .mock("POST", "/v3/business/business/transaction/98765/refund")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "status": false, "message": "amount already refunded" }).to_string())
        .create_async()
        .await;
    let app = spawn_app(&gateway.url(), AllowedIps::Any).await;

    let response = app
        .authed_post("/payments/refund")
        .json(&json!({ "transaction_id": "98765", "amount": 10000 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "amount already refunded");
}

#[tokio::test]
async fn test_gateway_failure_is_not_leaked() {
    let mut gateway = Server::new_async().await;
    let _mock = gateway
        .mock("POST", "/api/v4/verify")
        .with_status(500)
        .with_body("panic at db.go:42 password=hunter2")
        .create_async()
        .await;
    let app = spawn_app(&gateway.url(), AllowedIps::Any).await;

    let response = app
        .authed_post("/payments/verify")
        .json(&json!({ "token": "tok_abc" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let text = response.text().await.unwrap();
    assert!(!text.contains("hunter2"));
}

#[tokio::test]
async fn test_status_endpoint() {
    let mut gateway = Server::new_async().await;
    let _mock = gateway
        .mock("GET", "/v4/tok_abc")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "status": true, "transactionStatus": "PAID" }).to_string())
        .create_async()
        .await;
    let app = spawn_app(&gateway.url(), AllowedIps::Any).await;

    let missing = app
        .http
        .get(app.url("/payments/status"))
        .bearer_auth(API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let response = app
        .http
        .get(app.url("/payments/status?token=tok_abc"))
        .bearer_auth(API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["transactionStatus"], "PAID");
}

#[tokio::test]
async fn test_callback_updates_transaction_status() {
    let gateway = Server::new_async().await;
    let allowed = AllowedIps::Cidrs(vec!["203.0.113.0/24".parse().unwrap()]);
    let app = spawn_app(&gateway.url(), allowed).await;

    let tx = Transaction::new("tok_abc".into(), 20_000, "order #12".into(), None);
    app.repo.store(&tx).await.unwrap();

    let response = app
        .post("/payments/callback")
        .header("x-forwarded-for", "203.0.113.5")
        .form(&[("token", "tok_abc"), ("status", "FAILED")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({ "status": true, "message": "Callback received successfully" })
    );

    let updated = app.repo.get("tok_abc").await.unwrap();
    assert_eq!(updated.status, TransactionStatus::Other("FAILED".into()));
    assert!(updated.updated_at >= tx.updated_at);
}

#[tokio::test]
async fn test_callback_for_unknown_token_is_acknowledged() {
    let gateway = Server::new_async().await;
    let app = spawn_app(&gateway.url(), AllowedIps::Any).await;

    let response = app
        .post("/payments/callback")
        .form(&[("token", "tok_unknown"), ("status", "PAID")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.repo.is_empty().await);
}

#[tokio::test]
async fn test_callback_requires_token_and_status() {
    let gateway = Server::new_async().await;
    let app = spawn_app(&gateway.url(), AllowedIps::Any).await;

    let response = app
        .post("/payments/callback")
        .form(&[("token", "tok_abc")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["errors"]["status"].is_string());
}

#[tokio::test]
async fn test_callback_from_unlisted_ip_is_forbidden() {
    let gateway = Server::new_async().await;
    let allowed = AllowedIps::Cidrs(vec!["203.0.113.7/32".parse().unwrap()]);
    let app = spawn_app(&gateway.url(), allowed).await;

    let tx = Transaction::new("tok_abc".into(), 20_000, String::new(), None);
    app.repo.store(&tx).await.unwrap();

    let response = app
        .post("/payments/callback")
        .header("x-forwarded-for", "192.0.2.1")
        .form(&[("token", "tok_abc"), ("status", "PAID")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");

    let unchanged = app.repo.get("tok_abc").await.unwrap();
    assert_eq!(unchanged.status, TransactionStatus::Init);
}

#[tokio::test]
async fn test_callback_behind_trusted_proxy_ignores_spoofed_entry() {
    let gateway = Server::new_async().await;
    let allowed = AllowedIps::Cidrs(vec!["203.0.113.7/32".parse().unwrap()]);
    let repo = MemoryTransactionRepository::new();
    let app = spawn_app_with(
        &gateway.url(),
        allowed,
        ForwardedFor::TrustedProxies(0),
        repo.clone(),
        Arc::new(repo),
    )
    .await;

    let tx = Transaction::new("tok_abc".into(), 20_000, String::new(), None);
    app.repo.store(&tx).await.unwrap();

    let response = app
        .post("/payments/callback")
        .header("x-forwarded-for", "203.0.113.7, 192.0.2.1")
        .form(&[("token", "tok_abc"), ("status", "PAID")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let unchanged = app.repo.get("tok_abc").await.unwrap();
    assert_eq!(unchanged.status, TransactionStatus::Init);
}

#[tokio::test]
async fn test_init_returns_token_when_storage_fails() {
    let mut gateway = Server::new_async().await;
    let _init = gateway
        .mock("POST", "/api/v4/send")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "status": 1, "token": "tok_abc" }).to_string())
        .expect(1)
        .create_async()
        .await;
    let app = spawn_app_with_failing_writes(&gateway.url()).await;

    let response = app
        .authed_post("/payments/init")
        .json(&json!({ "amount": 20000 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["token"], "tok_abc");
    assert!(app.repo.is_empty().await);
}

#[tokio::test]
async fn test_callback_is_acknowledged_when_storage_fails() {
    let gateway = Server::new_async().await;
    let app = spawn_app_with_failing_writes(&gateway.url()).await;

    let tx = Transaction::new("tok_abc".into(), 20_000, String::new(), None);
    app.repo.store(&tx).await.unwrap();

    let response = app
        .post("/payments/callback")
        .form(&[("token", "tok_abc"), ("status", "PAID")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({ "status": true, "message": "Callback received successfully" })
    );

    let unchanged = app.repo.get("tok_abc").await.unwrap();
    assert_eq!(unchanged.status, TransactionStatus::Init);
}
