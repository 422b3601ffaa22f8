#![allow(dead_code)]

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use cryptofolio_backend::auth::TokenIssuer;
use cryptofolio_backend::coingecko::PriceFeed;
use cryptofolio_backend::config::JwtConfig;
use cryptofolio_backend::data::{self, DataClient, DataState};
use cryptofolio_backend::db::{DatabasePool, Schema};
use cryptofolio_backend::handlers::{router, AppState};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

pub const API_KEY: &str = "test-key";

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn coins() -> Vec<Value> {
    vec![
        json!({
            "id": "bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "current_price": 50000,
            "market_cap": 900000000000u64,
            "price_change_percentage_24h": 2.5,
            "price_change_percentage_1h_in_currency": 0.5,
            "price_change_percentage_24h_in_currency": 2.5
        }),
        json!({
            "id": "ethereum",
            "symbol": "eth",
            "name": "Ethereum",
            "current_price": 2500.5,
            "market_cap": 300000000000u64,
            "price_change_percentage_24h": -1.25,
            "price_change_percentage_1h_in_currency": -0.1,
            "price_change_percentage_24h_in_currency": -1.25
        }),
    ]
}

async fn markets(
    State(hits): State<Arc<AtomicUsize>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);

    if query.get("vs_currency").map(String::as_str) != Some("eur") {
        return (StatusCode::BAD_REQUEST, "vs_currency must be eur").into_response();
    }

    match query.get("ids") {
        // A coin id that makes the fake provider fail.
        Some(ids) if ids == "broken" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        Some(ids) => {
            let wanted: Vec<&str> = ids.split(',').collect();
            let found: Vec<Value> = coins()
                .into_iter()
                .filter(|coin| wanted.iter().any(|id| coin["id"] == *id))
                .collect();
            Json(found).into_response()
        }
        None => {
            let per_page: usize = query
                .get("per_page")
                .and_then(|n| n.parse().ok())
                .unwrap_or(100);
            Json(coins().into_iter().take(per_page).collect::<Vec<_>>()).into_response()
        }
    }
}

/// A stand-in for CoinGecko's `coins/markets`. Returns its `/api/v3` base URL
/// and a counter of requests served.
pub async fn spawn_fake_coingecko() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/api/v3/coins/markets", get(markets))
        .with_state(hits.clone());
    let base = spawn(app).await;
    (format!("{base}/api/v3"), hits)
}

/// A price feed that is always down.
pub async fn spawn_failing_coingecko() -> String {
    let app = Router::new().route(
        "/api/v3/coins/markets",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
    );
    format!("{}/api/v3", spawn(app).await)
}

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "integration-secret".to_string(),
        issuer: "cryptofolio".to_string(),
        audience: "cryptofolio-clients".to_string(),
        ttl_hours: 1,
    }
}

/// An address nothing is listening on.
pub async fn unused_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

pub async fn spawn_data_service() -> String {
    let pool = DatabasePool::open_in_memory(Schema::Portfolio).unwrap();
    spawn(data::router(DataState::new(pool, API_KEY))).await
}

/// Public API, data service and fake price feed, all in memory.
pub struct TestStack {
    pub api: String,
    pub data: String,
    pub market_hits: Arc<AtomicUsize>,
    pub http: reqwest::Client,
}

pub async fn spawn_stack() -> TestStack {
    let data = spawn_data_service().await;
    spawn_stack_against(data, API_KEY).await
}

/// Public API wired to the data service at `data`, authenticating with
/// `api_key`.
pub async fn spawn_stack_against(data: String, api_key: &str) -> TestStack {
    let (coingecko, market_hits) = spawn_fake_coingecko().await;

    let state = AppState {
        users: DatabasePool::open_in_memory(Schema::Accounts).unwrap(),
        data: DataClient::new(&data, api_key).unwrap(),
        market: PriceFeed::new(&coingecko, Duration::ZERO).unwrap(),
        tokens: Arc::new(TokenIssuer::new(&jwt_config())),
        bcrypt_cost: 4,
    };
    let api = spawn(router(state)).await;

    TestStack {
        api,
        data,
        market_hits,
        http: reqwest::Client::new(),
    }
}

impl TestStack {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.api, path)
    }

    pub async fn register(&self, email: &str, password: &str) -> reqwest::Response {
        self.http
            .post(self.url("/api/auth/register"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap()
    }

    /// Register a fresh user and return its bearer token.
    pub async fn token_for(&self, email: &str) -> String {
        let response = self.register(email, "hunter22").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn trade(&self, token: &str, body: Value) -> reqwest::Response {
        self.http
            .post(self.url("/api/portfolio/transaction"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.http
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }
}

pub fn assert_close(actual: &Value, expected: f64) {
    let actual = actual
        .as_f64()
        .unwrap_or_else(|| panic!("{actual} is not a number"));
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}
