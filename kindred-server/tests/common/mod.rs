#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use kindred_core::clock::ManualClock;
use kindred_core::identity::{Argon2Hasher, MemoryPhotoStore};
use kindred_core::store::MemoryStore;
use kindred_server::config::AppConfig;
use kindred_server::{build_router, AppState, Collaborators};
use kindred_shared::clients::redis::RedisClient;
use kindred_shared::middleware::detached_metrics;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const PASSWORD: &str = "SecurePassword123";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
}

pub struct Account {
    pub id: i64,
    pub token: String,
    pub refresh_token: String,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self::build(config, None)
    }

    /// Same wiring with the Redis-backed rate limiter and presence mirror.
    pub fn with_redis(config: AppConfig, redis: RedisClient) -> Self {
        Self::build(config, Some(redis))
    }

    fn build(mut config: AppConfig, redis: Option<RedisClient>) -> Self {
        config.admin_emails = ADMIN_EMAIL.into();
        config.password_hash_memory_kib = 1024;
        config.password_hash_iterations = 1;

        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()));
        let hasher = Arc::new(Argon2Hasher::with_cost(1024, 1).unwrap());
        let state = AppState::new(
            config,
            Collaborators {
                store: Arc::new(MemoryStore::new()),
                photos: Arc::new(MemoryPhotoStore::new()),
                hasher,
                clock: clock.clone(),
                redis,
                metrics_handle: detached_metrics(),
            },
        );
        Self {
            router: build_router(state.clone()),
            state,
            clock,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, body)
    }

    pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, Some(token), Some(body)).await
    }

    /// Registers and logs in; the local part of `email` is the display name.
    pub async fn signup(&self, email: &str) -> Account {
        let name = email.split('@').next().unwrap();
        let (status, body) = self
            .call(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({
                    "email": email,
                    "password": PASSWORD,
                    "birth_date": "1995-06-15",
                    "display_name": name,
                    "gender": "female",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        self.login(email).await
    }

    pub async fn login(&self, email: &str) -> Account {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        Account {
            id: body["user"]["id"].as_i64().unwrap(),
            token: body["access_token"].as_str().unwrap().to_string(),
            refresh_token: body["refresh_token"].as_str().unwrap().to_string(),
        }
    }

    /// Both sides like each other; returns the match id.
    pub async fn matched(&self, a: &Account, b: &Account) -> i64 {
        let (status, _) = self.post("/api/matches/like", &a.token, json!({ "target_user_id": b.id })).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = self.post("/api/matches/like", &b.token, json!({ "target_user_id": a.id })).await;
        assert_eq!(status, StatusCode::CREATED);
        body["match_id"].as_i64().unwrap()
    }
}
