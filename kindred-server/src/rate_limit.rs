use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use kindred_shared::middleware::{extract_bearer_token, AuthState};
use kindred_shared::{AppError, ErrorCode};

use crate::AppState;

/// Per-minute fixed window keyed by `rl:{client}:{YYYYMMDDHHMM}`. A no-op
/// without Redis; a Redis failure lets the request through.
pub async fn rate_limit(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let Some(redis) = &state.redis else {
        return next.run(req).await;
    };
    if req.uri().path() == "/health" || req.uri().path() == "/metrics" {
        return next.run(req).await;
    }

    let key = format!("rl:{}:{}", client_key(&state, &req), Utc::now().format("%Y%m%d%H%M"));
    match redis.rate_limit_check(&key, state.config.rate_limit_per_minute, 60).await {
        Ok(true) => next.run(req).await,
        Ok(false) => {
            tracing::debug!(key = %key, "rate limit exceeded");
            AppError::new(ErrorCode::RateLimited, "too many requests, slow down").into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "rate limiter unavailable");
            next.run(req).await
        }
    }
}

/// Bearer subject when the token is valid, otherwise the peer address.
fn client_key(state: &AppState, req: &Request) -> String {
    if let Some(claims) = extract_bearer_token(req.headers())
        .ok()
        .and_then(|token| state.tokens().validate(&token).ok())
    {
        return format!("user:{}", claims.sub);
    }
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
    {
        return format!("ip:{}", forwarded.trim());
    }
    match req.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => format!("ip:{}", addr.ip()),
        None => "anonymous".to_string(),
    }
}
