mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use chrono::Months;
use serde_json::json;

use kindred_core::clock::Clock;
use kindred_server::config::AppConfig;
use kindred_shared::clients::redis::RedisClient;

use common::TestApp;

#[tokio::test]
async fn register_then_login() {
    let app = TestApp::new();
    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "email": "user@example.com",
                "password": "SecurePassword123",
                "birth_date": "1995-06-15",
                "display_name": "John",
                "gender": "male",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "註冊成功");
    let user_id = body["user_id"].as_i64().unwrap();

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "user@example.com", "password": "SecurePassword123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["access_token"].is_string());
    assert!(body["refresh_token"].is_string());
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["id"], user_id);
    assert_eq!(body["user"]["email"], "user@example.com");
    assert_eq!(body["user"]["display_name"], "John");

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "email": "USER@example.com",
                "password": "AnotherPass99",
                "birth_date": "1990-01-01",
                "display_name": "Johnny",
                "gender": "male",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
}

#[tokio::test]
async fn underage_registration_is_rejected() {
    let app = TestApp::new();
    let birth = app.clock.today().checked_sub_months(Months::new(17 * 12)).unwrap();
    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "email": "kid@example.com",
                "password": "SecurePassword123",
                "birth_date": birth.to_string(),
                "display_name": "Kid",
                "gender": "male",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("18"));
}

#[tokio::test]
async fn bad_credentials_and_tokens() {
    let app = TestApp::new();
    app.signup("alice@example.com").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "alice@example.com", "password": "wrong-password1" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid email or password");

    let (status, _) = app.call(Method::GET, "/users/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.get("/users/profile", "not-a-jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.get("/users/profile", "").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
    let app = TestApp::new();
    let alice = app.signup("alice@example.com").await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/matches/like")
        .header(header::AUTHORIZATION, format!("Bearer {}", alice.token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "E0002");

    let (status, _) = app.post("/api/matches/like", &alice.token, json!({ "target_user_id": "abc" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.post("/api/matches/like", &alice.token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.get("/api/chats/not-a-number/messages", &alice.token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.get("/api/matches/discover?limit=many", &alice.token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn refresh_tokens_rotate() {
    let app = TestApp::new();
    let alice = app.signup("alice@example.com").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({ "refresh_token": alice.refresh_token })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["refresh_token"], alice.refresh_token.as_str());
    let (status, _) = app.get("/users/profile", body["access_token"].as_str().unwrap()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({ "refresh_token": alice.refresh_token })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_update_round_trip() {
    let app = TestApp::new();
    let alice = app.signup("alice@example.com").await;

    let (status, body) = app
        .put(
            "/users/profile",
            &alice.token,
            json!({
                "display_name": "Alice",
                "bio": "coffee and climbing",
                "location": { "latitude": 25.03, "longitude": 121.56 },
                "max_distance": 30,
                "interests": [3, 1, 3],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["display_name"], "Alice");
    assert_eq!(body["max_distance"], 30);
    assert_eq!(body["interests"], json!([1, 3]));
    assert_eq!(body["age"], 30);

    let (status, body) = app.put("/users/profile", &alice.token, json!({ "max_distance": 500 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "E0002");
    assert_eq!(body["details"]["max_distance_km"][0], "max distance must be between 1 and 100 km");
    let (status, _) = app
        .put("/users/profile", &alice.token, json!({ "location": { "latitude": 91.0, "longitude": 0.0 } }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn multipart(fields: &[(&str, &[u8])]) -> (String, Vec<u8>) {
    let boundary = "kindred-test-boundary";
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        if *name == "photo" {
            body.extend_from_slice(
                b"Content-Disposition: form-data; name=\"photo\"; filename=\"p.png\"\r\nContent-Type: image/png\r\n\r\n",
            );
        } else {
            body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes());
        }
        body.extend_from_slice(value);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

fn png(len: usize) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.resize(len, 0);
    bytes
}

async fn upload(app: &TestApp, token: &str, fields: &[(&str, &[u8])]) -> (StatusCode, serde_json::Value) {
    let (content_type, body) = multipart(fields);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/users/photos")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap();
    app.send(request).await
}

#[tokio::test]
async fn photo_uploads() {
    let app = TestApp::with_config(AppConfig {
        max_photo_bytes: 2048,
        ..Default::default()
    });
    let alice = app.signup("alice@example.com").await;

    let first = png(512);
    let (status, body) = upload(&app, &alice.token, &[("photo", first.as_slice()), ("caption", &b"at the beach"[..])]).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["is_primary"], true);
    assert_eq!(body["caption"], "at the beach");

    let second = png(256);
    let (status, body) = upload(&app, &alice.token, &[("photo", second.as_slice()), ("is_primary", &b"true"[..])]).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["is_primary"], true);

    let (_, profile) = app.get("/users/profile", &alice.token).await;
    let primaries = profile["photos"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|p| p["is_primary"] == true)
        .count();
    assert_eq!(primaries, 1);

    let big = png(4096);
    let (status, _) = upload(&app, &alice.token, &[("photo", big.as_slice())]).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    let (status, _) = upload(&app, &alice.token, &[("photo", &b"plain text, not an image"[..])]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = upload(&app, &alice.token, &[("caption", &b"no photo"[..])]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn like_and_mutual_match_then_chat() {
    let app = TestApp::new();
    let alice = app.signup("alice@example.com").await;
    let bob = app.signup("bob@example.com").await;

    let (status, body) = app.get("/api/matches/discover", &alice.token).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["users"].as_array().unwrap().iter().any(|u| u["id"] == bob.id));

    let (status, body) = app.post("/api/matches/like", &alice.token, json!({ "target_user_id": bob.id })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["is_matched"], false);

    let (_, body) = app.get("/api/matches/discover", &alice.token).await;
    assert!(!body["users"].as_array().unwrap().iter().any(|u| u["id"] == bob.id));

    let (status, body) = app.post("/api/matches/like", &bob.token, json!({ "target_user_id": alice.id })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["is_matched"], true);
    let match_id = body["match_id"].as_i64().unwrap();

    let (status, body) = app
        .post(&format!("/api/chats/{match_id}/messages"), &alice.token, json!({ "content": "hi" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["content"], "hi");
    assert!(body["id"].is_i64());
    assert!(body["created_at"].is_string());

    let (status, body) = app.get("/api/matches", &alice.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matches"][0]["match_id"], match_id);

    let (status, _) = app.post("/api/matches/like", &alice.token, json!({ "target_user_id": bob.id })).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn like_errors() {
    let app = TestApp::new();
    let alice = app.signup("alice@example.com").await;

    let (status, _) = app.post("/api/matches/like", &alice.token, json!({ "target_user_id": alice.id })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.post("/api/matches/like", &alice.token, json!({ "target_user_id": 987_654 })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pass_hides_the_target() {
    let app = TestApp::new();
    let alice = app.signup("alice@example.com").await;
    let bob = app.signup("bob@example.com").await;

    let (status, _) = app.post("/api/matches/pass", &alice.token, json!({ "target_user_id": bob.id })).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.post("/api/matches/pass", &alice.token, json!({ "target_user_id": bob.id })).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = app.get("/api/matches/discover", &alice.token).await;
    assert!(body["users"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn block_cuts_chat() {
    let app = TestApp::new();
    let alice = app.signup("alice@example.com").await;
    let bob = app.signup("bob@example.com").await;
    let match_id = app.matched(&alice, &bob).await;

    let (status, _) = app
        .post("/api/blocks", &alice.token, json!({ "blocked_user_id": bob.id, "reason": "harassment" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let uri = format!("/api/chats/{match_id}/messages");
    let (status, _) = app.post(&uri, &alice.token, json!({ "content": "x" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.post(&uri, &bob.token, json!({ "content": "why" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = app.get("/api/chats", &bob.token).await;
    assert!(body["chats"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn read_cursor_clears_unread() {
    let app = TestApp::new();
    let alice = app.signup("alice@example.com").await;
    let bob = app.signup("bob@example.com").await;
    let match_id = app.matched(&alice, &bob).await;

    let uri = format!("/api/chats/{match_id}/messages");
    let mut last_id = 0;
    for n in 1..=5 {
        let (status, body) = app.post(&uri, &bob.token, json!({ "content": format!("message {n}") })).await;
        assert_eq!(status, StatusCode::CREATED);
        last_id = body["id"].as_i64().unwrap();
    }

    let (_, body) = app.get("/api/chats", &alice.token).await;
    assert_eq!(body["chats"][0]["unread_count"], 5);

    let (status, body) = app.get(&format!("{uri}?limit=2"), &alice.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    assert_eq!(body["messages"][0]["id"], last_id);
    assert_eq!(body["has_more"], true);

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/api/chats/{match_id}/read?up_to={last_id}"),
            Some(&alice.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = app.get("/api/chats", &alice.token).await;
    assert_eq!(body["chats"][0]["unread_count"], 0);
    assert_eq!(body["chats"][0]["last_message"]["content"], "message 5");

    // Moving backwards leaves the cursor alone.
    let (status, _) = app
        .put(&format!("/api/chats/{match_id}/read"), &alice.token, json!({ "up_to": 1 }))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = app.get("/api/chats", &alice.token).await;
    assert_eq!(body["chats"][0]["unread_count"], 0);
}

#[tokio::test]
async fn outsiders_cannot_read_a_chat() {
    let app = TestApp::new();
    let alice = app.signup("alice@example.com").await;
    let bob = app.signup("bob@example.com").await;
    let carol = app.signup("carol@example.com").await;
    let match_id = app.matched(&alice, &bob).await;

    let (status, _) = app.get(&format!("/api/chats/{match_id}/messages"), &carol.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get("/api/chats/99999/messages", &carol.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .call(Method::PUT, &format!("/api/chats/{match_id}/read"), Some(&carol.token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn push_channel_requires_a_token() {
    let app = TestApp::new();
    let (status, _) = app.call(Method::GET, "/ws", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.call(Method::GET, "/ws?token=garbage", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_and_metrics() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"][0]["name"], "store");

    let (status, _) = app.call(Method::GET, "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn rate_limit_is_a_no_op_without_redis() {
    let app = TestApp::with_config(AppConfig {
        rate_limit_per_minute: 1,
        ..AppConfig::default()
    });
    let bob = app.signup("bob@example.com").await;
    for _ in 0..3 {
        let (status, _) = app.get("/api/chats", &bob.token).await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn read_cursor_by_message_number() {
    let app = TestApp::new();
    let alice = app.signup("alice@example.com").await;
    let bob = app.signup("bob@example.com").await;
    let match_id = app.matched(&alice, &bob).await;

    let uri = format!("/api/chats/{match_id}/messages");
    for n in 1..=5 {
        let (status, body) = app.post(&uri, &bob.token, json!({ "content": format!("message {n}") })).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], n);
    }

    let (status, _) = app
        .call(Method::PUT, &format!("/api/chats/{match_id}/read?up_to=5"), Some(&alice.token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.get("/api/chats", &alice.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chats"][0]["match_id"], match_id);
    assert_eq!(body["chats"][0]["unread_count"], 0);
}

#[tokio::test]
async fn unmatch_ends_the_chat() {
    let app = TestApp::new();
    let alice = app.signup("alice@example.com").await;
    let bob = app.signup("bob@example.com").await;
    let carol = app.signup("carol@example.com").await;
    let match_id = app.matched(&alice, &bob).await;
    let uri = format!("/api/matches/{match_id}");

    let (status, body) = app.call(Method::DELETE, &uri, Some(&carol.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "E4002");

    let (status, _) = app.call(Method::DELETE, &uri, Some(&bob.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = app.get("/api/chats", &alice.token).await;
    assert!(body["chats"].as_array().unwrap().is_empty());
    let (_, body) = app.get("/api/matches", &alice.token).await;
    assert!(body["matches"].as_array().unwrap().is_empty());

    let (status, _) = app
        .post(&format!("/api/chats/{match_id}/messages"), &alice.token, json!({ "content": "still there?" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Both likes stay on record, so the pair neither resurfaces nor re-matches.
    let (_, body) = app.get("/api/matches/discover", &alice.token).await;
    assert!(!body["users"].as_array().unwrap().iter().any(|u| u["id"] == bob.id));
    let (status, _) = app.post("/api/matches/like", &alice.token, json!({ "target_user_id": bob.id })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app.call(Method::DELETE, &uri, Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "E3004");
}

#[tokio::test]
async fn photos_can_be_removed_and_promoted() {
    let app = TestApp::new();
    let alice = app.signup("alice@example.com").await;
    let bob = app.signup("bob@example.com").await;

    let bytes = png(128);
    let (_, first) = upload(&app, &alice.token, &[("photo", bytes.as_slice())]).await;
    let (_, second) = upload(&app, &alice.token, &[("photo", bytes.as_slice())]).await;
    let (_, third) = upload(&app, &alice.token, &[("photo", bytes.as_slice())]).await;
    let (first, second, third) = (first["id"].as_i64().unwrap(), second["id"].as_i64().unwrap(), third["id"].as_i64().unwrap());

    let (status, body) = app.put(&format!("/users/photos/{third}/primary"), &alice.token, json!({})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["id"], third);
    assert_eq!(body["is_primary"], true);

    let primary_of = |profile: &serde_json::Value| -> Vec<i64> {
        profile["photos"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|p| p["is_primary"] == true)
            .map(|p| p["id"].as_i64().unwrap())
            .collect()
    };
    let (_, profile) = app.get("/users/profile", &alice.token).await;
    assert_eq!(primary_of(&profile), vec![third]);

    let (status, body) = app.call(Method::DELETE, &format!("/users/photos/{first}"), Some(&bob.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "E2008");
    let (status, _) = app.put(&format!("/users/photos/{second}/primary"), &bob.token, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Removing the primary hands the flag to the oldest remaining photo.
    let (status, _) = app.call(Method::DELETE, &format!("/users/photos/{third}"), Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, profile) = app.get("/users/profile", &alice.token).await;
    assert_eq!(profile["photos"].as_array().unwrap().len(), 2);
    assert_eq!(primary_of(&profile), vec![first]);

    let (status, body) = app.call(Method::DELETE, &format!("/users/photos/{third}"), Some(&alice.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "E2007");
    let (status, _) = app.put("/users/photos/424242/primary", &alice.token, json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn interest_catalog_bounds_profile_interests() {
    let app = TestApp::new();
    let alice = app.signup("alice@example.com").await;

    let (status, body) = app.get("/api/interests", &alice.token).await;
    assert_eq!(status, StatusCode::OK);
    let catalog = body["interests"].as_array().unwrap();
    assert_eq!(catalog.len(), 25);
    assert_eq!(catalog[0], json!({ "id": 1, "name": "Photography", "category": "hobbies" }));

    let (status, _) = app.call(Method::GET, "/api/interests", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.put("/users/profile", &alice.token, json!({ "interests": [1, 999] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "E0002");

    let (status, body) = app.put("/users/profile", &alice.token, json!({ "interests": [25, 23] })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["interests"], json!([23, 25]));
}

async fn from_client(app: &TestApp, client: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .uri("/api/interests")
        .header("x-forwarded-for", client)
        .body(Body::empty())
        .unwrap();
    app.send(request).await
}

/// Runs only when `KINDRED_REDIS_URL` points at a reachable Redis.
#[tokio::test]
async fn rate_limit_rejects_past_the_window_budget() {
    let Ok(url) = std::env::var("KINDRED_REDIS_URL") else { return };
    let redis = RedisClient::connect(&url).await.unwrap();
    let app = TestApp::with_redis(
        AppConfig {
            rate_limit_per_minute: 2,
            ..AppConfig::default()
        },
        redis,
    );
    let nonce = chrono::Utc::now().timestamp_nanos_opt().unwrap();
    let client = format!("198.51.100.{}-{nonce}", nonce % 250);

    for _ in 0..2 {
        let (status, _) = from_client(&app, &client).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, body) = from_client(&app, &client).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "E0006");

    let (status, _) = from_client(&app, &format!("{client}-other")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}
