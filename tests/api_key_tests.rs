use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use gatehouse::config::Config;
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

fn test_config() -> Config {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.general.max_db_connections = 1;
    config.general.min_db_connections = 1;
    config.security.jwt_secret = "integration-test-secret".to_string();
    config.security.hmac_key = "integration-test-hmac-key".to_string();
    config.security.api_key_cipher_key = "aa".repeat(32);
    config.security.argon2_memory_cost_kib = 8;
    config.security.argon2_time_cost = 1;
    config
}

async fn spawn_app() -> (Router, Arc<gatehouse::api::AppState>) {
    let state = gatehouse::api::create_app_state_from_config(test_config(), None)
        .await
        .expect("Failed to create app state");
    (gatehouse::api::router(state.clone()), state)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn signup_and_signin(app: &Router, email: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/signup")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "email": email,
                        "password": "Str0ng!pass",
                        "first_name": "Key",
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/signin")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "email": email, "password": "Str0ng!pass" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["data"]["token"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn create_api_key(app: &Router, token: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/apikeys")
                .header("client", "not-browser")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["api_key"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn api_key_resolves_to_the_same_account() {
    let (app, _state) = spawn_app().await;

    let token = signup_and_signin(&app, "owner@b.com").await;
    let api_key = create_api_key(&app, &token).await;

    assert_eq!(api_key.len(), 64);
    assert!(api_key.chars().all(|c| c.is_ascii_hexdigit()));

    // No token at all: the key alone must resolve the principal.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/accounts/me")
                .header("x-api-key", &api_key)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["email"], "owner@b.com");
}

#[tokio::test]
async fn missing_credentials_are_forbidden() {
    let (app, _state) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/accounts/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "API key is required");
}

#[tokio::test]
async fn fabricated_key_is_invalid() {
    let (app, _state) = spawn_app().await;

    let token = signup_and_signin(&app, "owner@b.com").await;
    create_api_key(&app, &token).await;

    let fabricated = "ab".repeat(32);
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/accounts/me")
                .header("x-api-key", fabricated)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let json = body_json(response).await;
    assert_eq!(json["message"], "Invalid API key");
}

#[tokio::test]
async fn second_key_for_the_same_account_conflicts() {
    let (app, _state) = spawn_app().await;

    let token = signup_and_signin(&app, "owner@b.com").await;
    create_api_key(&app, &token).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/apikeys")
                .header("client", "not-browser")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn rotation_invalidates_the_old_key() {
    let (app, _state) = spawn_app().await;

    let token = signup_and_signin(&app, "owner@b.com").await;
    let old_key = create_api_key(&app, &token).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/apikeys/rotate")
                .header("client", "not-browser")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let new_key = body_json(response).await["data"]["api_key"]
        .as_str()
        .unwrap()
        .to_string();
    assert_ne!(old_key, new_key);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/accounts/me")
                .header("x-api-key", &old_key)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/accounts/me")
                .header("x-api-key", &new_key)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn reveal_returns_the_created_plaintext() {
    let (app, _state) = spawn_app().await;

    let token = signup_and_signin(&app, "owner@b.com").await;
    let created = create_api_key(&app, &token).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/apikeys/mine")
                .header("client", "not-browser")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["api_key"], created);
}

#[tokio::test]
async fn deleted_key_stops_authenticating() {
    let (app, _state) = spawn_app().await;

    let token = signup_and_signin(&app, "owner@b.com").await;
    let api_key = create_api_key(&app, &token).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/apikeys/mine")
                .header("client", "not-browser")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/accounts/me")
                .header("x-api-key", &api_key)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn key_is_accepted_from_query_parameter() {
    let (app, _state) = spawn_app().await;

    let token = signup_and_signin(&app, "owner@b.com").await;
    let api_key = create_api_key(&app, &token).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/accounts/me?apiKey={api_key}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn key_is_accepted_from_json_body_field() {
    let (app, _state) = spawn_app().await;

    let token = signup_and_signin(&app, "owner@b.com").await;
    let api_key = create_api_key(&app, &token).await;

    // The sniffed body is restored intact for the handler.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/posts")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "apiKey": api_key,
                        "title": "Written via API key",
                        "body": "Body text",
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["data"]["title"], "Written via API key");
}

#[tokio::test]
async fn session_token_takes_precedence_over_api_key() {
    let (app, _state) = spawn_app().await;

    let token_a = signup_and_signin(&app, "a@b.com").await;
    let token_b = signup_and_signin(&app, "b@b.com").await;
    let key_b = create_api_key(&app, &token_b).await;
    drop(token_b);

    // Both credentials presented: the session identity wins.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/accounts/me")
                .header("client", "not-browser")
                .header("Authorization", format!("Bearer {token_a}"))
                .header("x-api-key", &key_b)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["email"], "a@b.com");
}

#[tokio::test]
async fn banned_owner_key_stops_resolving() {
    let (app, state) = spawn_app().await;

    let token = signup_and_signin(&app, "owner@b.com").await;
    let api_key = create_api_key(&app, &token).await;

    let account = state
        .store()
        .accounts()
        .get_by_email("owner@b.com")
        .await
        .unwrap()
        .unwrap();
    state
        .store()
        .accounts()
        .set_banned(account.id, true)
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/accounts/me")
                .header("x-api-key", &api_key)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
