use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use gatehouse::config::Config;
use gatehouse::models::Role;
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

fn authed_json(method: &str, uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("client", "not-browser")
        .header("Authorization", format!("Bearer {token}"))
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("client", "not-browser")
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
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
                        "first_name": "Domain",
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

async fn grant_role(state: &gatehouse::api::AppState, email: &str, role: Role) {
    let mut account = state
        .store()
        .accounts()
        .get_by_email(email)
        .await
        .unwrap()
        .unwrap();
    account.roles.grant(role);
    state
        .store()
        .accounts()
        .set_roles(account.id, &account.roles)
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Short URLs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn short_url_create_redirect_and_click_count() {
    let (app, _state) = spawn_app().await;
    let token = signup_and_signin(&app, "url@b.com").await;

    let response = app
        .clone()
        .oneshot(authed_json(
            "POST",
            "/api/shorturls",
            &token,
            serde_json::json!({ "full_url": "https://example.com/page", "short_code": "mylink1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/s/mylink1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "https://example.com/page"
    );

    let response = app
        .clone()
        .oneshot(authed("GET", "/api/shorturls/mine", &token))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["data"][0]["clicks"], 1);
}

#[tokio::test]
async fn duplicate_short_urls_conflict() {
    let (app, _state) = spawn_app().await;
    let token = signup_and_signin(&app, "url@b.com").await;

    let response = app
        .clone()
        .oneshot(authed_json(
            "POST",
            "/api/shorturls",
            &token,
            serde_json::json!({ "full_url": "https://example.com/page", "short_code": "mylink1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Same code, different URL.
    let response = app
        .clone()
        .oneshot(authed_json(
            "POST",
            "/api/shorturls",
            &token,
            serde_json::json!({ "full_url": "https://example.com/other", "short_code": "mylink1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Same URL, generated code.
    let response = app
        .clone()
        .oneshot(authed_json(
            "POST",
            "/api/shorturls",
            &token,
            serde_json::json!({ "full_url": "https://example.com/page" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn listing_all_short_urls_requires_url_admin() {
    let (app, state) = spawn_app().await;
    let token = signup_and_signin(&app, "url@b.com").await;

    let response = app
        .clone()
        .oneshot(authed("GET", "/api/shorturls", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    grant_role(&state, "url@b.com", Role::UrlAdmin).await;
    // The account is reloaded on every request, so the same token now
    // carries the new role.
    let response = app
        .clone()
        .oneshot(authed("GET", "/api/shorturls", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn only_owner_or_admin_deletes_short_urls() {
    let (app, _state) = spawn_app().await;
    let owner = signup_and_signin(&app, "owner@b.com").await;
    let other = signup_and_signin(&app, "other@b.com").await;

    let response = app
        .clone()
        .oneshot(authed_json(
            "POST",
            "/api/shorturls",
            &owner,
            serde_json::json!({ "full_url": "https://example.com/page", "short_code": "owned01" }),
        ))
        .await
        .unwrap();
    let id = body_json(response).await["data"]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(authed("DELETE", &format!("/api/shorturls/{id}"), &other))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(authed("DELETE", &format!("/api/shorturls/{id}"), &owner))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn post_crud_with_ownership() {
    let (app, _state) = spawn_app().await;
    let owner = signup_and_signin(&app, "author@b.com").await;
    let other = signup_and_signin(&app, "reader@b.com").await;

    let response = app
        .clone()
        .oneshot(authed_json(
            "POST",
            "/api/posts",
            &owner,
            serde_json::json!({ "title": "First", "body": "Hello" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["data"]["id"].as_i64().unwrap();

    // Non-owner cannot edit.
    let response = app
        .clone()
        .oneshot(authed_json(
            "PATCH",
            &format!("/api/posts/{id}"),
            &other,
            serde_json::json!({ "title": "Hijacked", "body": "Nope" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Owner edit marks the post edited.
    let response = app
        .clone()
        .oneshot(authed_json(
            "PATCH",
            &format!("/api/posts/{id}"),
            &owner,
            serde_json::json!({ "title": "First (rev)", "body": "Hello again" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["edited"], true);

    // Non-owner cannot delete either.
    let response = app
        .clone()
        .oneshot(authed("DELETE", &format!("/api/posts/{id}"), &other))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(authed("DELETE", &format!("/api/posts/{id}"), &owner))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(authed("GET", &format!("/api/posts/{id}"), &owner))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Billing subscriptions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn subscription_lifecycle() {
    let (app, _state) = spawn_app().await;
    let token = signup_and_signin(&app, "billing@b.com").await;

    let start = (chrono::Utc::now() - chrono::Duration::hours(2)).to_rfc3339();
    let response = app
        .clone()
        .oneshot(authed_json(
            "POST",
            "/api/subscriptions",
            &token,
            serde_json::json!({
                "name": "Streaming",
                "price": 9.99,
                "frequency": "monthly",
                "start_date": start,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "active");
    assert_eq!(json["data"]["currency"], "USD");
    let id = json["data"]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(authed(
            "POST",
            &format!("/api/subscriptions/{id}/cancel"),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "cancelled");

    // Cancelling twice is a validation error.
    let response = app
        .clone()
        .oneshot(authed(
            "POST",
            &format!("/api/subscriptions/{id}/cancel"),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn subscription_with_future_start_is_rejected() {
    let (app, _state) = spawn_app().await;
    let token = signup_and_signin(&app, "billing@b.com").await;

    let start = (chrono::Utc::now() + chrono::Duration::days(1)).to_rfc3339();
    let response = app
        .clone()
        .oneshot(authed_json(
            "POST",
            "/api/subscriptions",
            &token,
            serde_json::json!({
                "name": "Streaming",
                "price": 9.99,
                "start_date": start,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn other_accounts_cannot_read_foreign_subscriptions() {
    let (app, _state) = spawn_app().await;
    let owner = signup_and_signin(&app, "billing@b.com").await;
    let other = signup_and_signin(&app, "nosy@b.com").await;

    let start = (chrono::Utc::now() - chrono::Duration::hours(2)).to_rfc3339();
    let response = app
        .clone()
        .oneshot(authed_json(
            "POST",
            "/api/subscriptions",
            &owner,
            serde_json::json!({ "name": "Streaming", "price": 9.99, "start_date": start }),
        ))
        .await
        .unwrap();
    let id = body_json(response).await["data"]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(authed("GET", &format!("/api/subscriptions/{id}"), &other))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Newsletter
// ---------------------------------------------------------------------------

#[tokio::test]
async fn provider_registration_and_subscription_flow() {
    let (app, _state) = spawn_app().await;
    let token = signup_and_signin(&app, "provider@b.com").await;

    let response = app
        .clone()
        .oneshot(authed_json(
            "POST",
            "/api/newsletter/provider",
            &token,
            serde_json::json!({
                "name": "Weekly Digest",
                "email": "digest@b.com",
                "password": "Pr0vider!pass",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let provider_id = body_json(response).await["data"]["id"].as_i64().unwrap();

    // Owner account now carries the provider role.
    let response = app
        .clone()
        .oneshot(authed("GET", "/api/accounts/me", &token))
        .await
        .unwrap();
    let roles = body_json(response).await["data"]["roles"].clone();
    assert!(
        roles
            .as_array()
            .unwrap()
            .iter()
            .any(|r| r == "newsletter-provider")
    );

    // Subscribing is public.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/newsletter/subscribe")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "name": "Reader",
                        "email": "reader@b.com",
                        "provider_ids": [provider_id],
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Unsubscribe removes the last provider and the record with it.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/newsletter/unsubscribe")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "email": "reader@b.com", "provider_id": provider_id })
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn mail_settings_require_the_provider_password() {
    let (app, _state) = spawn_app().await;
    let token = signup_and_signin(&app, "provider@b.com").await;

    let response = app
        .clone()
        .oneshot(authed_json(
            "POST",
            "/api/newsletter/provider",
            &token,
            serde_json::json!({
                "name": "Weekly Digest",
                "email": "digest@b.com",
                "password": "Pr0vider!pass",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let settings = |provider_password: &str| {
        serde_json::json!({
            "provider_password": provider_password,
            "sender_name": "Digest Bot",
            "mail_address": "digest@b.com",
            "mail_service": "smtp.example.com",
            "relay_password": "relay-secret",
        })
    };

    let response = app
        .clone()
        .oneshot(authed_json(
            "PUT",
            "/api/newsletter/provider/mail-settings",
            &token,
            settings("Wr0ng!pass"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(authed_json(
            "PUT",
            "/api/newsletter/provider/mail-settings",
            &token,
            settings("Pr0vider!pass"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["mail_address"], "digest@b.com");
    // The relay password itself is never echoed back.
    assert!(json["data"].get("mail_password_encrypted").is_none());
}

#[tokio::test]
async fn sending_without_provider_role_is_forbidden() {
    let (app, _state) = spawn_app().await;
    let token = signup_and_signin(&app, "nobody@b.com").await;

    let response = app
        .clone()
        .oneshot(authed_json(
            "POST",
            "/api/newsletter/send",
            &token,
            serde_json::json!({
                "provider_password": "whatever",
                "subject": "Hi",
                "content": "<p>Hi</p>",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn sending_without_mail_settings_is_a_validation_error() {
    let (app, _state) = spawn_app().await;
    let token = signup_and_signin(&app, "provider@b.com").await;

    let response = app
        .clone()
        .oneshot(authed_json(
            "POST",
            "/api/newsletter/provider",
            &token,
            serde_json::json!({
                "name": "Weekly Digest",
                "email": "digest@b.com",
                "password": "Pr0vider!pass",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(authed_json(
            "POST",
            "/api/newsletter/send",
            &token,
            serde_json::json!({
                "provider_password": "Pr0vider!pass",
                "subject": "Hi",
                "content": "<p>Hi</p>",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Admin & system
// ---------------------------------------------------------------------------

#[tokio::test]
async fn account_listing_is_admin_gated() {
    let (app, state) = spawn_app().await;
    let token = signup_and_signin(&app, "user@b.com").await;

    let response = app
        .clone()
        .oneshot(authed("GET", "/api/accounts", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    grant_role(&state, "user@b.com", Role::AuthAdmin).await;

    let response = app
        .clone()
        .oneshot(authed("GET", "/api/accounts", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn health_endpoint_is_public() {
    let (app, _state) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/system/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "ok");
}
