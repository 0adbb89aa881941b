use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, patch, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::crypto::TokenKeeper;
use crate::state::SharedState;

mod accounts;
mod apikeys;
pub mod auth;
mod error;
mod newsletter;
mod observability;
mod posts;
mod shorturls;
mod subscriptions;
mod system;
mod types;
pub mod validation;

pub use auth::{AuthMethod, Principal};
pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenKeeper {
        &self.shared.tokens
    }

    #[must_use]
    pub fn auth_service(&self) -> &Arc<dyn crate::services::AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn api_key_service(&self) -> &Arc<dyn crate::services::ApiKeyService> {
        &self.shared.api_key_service
    }

    #[must_use]
    pub fn newsletter_service(&self) -> &Arc<dyn crate::services::NewsletterService> {
        &self.shared.newsletter_service
    }
}

pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().server.cors_allowed_origins.clone();

    let protected_routes = create_protected_router(state.clone());

    // Subscribe/unsubscribe are open, but an API key is honored when one
    // is presented (the principal just rides along).
    let subscription_public = Router::new()
        .route("/newsletter/subscribe", post(newsletter::subscribe))
        .route("/newsletter/unsubscribe", post(newsletter::unsubscribe))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::attach_principal_if_present,
        ));

    let api_router = Router::new()
        .merge(protected_routes)
        .merge(subscription_public)
        .route("/auth/signup", post(auth::signup))
        .route("/auth/signin", post(auth::signin))
        .route("/auth/signout", post(auth::signout))
        .route(
            "/auth/verification/send",
            patch(auth::send_verification_code),
        )
        .route(
            "/auth/verification/confirm",
            patch(auth::confirm_verification),
        )
        .route("/auth/password/forgot/send", patch(auth::send_reset_code))
        .route(
            "/auth/password/forgot/confirm",
            patch(auth::reset_password),
        )
        .route("/system/health", get(system::health))
        .with_state(state.clone());

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .route(
            "/s/{code}",
            get(shorturls::follow_short_url).with_state(state),
        )
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/password", patch(auth::change_password))
        .route("/accounts/me", get(accounts::get_me))
        .route("/accounts/me", patch(accounts::update_me))
        .route("/accounts/me", delete(accounts::delete_me))
        .route("/accounts", get(accounts::list_accounts))
        .route("/accounts/lookup", post(accounts::lookup_account))
        .route("/accounts/{id}/ban", patch(accounts::set_banned))
        .route("/accounts/{id}/roles", put(accounts::set_roles))
        .route("/apikeys", post(apikeys::create_api_key))
        .route("/apikeys/mine", get(apikeys::get_my_api_key))
        .route("/apikeys/mine", delete(apikeys::delete_my_api_key))
        .route("/apikeys/rotate", post(apikeys::rotate_api_key))
        .route("/shorturls", post(shorturls::create_short_url))
        .route("/shorturls", get(shorturls::list_all_short_urls))
        .route("/shorturls/mine", get(shorturls::list_my_short_urls))
        .route("/shorturls/{id}", patch(shorturls::update_short_url))
        .route("/shorturls/{id}", delete(shorturls::delete_short_url))
        .route("/posts", post(posts::create_post))
        .route("/posts", get(posts::list_posts))
        .route("/posts/{id}", get(posts::get_post))
        .route("/posts/{id}", patch(posts::update_post))
        .route("/posts/{id}", delete(posts::delete_post))
        .route("/newsletter/provider", post(newsletter::register_provider))
        .route(
            "/newsletter/provider/mail-settings",
            put(newsletter::set_mail_settings),
        )
        .route("/newsletter/send", post(newsletter::send_newsletter))
        .route(
            "/newsletter/provider/workers",
            post(newsletter::add_worker),
        )
        .route(
            "/newsletter/provider/workers",
            delete(newsletter::remove_worker),
        )
        .route("/subscriptions", post(subscriptions::create_subscription))
        .route("/subscriptions", get(subscriptions::list_my_subscriptions))
        .route("/subscriptions/{id}", get(subscriptions::get_subscription))
        .route(
            "/subscriptions/{id}",
            put(subscriptions::update_subscription),
        )
        .route(
            "/subscriptions/{id}",
            delete(subscriptions::delete_subscription),
        )
        .route(
            "/subscriptions/{id}/cancel",
            post(subscriptions::cancel_subscription),
        )
        .route("/metrics", get(observability::get_metrics))
        // Principal resolution: the session token is tried first; the
        // API key is the fallback path, not an additive one. Layer order
        // is bottom-up, so the token stage is added last.
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_principal,
        ))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::resolve_session_token,
        ))
}
