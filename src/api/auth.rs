use axum::{
    Json,
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, MessageDto, TokenDto, validation};
use crate::db::Account;
use crate::services::SignupRequest;

/// Largest request body the API-key sniffer will buffer.
const MAX_SNIFFED_BODY_BYTES: usize = 64 * 1024;

// ============================================================================
// Principal
// ============================================================================

/// The resolved identity attached to a request after authentication.
#[derive(Clone, Debug)]
pub struct Principal {
    pub account: Account,
    pub method: AuthMethod,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMethod {
    SessionToken,
    ApiKey,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct SignupPayload {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Deserialize)]
pub struct SigninPayload {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct EmailPayload {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ConfirmCodePayload {
    pub email: String,
    pub code: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordPayload {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordPayload {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

// ============================================================================
// Middleware
// ============================================================================

/// Principal resolution, stage one: the session token.
///
/// Verifies a token when one is present (from the `Authorization: Bearer`
/// header for `client: not-browser` requests, else from the
/// `Authorization` cookie), reloads the full account, enforces the ban
/// flag, and attaches the [`Principal`]. A request with no token passes
/// through untouched; a request that already has a principal is left
/// unchanged.
pub async fn resolve_session_token(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if request.extensions().get::<Principal>().is_some() {
        return Ok(next.run(request).await);
    }

    let Some(token) = extract_token(request.headers()) else {
        return Ok(next.run(request).await);
    };

    // Malformed, tampered, and expired all collapse into the same
    // generic unauthorized answer.
    let claims = state
        .tokens()
        .verify(&token)
        .map_err(|_| ApiError::unauthorized())?;

    let account = state
        .store()
        .accounts()
        .get_by_id(claims.sub)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?
        .ok_or_else(ApiError::unauthorized)?;

    // A valid, unexpired token for a now-banned account dies here.
    if account.is_banned {
        return Err(ApiError::forbidden("Account is banned"));
    }

    tracing::Span::current().record("user_id", account.id);
    request.extensions_mut().insert(Principal {
        account,
        method: AuthMethod::SessionToken,
    });

    Ok(next.run(request).await)
}

/// Principal resolution, stage two: the API key, required.
///
/// Session identity takes precedence: a request that already carries a
/// principal short-circuits. Otherwise the candidate key is taken from
/// the `x-api-key` header, the `apiKey` query parameter, or the `apiKey`
/// body field (first non-empty wins) and resolved via fingerprint
/// lookup. Missing key and unresolvable key are both 403s.
pub async fn require_principal(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if request.extensions().get::<Principal>().is_some() {
        return Ok(next.run(request).await);
    }

    let (mut request, api_key) = extract_api_key(&state, request).await?;

    let Some(api_key) = api_key else {
        return Err(ApiError::forbidden("API key is required"));
    };

    let account = state
        .api_key_service()
        .resolve_key(&api_key)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::forbidden("Invalid API key"))?;

    tracing::Span::current().record("user_id", account.id);
    request.extensions_mut().insert(Principal {
        account,
        method: AuthMethod::ApiKey,
    });

    Ok(next.run(request).await)
}

/// Principal resolution, stage two: the API key, optional.
///
/// Same extraction and resolution as [`require_principal`], but absence
/// or failure to resolve falls through anonymously instead of failing
/// the request.
pub async fn attach_principal_if_present(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if request.extensions().get::<Principal>().is_some() {
        return Ok(next.run(request).await);
    }

    let (mut request, api_key) = extract_api_key(&state, request).await?;

    if let Some(api_key) = api_key
        && let Ok(Some(account)) = state.api_key_service().resolve_key(&api_key).await
    {
        tracing::Span::current().record("user_id", account.id);
        request.extensions_mut().insert(Principal {
            account,
            method: AuthMethod::ApiKey,
        });
    }

    Ok(next.run(request).await)
}

/// Pull the session token from the transport selected by the explicit
/// client-type signal.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    let not_browser = headers
        .get("client")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "not-browser");

    if not_browser {
        let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        return auth.strip_prefix("Bearer ").map(|t| t.trim().to_string());
    }

    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    for pair in cookies.split(';') {
        if let Some((name, value)) = pair.trim().split_once('=')
            && name == "Authorization"
        {
            let value = value.trim_matches('"');
            return value.strip_prefix("Bearer ").map(|t| t.trim().to_string());
        }
    }

    None
}

/// Extract the candidate API key: header, then query parameter, then
/// JSON body field. Sniffing the body consumes it, so the request is
/// rebuilt from the buffered bytes either way.
async fn extract_api_key(
    state: &AppState,
    request: Request,
) -> Result<(Request, Option<String>), ApiError> {
    if let Some(key) = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        let key = key.to_string();
        return Ok((request, Some(key)));
    }

    if state.config().server.allow_api_key_in_query
        && let Some(query) = request.uri().query()
    {
        let key = query.split('&').find_map(|pair| {
            pair.split_once('=')
                .filter(|(name, value)| *name == "apiKey" && !value.is_empty())
                .map(|(_, value)| value.to_string())
        });
        if key.is_some() {
            return Ok((request, key));
        }
    }

    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if !is_json {
        return Ok((request, None));
    }

    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_SNIFFED_BODY_BYTES)
        .await
        .map_err(|e| ApiError::validation(format!("Failed to read request body: {e}")))?;

    let key = serde_json::from_slice::<serde_json::Value>(&bytes)
        .ok()
        .and_then(|value| {
            value
                .get("apiKey")
                .and_then(|k| k.as_str())
                .filter(|k| !k.is_empty())
                .map(ToString::to_string)
        });

    let request = Request::from_parts(parts, Body::from(bytes));
    Ok((request, key))
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .map_or_else(
            || "unknown".to_string(),
            |v| v.split(',').next().unwrap_or("unknown").trim().to_string(),
        )
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignupPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let email = validation::validate_email(&payload.email)?;
    validation::validate_password(&payload.password)?;
    let first_name = validation::validate_name(&payload.first_name, "First name")?;

    let account = state
        .auth_service()
        .signup(SignupRequest {
            email,
            username: payload.username,
            first_name,
            last_name: payload.last_name,
            password: payload.password,
        })
        .await?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(ApiResponse::success(super::AccountDto::from(account))),
    ))
}

/// POST /api/auth/signin
///
/// Returns the token in the body for non-browser clients and also sets
/// it as a same-site cookie for browser clients.
pub async fn signin(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SigninPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let email = validation::validate_email(&payload.email)?;
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let ip = client_ip(&headers);
    let result = state
        .auth_service()
        .signin(&email, &payload.password, &ip)
        .await?;

    let secure = if state.config().server.secure_cookies && state.config().general.is_production()
    {
        "; Secure"
    } else {
        ""
    };
    let cookie = format!(
        "Authorization=\"Bearer {}\"; Path=/; Max-Age={}; HttpOnly; SameSite=Lax{}",
        result.token,
        state.tokens().lifetime_secs(),
        secure,
    );

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::success(TokenDto {
            token: result.token,
        })),
    ))
}

/// POST /api/auth/signout
pub async fn signout() -> impl IntoResponse {
    let cookie = "Authorization=\"\"; Path=/; Max-Age=0; HttpOnly";
    (
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::success(MessageDto {
            message: "Signed out successfully".to_string(),
        })),
    )
}

/// PATCH /api/auth/verification/send
pub async fn send_verification_code(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EmailPayload>,
) -> Result<Json<ApiResponse<MessageDto>>, ApiError> {
    let email = validation::validate_email(&payload.email)?;

    state.auth_service().send_verification_code(&email).await?;

    Ok(Json(ApiResponse::success(MessageDto {
        message: "Verification code sent successfully".to_string(),
    })))
}

/// PATCH /api/auth/verification/confirm
pub async fn confirm_verification(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ConfirmCodePayload>,
) -> Result<Json<ApiResponse<MessageDto>>, ApiError> {
    let email = validation::validate_email(&payload.email)?;
    validation::validate_one_time_code(&payload.code)?;

    state
        .auth_service()
        .confirm_verification(&email, &payload.code)
        .await?;

    Ok(Json(ApiResponse::success(MessageDto {
        message: "Account verified successfully".to_string(),
    })))
}

/// PATCH /api/auth/password (requires a principal)
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    axum::Extension(principal): axum::Extension<Principal>,
    Json(payload): Json<ChangePasswordPayload>,
) -> Result<Json<ApiResponse<MessageDto>>, ApiError> {
    validation::validate_password(&payload.new_password)?;

    state
        .auth_service()
        .change_password(
            principal.account.id,
            principal.account.verified,
            &payload.old_password,
            &payload.new_password,
        )
        .await?;

    tracing::info!("Password changed for account {}", principal.account.id);

    Ok(Json(ApiResponse::success(MessageDto {
        message: "Password changed successfully".to_string(),
    })))
}

/// PATCH /api/auth/password/forgot/send
pub async fn send_reset_code(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EmailPayload>,
) -> Result<Json<ApiResponse<MessageDto>>, ApiError> {
    let email = validation::validate_email(&payload.email)?;

    state.auth_service().send_reset_code(&email).await?;

    Ok(Json(ApiResponse::success(MessageDto {
        message: "Reset code sent successfully".to_string(),
    })))
}

/// PATCH /api/auth/password/forgot/confirm
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResetPasswordPayload>,
) -> Result<Json<ApiResponse<MessageDto>>, ApiError> {
    let email = validation::validate_email(&payload.email)?;
    validation::validate_one_time_code(&payload.code)?;
    validation::validate_password(&payload.new_password)?;

    state
        .auth_service()
        .reset_password(&email, &payload.code, &payload.new_password)
        .await?;

    Ok(Json(ApiResponse::success(MessageDto {
        message: "Password changed successfully".to_string(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn token_from_bearer_header_for_non_browser_clients() {
        let mut headers = HeaderMap::new();
        headers.insert("client", HeaderValue::from_static("not-browser"));
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(extract_token(&headers), Some("abc.def.ghi".to_string()));
    }

    #[test]
    fn token_from_cookie_for_browser_clients() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; Authorization=\"Bearer abc.def.ghi\"; x=1"),
        );
        assert_eq!(extract_token(&headers), Some("abc.def.ghi".to_string()));
    }

    #[test]
    fn header_transport_ignored_for_browser_clients() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(extract_token(&headers), None);
    }

    #[test]
    fn missing_token_is_none() {
        let headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(extract_token(&headers), None);
    }

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), "203.0.113.9");

        let headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), "unknown");
    }
}
