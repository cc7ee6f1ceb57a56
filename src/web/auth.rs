//! Minimal login for the task pages (single-tenant).
//!
//! - The login form submits a password to `POST /auth/login`
//! - The server issues a JWT valid for `JWT_TTL_DAYS` (~30 days) and stores
//!   it in the session cookie
//! - `require_login` fronts every protected route; when `DEV_MODE=true` the
//!   gate is open
//!
//! # Security notes
//! - This is intentionally minimal; it is NOT multi-tenant.
//! - Use a strong `JWT_SECRET` in production.

use axum::{
    body::Body,
    extract::{Form, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_sessions::Session;

use super::flash;
use super::routes::{render_page, AppState};
use crate::config::Config;

/// Session key holding the login token.
const TOKEN_KEY: &str = "auth_token";

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    /// Subject (we only need a stable sentinel)
    sub: String,
    /// Issued-at unix seconds
    iat: i64,
    /// Expiration unix seconds
    exp: i64,
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();
    if a_bytes.len() != b_bytes.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for i in 0..a_bytes.len() {
        diff |= a_bytes[i] ^ b_bytes[i];
    }
    diff == 0
}

fn issue_jwt(secret: &str, ttl_days: i64) -> anyhow::Result<String> {
    let now = Utc::now();
    let exp = now + Duration::days(ttl_days.max(1));
    let claims = Claims {
        sub: "taskdeck_user".to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

fn verify_jwt(token: &str, secret: &str) -> anyhow::Result<Claims> {
    let validation = Validation::default();
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;
    Ok(token_data.claims)
}

/// Whether the request's session carries a valid login.
///
/// Returns true iff:
/// - dev mode is on (no auth checks), OR
/// - the session holds a token that verifies against the configured secret.
pub async fn is_authenticated(session: &Session, config: &Config) -> bool {
    if config.dev_mode {
        return true;
    }
    // If auth isn't configured, fail closed in non-dev mode.
    let secret = match config.auth.jwt_secret.as_deref() {
        Some(s) => s,
        None => return false,
    };
    let token: Option<String> = match session.get(TOKEN_KEY).await {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!("Failed to read login token from session: {}", e);
            None
        }
    };
    match token {
        Some(t) => verify_jwt(&t, secret).is_ok(),
        None => false,
    }
}

/// Guard composed in front of every protected route.
///
/// Proceeds to the handler for authenticated sessions; otherwise sets an
/// error flash and redirects to the login page without touching the handler
/// (and therefore without touching the store).
pub async fn require_login(
    State(state): State<Arc<AppState>>,
    session: Session,
    req: Request<Body>,
    next: Next,
) -> Response {
    if is_authenticated(&session, &state.config).await {
        return next.run(req).await;
    }
    flash::set_error(&session, "Please log in to manage tasks").await;
    Redirect::to("/auth/login").into_response()
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub password: String,
}

/// `GET /auth/login` - show the login form.
pub async fn login_form(State(state): State<Arc<AppState>>, session: Session) -> Response {
    let messages = flash::take(&session).await;
    render_page(
        &state,
        "auth/login",
        &json!({
            "title": "Log in",
            "flash": messages,
        }),
    )
}

/// `POST /auth/login` - check the password and store a login token.
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let expected = state
        .config
        .auth
        .dashboard_password
        .as_deref()
        .unwrap_or("");

    if expected.is_empty() || !constant_time_eq(form.password.trim(), expected) {
        flash::set_error(&session, "Invalid password").await;
        return Redirect::to("/auth/login").into_response();
    }

    let Some(secret) = state.config.auth.jwt_secret.as_deref() else {
        tracing::error!("JWT_SECRET not configured; refusing login");
        flash::set_error(&session, "Login is not configured on this server").await;
        return Redirect::to("/auth/login").into_response();
    };

    match issue_jwt(secret, state.config.auth.jwt_ttl_days) {
        Ok(token) => {
            if let Err(e) = session.insert(TOKEN_KEY, token).await {
                tracing::error!("Failed to store login token in session: {}", e);
                flash::set_error(&session, "Could not start a session, please retry").await;
                return Redirect::to("/auth/login").into_response();
            }
            flash::set_success(&session, "Logged in").await;
            Redirect::to("/tasks").into_response()
        }
        Err(e) => {
            tracing::error!("Failed to issue login token: {}", e);
            flash::set_error(&session, "Login failed, please retry").await;
            Redirect::to("/auth/login").into_response()
        }
    }
}

/// `POST /auth/logout` - drop the session.
pub async fn logout(session: Session) -> Response {
    if let Err(e) = session.flush().await {
        tracing::warn!("Failed to flush session on logout: {}", e);
    }
    flash::set_success(&session, "Logged out").await;
    Redirect::to("/tasks").into_response()
}
