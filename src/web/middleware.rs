//! Session cookie handling and login middleware

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::convert::Infallible;

use crate::config::AuthConfig;
use crate::models::{Session, User};

use super::state::AppState;

/// The logged-in user, inserted into request extensions by [`load_session`]
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// The viewer of a page, if logged in
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<User>);

impl Viewer {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Viewer(parts.extensions.get::<CurrentUser>().map(|u| u.0.clone())))
    }
}

/// Read the session token from the `Cookie` header
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let prefix = format!("{}=", cookie_name);
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .map(str::trim)
        .find_map(|cookie| cookie.strip_prefix(prefix.as_str()))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// `Set-Cookie` value starting a session
pub fn session_cookie(config: &AuthConfig, session: &Session) -> String {
    let max_age = (session.expires_at - chrono::Utc::now()).num_seconds().max(0);
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        config.cookie_name, session.id, max_age
    );
    if config.secure_cookie {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value removing the session cookie
pub fn clear_session_cookie(config: &AuthConfig) -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", config.cookie_name)
}

/// 302 redirect
pub fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => (StatusCode::FOUND, [(header::LOCATION, HeaderValue::from_static("/"))]).into_response(),
    }
}

/// Login page URL that comes back to `path` afterwards
pub fn login_url(path: &str) -> String {
    format!("/auth/login/?next={}", urlencoding::encode(path).replace("%2F", "/"))
}

/// Only same-site absolute paths are followed after login
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.map(str::trim)
        .filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))
}

/// Resolve the session cookie to a user for every request.
///
/// Missing, unknown and expired sessions leave the request anonymous.
pub async fn load_session(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    if let Some(token) = session_token(request.headers(), &state.config.auth.cookie_name) {
        match state.users.validate_session(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(CurrentUser(user));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Session lookup failed: {}", e),
        }
    }
    next.run(request).await
}

/// Send anonymous visitors to the login page
pub async fn require_login(request: Request, next: Next) -> Response {
    if request.extensions().get::<CurrentUser>().is_some() {
        return next.run(request).await;
    }
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    redirect(&login_url(&path))
}
