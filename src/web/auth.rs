//! Signup, login and logout pages

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{Html, IntoResponse, Response},
    Form,
};
use serde::{Deserialize, Serialize};

use crate::models::{FormErrors, LoginInput, SignupInput};
use crate::services::user::INVALID_LOGIN;
use crate::services::UserServiceError;

use super::error::WebError;
use super::middleware::{clear_session_cookie, redirect, safe_next, session_cookie, session_token, Viewer};
use super::state::AppState;

/// One input on the signup page
#[derive(Debug, Serialize)]
struct SignupField<'a> {
    name: &'static str,
    label: &'static str,
    kind: &'static str,
    required: bool,
    value: &'a str,
    errors: &'a [String],
}

fn signup_fields<'a>(input: &'a SignupInput, errors: &'a FormErrors) -> Vec<SignupField<'a>> {
    let field = move |name: &'static str, label: &'static str, kind: &'static str, required: bool, value: &'a str| SignupField {
        name,
        label,
        kind,
        required,
        value,
        errors: errors.get(name),
    };
    vec![
        field("first_name", "Имя", "text", false, input.first_name.as_str()),
        field("last_name", "Фамилия", "text", false, input.last_name.as_str()),
        field("username", "Имя пользователя", "text", true, input.username.as_str()),
        field("email", "Адрес электронной почты", "email", false, input.email.as_str()),
        // Passwords are never echoed back
        field("password1", "Пароль", "password", true, ""),
        field("password2", "Подтверждение пароля", "password", true, ""),
    ]
}

fn render_signup(
    state: &AppState,
    viewer: &Viewer,
    input: &SignupInput,
    errors: &FormErrors,
) -> Result<Html<String>, WebError> {
    let mut context = state.page_context(viewer.user());
    context.insert("fields", &signup_fields(input, errors));
    context.insert("errors", errors);
    Ok(Html(state.render("users/signup.html", &context)?))
}

pub async fn signup_form(State(state): State<AppState>, viewer: Viewer) -> Result<Html<String>, WebError> {
    render_signup(&state, &viewer, &SignupInput::default(), &FormErrors::new())
}

/// Create the account and send the visitor to the home page
pub async fn signup_submit(
    State(state): State<AppState>,
    viewer: Viewer,
    Form(input): Form<SignupInput>,
) -> Result<Response, WebError> {
    match state.users.register(input.clone()).await {
        Ok(_) => Ok(redirect("/")),
        Err(UserServiceError::Validation(errors)) => {
            Ok(render_signup(&state, &viewer, &input, &errors)?.into_response())
        }
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

fn render_login(
    state: &AppState,
    viewer: &Viewer,
    username: &str,
    next: Option<&str>,
    errors: &FormErrors,
) -> Result<Html<String>, WebError> {
    let mut context = state.page_context(viewer.user());
    context.insert("username", username);
    context.insert("next", &safe_next(next));
    context.insert("errors", errors);
    Ok(Html(state.render("users/login.html", &context)?))
}

pub async fn login_form(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<NextQuery>,
) -> Result<Html<String>, WebError> {
    render_login(&state, &viewer, "", query.next.as_deref(), &FormErrors::new())
}

/// Start a session and follow `next` when it points inside the site
pub async fn login_submit(
    State(state): State<AppState>,
    viewer: Viewer,
    Form(input): Form<LoginInput>,
) -> Result<Response, WebError> {
    let errors = match state.users.login(&input).await {
        Ok((user, session)) => {
            tracing::info!("User {} logged in", user.username);
            let target = safe_next(input.next.as_deref()).unwrap_or("/");
            let mut response = redirect(target);
            let cookie = session_cookie(&state.config.auth, &session);
            response.headers_mut().insert(
                header::SET_COOKIE,
                HeaderValue::from_str(&cookie).map_err(|e| WebError::Internal(anyhow::anyhow!("Bad cookie: {}", e)))?,
            );
            return Ok(response);
        }
        Err(UserServiceError::InvalidCredentials) => {
            let mut errors = FormErrors::new();
            errors.add_non_field(INVALID_LOGIN);
            errors
        }
        Err(UserServiceError::Validation(errors)) => errors,
        Err(e) => return Err(e.into()),
    };

    Ok(render_login(&state, &viewer, input.username.trim(), input.next.as_deref(), &errors)?.into_response())
}

/// End the session; works for anonymous visitors too
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, WebError> {
    if let Some(token) = session_token(&headers, &state.config.auth.cookie_name) {
        state.users.logout(&token).await?;
    }

    let context = state.page_context(None);
    let page = Html(state.render("users/logged_out.html", &context)?);
    Ok((
        [(header::SET_COOKIE, clear_session_cookie(&state.config.auth))],
        page,
    )
        .into_response())
}
