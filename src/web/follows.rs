//! Subscribing to authors

use axum::{
    extract::{Path, State},
    response::Response,
    Extension,
};

use crate::services::FollowOutcome;

use super::error::WebError;
use super::middleware::{redirect, CurrentUser};
use super::state::AppState;

fn profile_url(username: &str) -> String {
    format!("/profile/{}/", urlencoding::encode(username))
}

/// Following yourself is silently ignored
pub async fn profile_follow(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(username): Path<String>,
) -> Result<Response, WebError> {
    let outcome = state.follows.follow(user.id, &username).await?;
    if outcome == FollowOutcome::Created {
        tracing::info!("{} now follows {}", user.username, username);
    }
    Ok(redirect(&profile_url(&username)))
}

pub async fn profile_unfollow(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(username): Path<String>,
) -> Result<Response, WebError> {
    state.follows.unfollow(user.id, &username).await?;
    tracing::info!("{} unfollowed {}", user.username, username);
    Ok(redirect(&profile_url(&username)))
}
