//! Comment form target

use axum::{
    extract::{Path, State},
    response::Response,
    Extension, Form,
};

use crate::models::CommentInput;

use super::error::WebError;
use super::middleware::{redirect, CurrentUser};
use super::posts::detail_url;
use super::state::AppState;

/// Add a comment and go back to the post.
///
/// A blank comment is dropped without an error message.
pub async fn add_comment(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(post_id): Path<i64>,
    Form(input): Form<CommentInput>,
) -> Result<Response, WebError> {
    if let Some(comment) = state.comments.add(post_id, user.id, input).await? {
        tracing::debug!("Comment {} added to post {} by {}", comment.id, post_id, user.username);
    }
    Ok(redirect(&detail_url(post_id)))
}

/// The comment form only posts here; a plain visit goes back to the post
pub async fn comment_page(Path(post_id): Path<i64>) -> Response {
    redirect(&detail_url(post_id))
}
