//! HTML web interface
//!
//! Server-rendered pages on top of the services layer. Every request passes
//! through [`middleware::load_session`]; pages that need an account are
//! additionally wrapped in [`middleware::require_login`].

pub mod about;
pub mod auth;
pub mod comments;
pub mod error;
pub mod follows;
pub mod middleware;
pub mod posts;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::{services::ServeDir, trace::TraceLayer};

pub use error::WebError;
pub use middleware::CurrentUser;
pub use state::AppState;

/// Room for the text fields next to the largest accepted image
const FORM_OVERHEAD: usize = 64 * 1024;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/", get(posts::index))
        .route("/group/{slug}/", get(posts::group_posts))
        .route("/profile/{username}/", get(posts::profile))
        .route("/posts/{post_id}/", get(posts::post_detail))
        .route("/auth/signup/", get(auth::signup_form).post(auth::signup_submit))
        .route("/auth/login/", get(auth::login_form).post(auth::login_submit))
        .route("/auth/logout/", get(auth::logout).post(auth::logout))
        .route("/about/author/", get(about::author))
        .route("/about/tech/", get(about::tech));

    let protected = Router::new()
        .route("/create/", get(posts::create_form).post(posts::create_submit))
        .route("/posts/{post_id}/edit/", get(posts::edit_form).post(posts::edit_submit))
        .route("/posts/{post_id}/comment/", post(comments::add_comment).get(comments::comment_page))
        .route("/follow/", get(posts::follow_index))
        .route(
            "/profile/{username}/follow/",
            get(follows::profile_follow).post(follows::profile_follow),
        )
        .route(
            "/profile/{username}/unfollow/",
            get(follows::profile_unfollow).post(follows::profile_unfollow),
        )
        .route_layer(from_fn(middleware::require_login));

    let body_limit = usize::try_from(state.config.media.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(FORM_OVERHEAD);

    Router::new()
        .merge(public)
        .merge(protected)
        .nest_service("/media", ServeDir::new(state.media.root()))
        .fallback(about::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn_with_state(state.clone(), middleware::load_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
