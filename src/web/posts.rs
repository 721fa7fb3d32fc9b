//! Post pages: feeds, post detail, create and edit

use axum::{
    extract::{Multipart, Path, Query, State},
    response::{Html, IntoResponse, Response},
    Extension,
};
use serde::{Deserialize, Serialize};
use tera::Context as TeraContext;

use crate::models::{FormErrors, Post, PostInput, UploadedImage, User};
use crate::services::PostServiceError;

use super::error::WebError;
use super::middleware::{redirect, CurrentUser, Viewer};
use super::state::AppState;

/// `?page=` as sent; resolution happens in the service
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// Values echoed back into the post form
#[derive(Debug, Serialize)]
struct PostFormValues<'a> {
    text: &'a str,
}

pub async fn index(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, WebError> {
    let page = state.posts.index(query.page.as_deref()).await?;

    let mut context = state.page_context(viewer.user());
    context.insert("page_obj", &page);
    Ok(Html(state.render("posts/index.html", &context)?))
}

pub async fn group_posts(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, WebError> {
    let (group, page) = state.posts.group_posts(&slug, query.page.as_deref()).await?;

    let mut context = state.page_context(viewer.user());
    context.insert("group", &group);
    context.insert("page_obj", &page);
    context.insert("hide_group_link", &true);
    Ok(Html(state.render("posts/group_list.html", &context)?))
}

pub async fn profile(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, WebError> {
    let profile = state
        .posts
        .profile(&username, query.page.as_deref(), viewer.user().map(|u| u.id))
        .await?;

    let mut context = state.page_context(viewer.user());
    context.insert("author_name", &profile.author.display_name());
    context.insert("author", &profile.author);
    context.insert("post_count", &profile.post_count);
    context.insert("following", &profile.following);
    context.insert("page_obj", &profile.page);
    context.insert("hide_author_link", &true);
    Ok(Html(state.render("posts/profile.html", &context)?))
}

pub async fn post_detail(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(post_id): Path<i64>,
) -> Result<Html<String>, WebError> {
    let post = state.posts.get(post_id).await?;
    let post_count = state.posts.author_post_count(post.author.id).await?;
    let comments = state.comments.list_for_post(post.id).await?;
    let is_author = viewer.user().is_some_and(|u| post.is_authored_by(u.id));

    let mut context = state.page_context(viewer.user());
    context.insert("post", &post);
    context.insert("author_name", post.author.display_name());
    context.insert("post_count", &post_count);
    context.insert("is_author", &is_author);
    context.insert("comments", &comments);
    Ok(Html(state.render("posts/post_detail.html", &context)?))
}

/// Posts by followed authors
pub async fn follow_index(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, WebError> {
    let page = state.posts.follow_feed(user.id, query.page.as_deref()).await?;

    let mut context = state.page_context(Some(&user));
    context.insert("page_obj", &page);
    Ok(Html(state.render("posts/follow.html", &context)?))
}

pub async fn create_form(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Html<String>, WebError> {
    let form = FormPage {
        user: &user,
        input: &PostInput::default(),
        post_id: None,
        current_image: None,
        errors: &FormErrors::new(),
    };
    Ok(Html(form.render(&state).await?))
}

pub async fn create_submit(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<Response, WebError> {
    let input = read_post_form(multipart).await?;

    match state.posts.create(user.id, input.clone()).await {
        Ok(_) => Ok(redirect(&format!("/profile/{}/", urlencoding::encode(&user.username)))),
        Err(PostServiceError::Validation(errors)) => {
            let form = FormPage {
                user: &user,
                input: &input,
                post_id: None,
                current_image: None,
                errors: &errors,
            };
            Ok(Html(form.render(&state).await?).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn edit_form(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(post_id): Path<i64>,
) -> Result<Response, WebError> {
    let post = state.posts.get(post_id).await?;
    if !post.is_authored_by(user.id) {
        return Ok(redirect(&detail_url(post_id)));
    }

    let form = FormPage {
        user: &user,
        input: &PostInput::from_post(&post),
        post_id: Some(post.id),
        current_image: post.image.as_deref(),
        errors: &FormErrors::new(),
    };
    Ok(Html(form.render(&state).await?).into_response())
}

pub async fn edit_submit(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(post_id): Path<i64>,
    multipart: Multipart,
) -> Result<Response, WebError> {
    let input = read_post_form(multipart).await?;

    match state.posts.update(post_id, user.id, input.clone()).await {
        Ok(_) | Err(PostServiceError::Forbidden) => Ok(redirect(&detail_url(post_id))),
        Err(PostServiceError::Validation(errors)) => {
            let existing: Post = state.posts.get(post_id).await?;
            let form = FormPage {
                user: &user,
                input: &input,
                post_id: Some(post_id),
                current_image: existing.image.as_deref(),
                errors: &errors,
            };
            Ok(Html(form.render(&state).await?).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn detail_url(post_id: i64) -> String {
    format!("/posts/{}/", post_id)
}

/// The create/edit page with whatever the user submitted
struct FormPage<'a> {
    user: &'a User,
    input: &'a PostInput,
    post_id: Option<i64>,
    current_image: Option<&'a str>,
    errors: &'a FormErrors,
}

impl FormPage<'_> {
    async fn render(&self, state: &AppState) -> Result<String, WebError> {
        let groups = state.groups.list().await?;
        let selected_group = self
            .input
            .group
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok());

        let mut context: TeraContext = state.page_context(Some(self.user));
        context.insert("is_edit", &self.post_id.is_some());
        context.insert("post_id", &self.post_id);
        context.insert("form", &PostFormValues { text: &self.input.text });
        context.insert("groups", &groups);
        context.insert("selected_group", &selected_group);
        context.insert("current_image", &self.current_image);
        context.insert("errors", self.errors);
        state.render("posts/create_post.html", &context)
    }
}

/// Collect the multipart post form.
///
/// A file input left empty arrives as a part with no file name and no bytes
/// and counts as no upload.
async fn read_post_form(mut multipart: Multipart) -> Result<PostInput, WebError> {
    let mut input = PostInput::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| WebError::BadRequest(format!("Malformed form: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "text" => input.text = read_text(field).await?,
            "group" => input.group = Some(read_text(field).await?),
            "image-clear" => input.clear_image = !read_text(field).await?.is_empty(),
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| WebError::BadRequest(format!("Failed to read upload: {}", e)))?;
                if !(file_name.is_empty() && bytes.is_empty()) {
                    input.image = Some(UploadedImage {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    Ok(input)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, WebError> {
    field
        .text()
        .await
        .map_err(|e| WebError::BadRequest(format!("Failed to read form field: {}", e)))
}
