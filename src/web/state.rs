//! Shared application state

use anyhow::Context;
use chrono::Datelike;
use std::sync::Arc;
use std::time::Duration;
use tera::Context as TeraContext;

use crate::cache::{create_cache, MemoryCache};
use crate::config::Config;
use crate::db::repositories::{
    SqlxCommentRepository, SqlxFollowRepository, SqlxGroupRepository, SqlxPostRepository,
    SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{CommentService, FollowService, GroupService, MediaService, PostService, UserService};
use crate::templates::TemplateEngine;

use super::error::WebError;

/// Everything a handler needs, cloned into each request
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub templates: Arc<TemplateEngine>,
    pub cache: Arc<MemoryCache>,
    pub media: Arc<MediaService>,
    pub users: Arc<UserService>,
    pub groups: Arc<GroupService>,
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub follows: Arc<FollowService>,
}

impl AppState {
    /// Wire repositories and services over an open, migrated pool
    pub fn new(pool: DynDatabasePool, config: Config) -> anyhow::Result<Self> {
        let templates = TemplateEngine::new(&config.templates.path).context("Failed to load templates")?;
        let cache = create_cache(&config.cache);
        let media = Arc::new(MediaService::new(config.media.clone()));

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let group_repo = SqlxGroupRepository::boxed(pool.clone());
        let post_repo = SqlxPostRepository::boxed(pool.clone());
        let comment_repo = SqlxCommentRepository::boxed(pool.clone());
        let follow_repo = SqlxFollowRepository::boxed(pool);

        let users = UserService::with_session_days(user_repo.clone(), session_repo, config.auth.session_days);
        let groups = GroupService::new(group_repo.clone());
        let posts = PostService::new(
            post_repo.clone(),
            group_repo,
            user_repo.clone(),
            follow_repo.clone(),
            cache.clone(),
            media.clone(),
        )
        .with_page_size(config.pagination.posts_per_page)
        .with_index_ttl(Duration::from_secs(config.cache.index_ttl_seconds));
        let comments = CommentService::new(comment_repo, post_repo);
        let follows = FollowService::new(follow_repo, user_repo);

        Ok(Self {
            config: Arc::new(config),
            templates: Arc::new(templates),
            cache,
            media,
            users: Arc::new(users),
            groups: Arc::new(groups),
            posts: Arc::new(posts),
            comments: Arc::new(comments),
            follows: Arc::new(follows),
        })
    }

    /// Context every page starts from: the viewer and the footer year
    pub fn page_context(&self, viewer: Option<&User>) -> TeraContext {
        let mut context = TeraContext::new();
        context.insert("current_user", &viewer);
        context.insert("year", &chrono::Utc::now().year());
        context
    }

    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String, WebError> {
        Ok(self.templates.render(template, context)?)
    }
}
