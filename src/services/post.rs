//! Post service
//!
//! Feed listings, post creation and editing. The home feed is cached per raw
//! `page` value for a short TTL and is not invalidated on writes, so new posts
//! show up once the entry expires or [`PostService::clear_index_cache`] runs.

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::{FollowRepository, GroupRepository, PostFilter, PostRepository, UserRepository};
use crate::models::{FormErrors, Group, ListParams, NewPost, PagedResult, Post, PostChanges, PostInput, User};
use crate::services::media::MediaService;
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_POSTS_PER_PAGE: u32 = 10;
const DEFAULT_INDEX_TTL: Duration = Duration::from_secs(20);

/// Key prefix of cached home feed pages
pub const INDEX_CACHE_PREFIX: &str = "index_page";

pub const TEXT_REQUIRED: &str = "This field is required.";
pub const INVALID_GROUP: &str = "Select a valid choice. That choice is not one of the available choices.";

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    #[error("Not found")]
    NotFound,

    /// The requester is not the post's author
    #[error("Only the author can edit this post")]
    Forbidden,

    #[error("Validation error: {0}")]
    Validation(FormErrors),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// An author's page: who they are, their posts and the viewer's relation
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub author: User,
    pub page: PagedResult<Post>,
    pub post_count: i64,
    /// Whether the viewer follows the author
    pub following: bool,
}

/// Form values that passed validation
struct CleanPost {
    text: String,
    group_id: Option<i64>,
    image: Option<String>,
}

/// Post service for listings and authoring
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    groups: Arc<dyn GroupRepository>,
    users: Arc<dyn UserRepository>,
    follows: Arc<dyn FollowRepository>,
    cache: Arc<MemoryCache>,
    media: Arc<MediaService>,
    per_page: u32,
    index_ttl: Duration,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        groups: Arc<dyn GroupRepository>,
        users: Arc<dyn UserRepository>,
        follows: Arc<dyn FollowRepository>,
        cache: Arc<MemoryCache>,
        media: Arc<MediaService>,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            follows,
            cache,
            media,
            per_page: DEFAULT_POSTS_PER_PAGE,
            index_ttl: DEFAULT_INDEX_TTL,
        }
    }

    pub fn with_page_size(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    pub fn with_index_ttl(mut self, ttl: Duration) -> Self {
        self.index_ttl = ttl;
        self
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Cache key for a home feed page, keyed by the raw query value
    pub fn index_cache_key(raw_page: Option<&str>) -> String {
        format!("{}:{}", INDEX_CACHE_PREFIX, raw_page.unwrap_or(""))
    }

    /// Home feed: every post, newest first, served from cache when fresh
    pub async fn index(&self, raw_page: Option<&str>) -> Result<PagedResult<Post>, PostServiceError> {
        let key = Self::index_cache_key(raw_page);
        if let Some(page) = self
            .cache
            .get::<PagedResult<Post>>(&key)
            .await
            .context("Failed to read index cache")?
        {
            return Ok(page);
        }

        let page = self.paginate(PostFilter::All, raw_page).await?;
        self.cache
            .set(&key, &page, self.index_ttl)
            .await
            .context("Failed to write index cache")?;
        Ok(page)
    }

    /// Drop every cached home feed page
    pub async fn clear_index_cache(&self) -> Result<(), PostServiceError> {
        self.cache
            .delete_pattern(&format!("{}:*", INDEX_CACHE_PREFIX))
            .await
            .context("Failed to clear index cache")?;
        Ok(())
    }

    pub async fn group_posts(
        &self,
        slug: &str,
        raw_page: Option<&str>,
    ) -> Result<(Group, PagedResult<Post>), PostServiceError> {
        let group = self
            .groups
            .get_by_slug(slug)
            .await
            .context("Failed to get group")?
            .ok_or(PostServiceError::NotFound)?;
        let page = self.paginate(PostFilter::Group(group.id), raw_page).await?;
        Ok((group, page))
    }

    /// Profile of `username` as seen by `viewer_id`
    pub async fn profile(
        &self,
        username: &str,
        raw_page: Option<&str>,
        viewer_id: Option<i64>,
    ) -> Result<Profile, PostServiceError> {
        let author = self
            .users
            .get_by_username(username)
            .await
            .context("Failed to get author")?
            .ok_or(PostServiceError::NotFound)?;

        let page = self.paginate(PostFilter::Author(author.id), raw_page).await?;
        let following = match viewer_id {
            Some(viewer) if viewer != author.id => self
                .follows
                .find(viewer, author.id)
                .await
                .context("Failed to check follow")?
                .is_some(),
            _ => false,
        };

        Ok(Profile {
            post_count: page.total,
            author,
            page,
            following,
        })
    }

    /// Posts by the authors `user_id` follows
    pub async fn follow_feed(&self, user_id: i64, raw_page: Option<&str>) -> Result<PagedResult<Post>, PostServiceError> {
        self.paginate(PostFilter::FollowedBy(user_id), raw_page).await
    }

    pub async fn get(&self, id: i64) -> Result<Post, PostServiceError> {
        self.posts
            .get_by_id(id)
            .await
            .context("Failed to get post")?
            .ok_or(PostServiceError::NotFound)
    }

    pub async fn author_post_count(&self, author_id: i64) -> Result<i64, PostServiceError> {
        let count = self
            .posts
            .count(PostFilter::Author(author_id))
            .await
            .context("Failed to count posts")?;
        Ok(count)
    }

    /// Validate the form and publish a post by `author_id`
    pub async fn create(&self, author_id: i64, input: PostInput) -> Result<Post, PostServiceError> {
        let clean = self.clean(&input, None).await?;
        let post = self
            .posts
            .create(&NewPost {
                text: clean.text,
                author_id,
                group_id: clean.group_id,
                image: clean.image,
            })
            .await
            .context("Failed to create post")?;

        tracing::info!("Post {} created by user {}", post.id, author_id);
        Ok(post)
    }

    /// Apply the form to post `id` on behalf of `editor_id`.
    ///
    /// Authorship is checked before the form is validated.
    pub async fn update(&self, id: i64, editor_id: i64, input: PostInput) -> Result<Post, PostServiceError> {
        let existing = self.get(id).await?;
        if !existing.is_authored_by(editor_id) {
            tracing::debug!("User {} may not edit post {}", editor_id, id);
            return Err(PostServiceError::Forbidden);
        }

        let clean = self.clean(&input, Some(&existing)).await?;
        self.posts
            .update(
                id,
                &PostChanges {
                    text: clean.text,
                    group_id: clean.group_id,
                    image: clean.image,
                },
            )
            .await
            .context("Failed to update post")?
            .ok_or(PostServiceError::NotFound)
    }

    async fn paginate(&self, filter: PostFilter, raw_page: Option<&str>) -> Result<PagedResult<Post>, PostServiceError> {
        let total = self.posts.count(filter).await.context("Failed to count posts")?;
        let params = ListParams::resolve(raw_page, total, self.per_page);
        let items = self
            .posts
            .list(filter, &params)
            .await
            .context("Failed to list posts")?;
        Ok(PagedResult::new(items, total, &params))
    }

    /// Validate the form; a valid new image is written to media storage
    async fn clean(&self, input: &PostInput, existing: Option<&Post>) -> Result<CleanPost, PostServiceError> {
        let mut errors = FormErrors::new();

        let text = input.text.trim().to_string();
        if text.is_empty() {
            errors.add("text", TEXT_REQUIRED);
        }

        let group_id = match input.group.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.parse::<i64>() {
                Ok(id) => {
                    let exists = self
                        .groups
                        .get_by_id(id)
                        .await
                        .context("Failed to get group")?
                        .is_some();
                    if !exists {
                        errors.add("group", INVALID_GROUP);
                    }
                    Some(id)
                }
                Err(_) => {
                    errors.add("group", INVALID_GROUP);
                    None
                }
            },
        };

        let upload = match &input.image {
            Some(image) => match self.media.validate(image) {
                Ok(mime) => Some((image, mime)),
                Err(message) => {
                    errors.add("image", message);
                    None
                }
            },
            None => None,
        };

        errors.into_result().map_err(PostServiceError::Validation)?;

        let image = match upload {
            Some((image, mime)) => Some(self.media.save(image, mime).await?),
            None if input.clear_image => None,
            None => existing.and_then(|post| post.image.clone()),
        };

        Ok(CleanPost { text, group_id, image })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MediaConfig;
    use crate::db::repositories::testing::{insert_group, insert_post, insert_user, setup_pool};
    use crate::db::repositories::{SqlxFollowRepository, SqlxGroupRepository, SqlxPostRepository, SqlxUserRepository};
    use crate::db::DynDatabasePool;
    use crate::models::UploadedImage;
    use tempfile::TempDir;

    const SMALL_GIF: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00,
        0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x00, 0x3B,
    ];

    struct Fixture {
        pool: DynDatabasePool,
        service: PostService,
        media_dir: TempDir,
    }

    async fn setup() -> Fixture {
        let pool = setup_pool().await;
        let media_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let media = MediaService::new(MediaConfig {
            path: media_dir.path().to_path_buf(),
            ..MediaConfig::default()
        });
        let service = PostService::new(
            SqlxPostRepository::boxed(pool.clone()),
            SqlxGroupRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed(pool.clone()),
            SqlxFollowRepository::boxed(pool.clone()),
            Arc::new(MemoryCache::new()),
            Arc::new(media),
        );
        Fixture { pool, service, media_dir }
    }

    fn input(text: &str, group: Option<i64>) -> PostInput {
        PostInput {
            text: text.to_string(),
            group: group.map(|id| id.to_string()),
            image: None,
            clear_image: false,
        }
    }

    fn validation_errors<T: std::fmt::Debug>(result: Result<T, PostServiceError>) -> FormErrors {
        match result {
            Err(PostServiceError::Validation(errors)) => errors,
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_index_is_cached_until_cleared() {
        let fx = setup().await;
        let author = insert_user(&fx.pool, "leo").await;
        insert_post(&fx.pool, author.id, "first", None).await;

        let before = fx.service.index(None).await.unwrap();
        assert_eq!(before.total, 1);

        insert_post(&fx.pool, author.id, "second", None).await;
        let cached = fx.service.index(None).await.unwrap();
        assert_eq!(cached.total, 1);
        assert_eq!(cached.items[0].text, "first");

        fx.service.clear_index_cache().await.unwrap();
        let fresh = fx.service.index(None).await.unwrap();
        assert_eq!(fresh.total, 2);
        assert_eq!(fresh.items[0].text, "second");
    }

    #[test]
    fn test_index_cache_keyed_by_raw_page() {
        assert_eq!(PostService::index_cache_key(None), "index_page:");
        assert_eq!(PostService::index_cache_key(Some("2")), "index_page:2");
    }

    #[tokio::test]
    async fn test_pagination_clamps() {
        let fx = setup().await;
        let author = insert_user(&fx.pool, "leo").await;
        for i in 0..13 {
            insert_post(&fx.pool, author.id, &format!("post {}", i), None).await;
        }

        let first = fx.service.profile("leo", None, None).await.unwrap();
        assert_eq!(first.page.len(), 10);
        assert_eq!(first.post_count, 13);

        let last = fx.service.profile("leo", Some("99"), None).await.unwrap();
        assert_eq!(last.page.number, 2);
        assert_eq!(last.page.len(), 3);

        let garbage = fx.service.profile("leo", Some("abc"), None).await.unwrap();
        assert_eq!(garbage.page.number, 1);
    }

    #[tokio::test]
    async fn test_group_posts() {
        let fx = setup().await;
        let author = insert_user(&fx.pool, "leo").await;
        let cats = insert_group(&fx.pool, "cats").await;
        let dogs = insert_group(&fx.pool, "dogs").await;
        insert_post(&fx.pool, author.id, "meow", Some(cats.id)).await;
        insert_post(&fx.pool, author.id, "woof", Some(dogs.id)).await;

        let (group, page) = fx.service.group_posts("cats", None).await.unwrap();
        assert_eq!(group.id, cats.id);
        let texts: Vec<&str> = page.items.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["meow"]);

        assert!(matches!(
            fx.service.group_posts("birds", None).await,
            Err(PostServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_profile_following_flag() {
        let fx = setup().await;
        let author = insert_user(&fx.pool, "leo").await;
        let reader = insert_user(&fx.pool, "reader").await;
        let follows = SqlxFollowRepository::new(fx.pool.clone());

        let anonymous = fx.service.profile("leo", None, None).await.unwrap();
        assert!(!anonymous.following);

        follows.get_or_create(reader.id, author.id).await.unwrap();
        let followed = fx.service.profile("leo", None, Some(reader.id)).await.unwrap();
        assert!(followed.following);

        let own = fx.service.profile("leo", None, Some(author.id)).await.unwrap();
        assert!(!own.following);

        assert!(matches!(
            fx.service.profile("nobody", None, None).await,
            Err(PostServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_follow_feed() {
        let fx = setup().await;
        let author = insert_user(&fx.pool, "leo").await;
        let follower = insert_user(&fx.pool, "follower").await;
        let stranger = insert_user(&fx.pool, "stranger").await;
        SqlxFollowRepository::new(fx.pool.clone())
            .get_or_create(follower.id, author.id)
            .await
            .unwrap();
        insert_post(&fx.pool, author.id, "news", None).await;

        let feed = fx.service.follow_feed(follower.id, None).await.unwrap();
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].text, "news");

        let empty = fx.service.follow_feed(stranger.id, None).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_create_validates() {
        let fx = setup().await;
        let author = insert_user(&fx.pool, "leo").await;

        let errors = validation_errors(fx.service.create(author.id, input("   ", None)).await);
        assert_eq!(errors.get("text"), [TEXT_REQUIRED]);

        let errors = validation_errors(fx.service.create(author.id, input("hello", Some(404))).await);
        assert_eq!(errors.get("group"), [INVALID_GROUP]);

        let mut bad_group = input("hello", None);
        bad_group.group = Some("cats".to_string());
        let errors = validation_errors(fx.service.create(author.id, bad_group).await);
        assert!(errors.has("group"));

        assert_eq!(fx.service.author_post_count(author.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_with_group_and_image() {
        let fx = setup().await;
        let author = insert_user(&fx.pool, "leo").await;
        let group = insert_group(&fx.pool, "cats").await;

        let mut form = input("with picture", Some(group.id));
        form.image = Some(UploadedImage {
            file_name: "small.gif".to_string(),
            content_type: "image/gif".to_string(),
            bytes: SMALL_GIF.to_vec(),
        });
        let post = fx.service.create(author.id, form).await.unwrap();

        assert_eq!(post.image.as_deref(), Some("posts/small.gif"));
        assert_eq!(post.group.map(|g| g.id), Some(group.id));
        assert!(fx.media_dir.path().join("posts/small.gif").exists());
    }

    #[tokio::test]
    async fn test_create_rejects_non_image() {
        let fx = setup().await;
        let author = insert_user(&fx.pool, "leo").await;

        let mut form = input("with picture", None);
        form.image = Some(UploadedImage {
            file_name: "notes.txt".to_string(),
            content_type: "text/plain".to_string(),
            bytes: b"plain text".to_vec(),
        });
        let errors = validation_errors(fx.service.create(author.id, form).await);
        assert!(errors.has("image"));
        assert!(!fx.media_dir.path().join("posts/notes.txt").exists());
    }

    #[tokio::test]
    async fn test_only_author_can_update() {
        let fx = setup().await;
        let author = insert_user(&fx.pool, "leo").await;
        let other = insert_user(&fx.pool, "other").await;
        let post = insert_post(&fx.pool, author.id, "original", None).await;

        assert!(matches!(
            fx.service.update(post.id, other.id, input("hijacked", None)).await,
            Err(PostServiceError::Forbidden)
        ));
        assert_eq!(fx.service.get(post.id).await.unwrap().text, "original");

        let updated = fx.service.update(post.id, author.id, input("edited", None)).await.unwrap();
        assert_eq!(updated.text, "edited");
        assert_eq!(fx.service.author_post_count(author.id).await.unwrap(), 1);

        assert!(matches!(
            fx.service.update(9999, author.id, input("x", None)).await,
            Err(PostServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_update_keeps_or_clears_image() {
        let fx = setup().await;
        let author = insert_user(&fx.pool, "leo").await;

        let mut form = input("picture", None);
        form.image = Some(UploadedImage {
            file_name: "small.gif".to_string(),
            content_type: "image/gif".to_string(),
            bytes: SMALL_GIF.to_vec(),
        });
        let post = fx.service.create(author.id, form).await.unwrap();

        let kept = fx.service.update(post.id, author.id, input("new text", None)).await.unwrap();
        assert_eq!(kept.image.as_deref(), Some("posts/small.gif"));

        let mut clear = input("new text", None);
        clear.clear_image = true;
        let cleared = fx.service.update(post.id, author.id, clear).await.unwrap();
        assert!(cleared.image.is_none());
    }
}
