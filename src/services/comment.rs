//! Comment service

use crate::db::repositories::{CommentRepository, PostRepository};
use crate::models::{Comment, CommentInput, NewComment};
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    #[error("Post not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Comment service
pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    posts: Arc<dyn PostRepository>,
}

impl CommentService {
    pub fn new(comments: Arc<dyn CommentRepository>, posts: Arc<dyn PostRepository>) -> Self {
        Self { comments, posts }
    }

    /// Attach a comment to post `post_id`.
    ///
    /// A blank comment is dropped and yields `Ok(None)`.
    pub async fn add(
        &self,
        post_id: i64,
        author_id: i64,
        input: CommentInput,
    ) -> Result<Option<Comment>, CommentServiceError> {
        if self
            .posts
            .get_by_id(post_id)
            .await
            .context("Failed to get post")?
            .is_none()
        {
            return Err(CommentServiceError::NotFound);
        }

        let text = input.text.trim();
        if text.is_empty() {
            tracing::debug!("Ignoring blank comment on post {}", post_id);
            return Ok(None);
        }

        let comment = self
            .comments
            .create(&NewComment {
                post_id,
                author_id,
                text: text.to_string(),
            })
            .await
            .context("Failed to create comment")?;
        Ok(Some(comment))
    }

    /// Visible comments of a post, oldest first
    pub async fn list_for_post(&self, post_id: i64) -> Result<Vec<Comment>, CommentServiceError> {
        let comments = self
            .comments
            .list_active_by_post(post_id)
            .await
            .context("Failed to list comments")?;
        Ok(comments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::testing::{insert_post, insert_user, setup_pool};
    use crate::db::repositories::{SqlxCommentRepository, SqlxPostRepository};

    fn comment(text: &str) -> CommentInput {
        CommentInput { text: text.to_string() }
    }

    #[tokio::test]
    async fn test_add_and_list() {
        let pool = setup_pool().await;
        let author = insert_user(&pool, "leo").await;
        let post = insert_post(&pool, author.id, "Hello", None).await;
        let service = CommentService::new(
            SqlxCommentRepository::boxed(pool.clone()),
            SqlxPostRepository::boxed(pool),
        );

        let added = service.add(post.id, author.id, comment("  Nice post  ")).await.unwrap();
        assert_eq!(added.map(|c| c.text), Some("Nice post".to_string()));

        let listed = service.list_for_post(post.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].author.username, "leo");
    }

    #[tokio::test]
    async fn test_blank_comment_is_dropped() {
        let pool = setup_pool().await;
        let author = insert_user(&pool, "leo").await;
        let post = insert_post(&pool, author.id, "Hello", None).await;
        let service = CommentService::new(
            SqlxCommentRepository::boxed(pool.clone()),
            SqlxPostRepository::boxed(pool),
        );

        assert!(service.add(post.id, author.id, comment("   ")).await.unwrap().is_none());
        assert!(service.list_for_post(post.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_comment_on_missing_post() {
        let pool = setup_pool().await;
        let author = insert_user(&pool, "leo").await;
        let service = CommentService::new(
            SqlxCommentRepository::boxed(pool.clone()),
            SqlxPostRepository::boxed(pool),
        );

        assert!(matches!(
            service.add(42, author.id, comment("hello")).await,
            Err(CommentServiceError::NotFound)
        ));
    }
}
