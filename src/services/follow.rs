//! Follow service
//!
//! Self-follows are refused here; storage only guards against duplicates.

use crate::db::repositories::{FollowRepository, UserRepository};
use crate::models::User;
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum FollowServiceError {
    /// Unknown author, or no edge to remove
    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// What a follow request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    /// The user tried to follow themselves
    Ignored,
}

pub struct FollowService {
    follows: Arc<dyn FollowRepository>,
    users: Arc<dyn UserRepository>,
}

impl FollowService {
    pub fn new(follows: Arc<dyn FollowRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { follows, users }
    }

    async fn author(&self, username: &str) -> Result<User, FollowServiceError> {
        self.users
            .get_by_username(username)
            .await
            .context("Failed to get author")?
            .ok_or(FollowServiceError::NotFound)
    }

    /// Make `user_id` follow `username`
    pub async fn follow(&self, user_id: i64, username: &str) -> Result<FollowOutcome, FollowServiceError> {
        let author = self.author(username).await?;
        if author.id == user_id {
            tracing::debug!("User {} tried to follow themselves", user_id);
            return Ok(FollowOutcome::Ignored);
        }

        let (_, created) = self
            .follows
            .get_or_create(user_id, author.id)
            .await
            .context("Failed to create follow")?;
        Ok(if created {
            FollowOutcome::Created
        } else {
            FollowOutcome::AlreadyFollowing
        })
    }

    /// Remove the edge; `NotFound` when the user did not follow the author
    pub async fn unfollow(&self, user_id: i64, username: &str) -> Result<(), FollowServiceError> {
        let author = self.author(username).await?;
        let deleted = self
            .follows
            .delete(user_id, author.id)
            .await
            .context("Failed to delete follow")?;
        if !deleted {
            return Err(FollowServiceError::NotFound);
        }
        Ok(())
    }

    pub async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, FollowServiceError> {
        let found = self
            .follows
            .find(user_id, author_id)
            .await
            .context("Failed to check follow")?;
        Ok(found.is_some())
    }
}
