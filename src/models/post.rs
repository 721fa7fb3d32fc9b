//! Post model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AuthorRef, GroupRef};

/// A published post together with its author and group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author: AuthorRef,
    pub group: Option<GroupRef>,
    /// Path relative to the media root, e.g. `posts/cat.gif`
    pub image: Option<String>,
}

impl Post {
    pub fn is_authored_by(&self, user_id: i64) -> bool {
        self.author.id == user_id
    }
}

/// Row to insert into `posts`
#[derive(Debug, Clone)]
pub struct NewPost {
    pub text: String,
    pub author_id: i64,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

/// Editable columns of a post; every field is written
#[derive(Debug, Clone)]
pub struct PostChanges {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

/// An image received in a multipart form
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// The create/edit post form as submitted
#[derive(Debug, Clone, Default)]
pub struct PostInput {
    pub text: String,
    /// Raw value of the group `<select>`; empty means no group
    pub group: Option<String>,
    pub image: Option<UploadedImage>,
    /// The "clear" checkbox next to the current image
    pub clear_image: bool,
}

impl PostInput {
    /// Prefill the edit form from an existing post
    pub fn from_post(post: &Post) -> Self {
        Self {
            text: post.text.clone(),
            group: post.group.as_ref().map(|g| g.id.to_string()),
            image: None,
            clear_image: false,
        }
    }
}
