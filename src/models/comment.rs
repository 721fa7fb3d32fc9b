//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AuthorRef;

/// A comment under a post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author: AuthorRef,
    pub text: String,
    /// Inactive comments are hidden from the post page
    pub active: bool,
    pub created: DateTime<Utc>,
    pub avatar_url: String,
}

impl Comment {
    /// Gravatar URL for an email address
    pub fn gravatar_url(email: &str) -> String {
        let email = email.trim();
        if email.is_empty() {
            return "https://www.gravatar.com/avatar/?d=mp&s=80".to_string();
        }
        let hash = format!("{:x}", md5::compute(email.to_lowercase()));
        format!("https://www.gravatar.com/avatar/{}?d=mp&s=80", hash)
    }
}

/// Row to insert into `comments`
#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i64,
    pub author_id: i64,
    pub text: String,
}

/// The comment form
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentInput {
    #[serde(default)]
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gravatar_url_is_case_insensitive() {
        let lower = Comment::gravatar_url("leo@example.com");
        let upper = Comment::gravatar_url("  Leo@Example.com ");
        assert_eq!(lower, upper);
        assert!(lower.starts_with("https://www.gravatar.com/avatar/"));
    }

    #[test]
    fn test_gravatar_url_without_email() {
        assert_eq!(
            Comment::gravatar_url(""),
            "https://www.gravatar.com/avatar/?d=mp&s=80"
        );
    }
}
