//! Comment repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::{full_name, AuthorRef, Comment, NewComment};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Insert an active comment
    async fn create(&self, comment: &NewComment) -> Result<Comment>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>>;

    /// Active comments of a post, oldest first
    async fn list_active_by_post(&self, post_id: i64) -> Result<Vec<Comment>>;
}

/// SQLx-based comment repository for SQLite and MySQL
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_COMMENTS: &str = r#"
    SELECT c.id, c.post_id, c.text, c.active, c.created, c.author_id,
           u.username AS author_username,
           u.first_name AS author_first_name,
           u.last_name AS author_last_name,
           u.email AS author_email
    FROM comments c
    JOIN users u ON u.id = c.author_id
"#;

const INSERT_COMMENT: &str =
    "INSERT INTO comments (post_id, author_id, text, active, created) VALUES (?, ?, ?, ?, ?)";

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, comment: &NewComment) -> Result<Comment> {
        let now = Utc::now();
        let id = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(INSERT_COMMENT)
                .bind(comment.post_id)
                .bind(comment.author_id)
                .bind(&comment.text)
                .bind(true)
                .bind(now)
                .execute(p)
                .await
                .map(|r| r.last_insert_rowid()),
            Backend::Mysql(p) => sqlx::query(INSERT_COMMENT)
                .bind(comment.post_id)
                .bind(comment.author_id)
                .bind(&comment.text)
                .bind(true)
                .bind(now)
                .execute(p)
                .await
                .map(|r| r.last_insert_id() as i64),
        }
        .context("Failed to create comment")?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow!("Comment {} vanished after insert", id))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let sql = format!("{} WHERE c.id = ?", SELECT_COMMENTS);
        match self.pool.backend() {
            Backend::Sqlite(p) => get_comment_sqlite(p, &sql, id).await,
            Backend::Mysql(p) => get_comment_mysql(p, &sql, id).await,
        }
    }

    async fn list_active_by_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        let sql = format!(
            "{} WHERE c.post_id = ? AND c.active = ? ORDER BY c.created ASC, c.id ASC",
            SELECT_COMMENTS
        );
        match self.pool.backend() {
            Backend::Sqlite(p) => list_comments_sqlite(p, &sql, post_id).await,
            Backend::Mysql(p) => list_comments_mysql(p, &sql, post_id).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_comment_sqlite(pool: &SqlitePool, sql: &str, id: i64) -> Result<Option<Comment>> {
    let row = sqlx::query(sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get comment")?;
    Ok(row.as_ref().map(row_to_comment_sqlite))
}

async fn list_comments_sqlite(pool: &SqlitePool, sql: &str, post_id: i64) -> Result<Vec<Comment>> {
    let rows = sqlx::query(sql)
        .bind(post_id)
        .bind(true)
        .fetch_all(pool)
        .await
        .context("Failed to list comments")?;
    Ok(rows.iter().map(row_to_comment_sqlite).collect())
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Comment {
    let first_name: String = row.get("author_first_name");
    let last_name: String = row.get("author_last_name");
    let email: String = row.get("author_email");

    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author: AuthorRef {
            id: row.get("author_id"),
            username: row.get("author_username"),
            full_name: full_name(&first_name, &last_name),
        },
        text: row.get("text"),
        active: row.get("active"),
        created: row.get("created"),
        avatar_url: Comment::gravatar_url(&email),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_comment_mysql(pool: &MySqlPool, sql: &str, id: i64) -> Result<Option<Comment>> {
    let row = sqlx::query(sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get comment")?;
    Ok(row.as_ref().map(row_to_comment_mysql))
}

async fn list_comments_mysql(pool: &MySqlPool, sql: &str, post_id: i64) -> Result<Vec<Comment>> {
    let rows = sqlx::query(sql)
        .bind(post_id)
        .bind(true)
        .fetch_all(pool)
        .await
        .context("Failed to list comments")?;
    Ok(rows.iter().map(row_to_comment_mysql).collect())
}

fn row_to_comment_mysql(row: &sqlx::mysql::MySqlRow) -> Comment {
    let first_name: String = row.get("author_first_name");
    let last_name: String = row.get("author_last_name");
    let email: String = row.get("author_email");

    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author: AuthorRef {
            id: row.get("author_id"),
            username: row.get("author_username"),
            full_name: full_name(&first_name, &last_name),
        },
        text: row.get("text"),
        active: row.get("active"),
        created: row.get("created"),
        avatar_url: Comment::gravatar_url(&email),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::testing::{insert_post, insert_user, setup_pool};

    #[tokio::test]
    async fn test_create_comment() {
        let pool = setup_pool().await;
        let author = insert_user(&pool, "leo").await;
        let post = insert_post(&pool, author.id, "Hello", None).await;
        let repo = SqlxCommentRepository::new(pool);

        let comment = repo
            .create(&NewComment {
                post_id: post.id,
                author_id: author.id,
                text: "First!".to_string(),
            })
            .await
            .expect("Failed to create comment");

        assert_eq!(comment.post_id, post.id);
        assert_eq!(comment.author.username, "leo");
        assert_eq!(comment.text, "First!");
        assert!(comment.active);
        assert!(comment.avatar_url.contains("gravatar"));
    }

    #[tokio::test]
    async fn test_inactive_comments_hidden() {
        let pool = setup_pool().await;
        let author = insert_user(&pool, "leo").await;
        let post = insert_post(&pool, author.id, "Hello", None).await;
        let other = insert_post(&pool, author.id, "Other", None).await;
        let repo = SqlxCommentRepository::new(pool.clone());

        for (post_id, text) in [(post.id, "one"), (post.id, "two"), (other.id, "elsewhere")] {
            repo.create(&NewComment {
                post_id,
                author_id: author.id,
                text: text.to_string(),
            })
            .await
            .unwrap();
        }
        pool.execute("UPDATE comments SET active = 0 WHERE text = 'two'")
            .await
            .unwrap();

        let visible = repo.list_active_by_post(post.id).await.unwrap();
        let texts: Vec<&str> = visible.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["one"]);
    }

    #[tokio::test]
    async fn test_comments_oldest_first() {
        let pool = setup_pool().await;
        let author = insert_user(&pool, "leo").await;
        let post = insert_post(&pool, author.id, "Hello", None).await;
        let repo = SqlxCommentRepository::new(pool);

        for text in ["a", "b", "c"] {
            repo.create(&NewComment {
                post_id: post.id,
                author_id: author.id,
                text: text.to_string(),
            })
            .await
            .unwrap();
        }

        let texts: Vec<String> = repo
            .list_active_by_post(post.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }
}
