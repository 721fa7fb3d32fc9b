//! Post repository
//!
//! Posts are always read together with their author and group so listing
//! pages need a single query per page.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{full_name, AuthorRef, GroupRef, ListParams, NewPost, Post, PostChanges};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Which posts a listing shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(i64),
    /// Posts by authors the given user follows
    FollowedBy(i64),
}

impl PostFilter {
    fn where_clause(&self) -> &'static str {
        match self {
            PostFilter::All => "",
            PostFilter::Group(_) => "WHERE p.group_id = ?",
            PostFilter::Author(_) => "WHERE p.author_id = ?",
            PostFilter::FollowedBy(_) => {
                "WHERE p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = ?)"
            }
        }
    }

    fn value(&self) -> Option<i64> {
        match *self {
            PostFilter::All => None,
            PostFilter::Group(id) | PostFilter::Author(id) | PostFilter::FollowedBy(id) => Some(id),
        }
    }
}

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: &NewPost) -> Result<Post>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// Overwrite the editable columns; `None` if the post does not exist
    async fn update(&self, id: i64, changes: &PostChanges) -> Result<Option<Post>>;

    /// One page of posts, newest first
    async fn list(&self, filter: PostFilter, params: &ListParams) -> Result<Vec<Post>>;

    async fn count(&self, filter: PostFilter) -> Result<i64>;
}

/// SQLx-based post repository for SQLite and MySQL
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &NewPost) -> Result<Post> {
        let id = match self.pool.backend() {
            Backend::Sqlite(p) => create_post_sqlite(p, post).await?,
            Backend::Mysql(p) => create_post_mysql(p, post).await?,
        };
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow!("Post {} vanished after insert", id))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let sql = format!("{} WHERE p.id = ?", SELECT_POSTS);
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let row = sqlx::query(&sql).bind(id).fetch_optional(p).await;
                Ok(row.context("Failed to get post by ID")?.as_ref().map(row_to_post_sqlite))
            }
            Backend::Mysql(p) => {
                let row = sqlx::query(&sql).bind(id).fetch_optional(p).await;
                Ok(row.context("Failed to get post by ID")?.as_ref().map(row_to_post_mysql))
            }
        }
    }

    async fn update(&self, id: i64, changes: &PostChanges) -> Result<Option<Post>> {
        let sql = "UPDATE posts SET text = ?, group_id = ?, image = ? WHERE id = ?";
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql)
                .bind(&changes.text)
                .bind(changes.group_id)
                .bind(&changes.image)
                .bind(id)
                .execute(p)
                .await
                .map(|r| r.rows_affected()),
            Backend::Mysql(p) => sqlx::query(sql)
                .bind(&changes.text)
                .bind(changes.group_id)
                .bind(&changes.image)
                .bind(id)
                .execute(p)
                .await
                .map(|r| r.rows_affected()),
        }
        .with_context(|| format!("Failed to update post {}", id))?;

        // rows_affected is unreliable here: MySQL counts only changed rows
        self.get_by_id(id).await
    }

    async fn list(&self, filter: PostFilter, params: &ListParams) -> Result<Vec<Post>> {
        let sql = format!(
            "{} {} ORDER BY p.pub_date DESC, p.id DESC LIMIT ? OFFSET ?",
            SELECT_POSTS,
            filter.where_clause()
        );
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let mut query = sqlx::query(&sql);
                if let Some(value) = filter.value() {
                    query = query.bind(value);
                }
                let rows = query
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(p)
                    .await
                    .context("Failed to list posts")?;
                Ok(rows.iter().map(row_to_post_sqlite).collect())
            }
            Backend::Mysql(p) => {
                let mut query = sqlx::query(&sql);
                if let Some(value) = filter.value() {
                    query = query.bind(value);
                }
                let rows = query
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(p)
                    .await
                    .context("Failed to list posts")?;
                Ok(rows.iter().map(row_to_post_mysql).collect())
            }
        }
    }

    async fn count(&self, filter: PostFilter) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM posts p {}", filter.where_clause());
        let count = match self.pool.backend() {
            Backend::Sqlite(p) => {
                let mut query = sqlx::query_scalar::<_, i64>(&sql);
                if let Some(value) = filter.value() {
                    query = query.bind(value);
                }
                query.fetch_one(p).await
            }
            Backend::Mysql(p) => {
                let mut query = sqlx::query_scalar::<_, i64>(&sql);
                if let Some(value) = filter.value() {
                    query = query.bind(value);
                }
                query.fetch_one(p).await
            }
        }
        .context("Failed to count posts")?;
        Ok(count)
    }
}

const SELECT_POSTS: &str = r#"
    SELECT p.id, p.text, p.pub_date, p.image, p.author_id, p.group_id,
           u.username AS author_username,
           u.first_name AS author_first_name,
           u.last_name AS author_last_name,
           g.slug AS group_slug,
           g.title AS group_title
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN post_groups g ON g.id = p.group_id
"#;

const INSERT_POST: &str =
    "INSERT INTO posts (text, pub_date, author_id, group_id, image) VALUES (?, ?, ?, ?, ?)";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, post: &NewPost) -> Result<i64> {
    let result = sqlx::query(INSERT_POST)
        .bind(&post.text)
        .bind(Utc::now())
        .bind(post.author_id)
        .bind(post.group_id)
        .bind(&post.image)
        .execute(pool)
        .await
        .context("Failed to create post")?;
    Ok(result.last_insert_rowid())
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Post {
    let first_name: String = row.get("author_first_name");
    let last_name: String = row.get("author_last_name");
    let group_id: Option<i64> = row.get("group_id");
    let group_slug: Option<String> = row.get("group_slug");
    let group_title: Option<String> = row.get("group_title");

    Post {
        id: row.get("id"),
        text: row.get("text"),
        pub_date: row.get("pub_date"),
        author: AuthorRef {
            id: row.get("author_id"),
            username: row.get("author_username"),
            full_name: full_name(&first_name, &last_name),
        },
        group: group_ref(group_id, group_slug, group_title),
        image: row.get("image"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, post: &NewPost) -> Result<i64> {
    let result = sqlx::query(INSERT_POST)
        .bind(&post.text)
        .bind(Utc::now())
        .bind(post.author_id)
        .bind(post.group_id)
        .bind(&post.image)
        .execute(pool)
        .await
        .context("Failed to create post")?;
    Ok(result.last_insert_id() as i64)
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Post {
    let first_name: String = row.get("author_first_name");
    let last_name: String = row.get("author_last_name");
    let group_id: Option<i64> = row.get("group_id");
    let group_slug: Option<String> = row.get("group_slug");
    let group_title: Option<String> = row.get("group_title");

    Post {
        id: row.get("id"),
        text: row.get("text"),
        pub_date: row.get("pub_date"),
        author: AuthorRef {
            id: row.get("author_id"),
            username: row.get("author_username"),
            full_name: full_name(&first_name, &last_name),
        },
        group: group_ref(group_id, group_slug, group_title),
        image: row.get("image"),
    }
}

fn group_ref(id: Option<i64>, slug: Option<String>, title: Option<String>) -> Option<GroupRef> {
    match (id, slug, title) {
        (Some(id), Some(slug), Some(title)) => Some(GroupRef { id, slug, title }),
        _ => None,
    }
}
