//! Follow repository
//!
//! The `(user_id, author_id)` unique constraint makes `get_or_create` safe
//! against double submits: the insert is ignored when the edge exists.

use crate::db::{Backend, DynDatabasePool};
use crate::models::Follow;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Follow repository trait
#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Create the edge unless it exists; the flag is true if it was created
    async fn get_or_create(&self, user_id: i64, author_id: i64) -> Result<(Follow, bool)>;

    async fn find(&self, user_id: i64, author_id: i64) -> Result<Option<Follow>>;

    /// Delete the edge, returning whether it existed
    async fn delete(&self, user_id: i64, author_id: i64) -> Result<bool>;
}

/// SQLx-based follow repository for SQLite and MySQL
pub struct SqlxFollowRepository {
    pool: DynDatabasePool,
}

impl SqlxFollowRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FollowRepository> {
        Arc::new(Self::new(pool))
    }
}

const FIND_FOLLOW: &str = "SELECT id, user_id, author_id FROM follows WHERE user_id = ? AND author_id = ?";

#[async_trait]
impl FollowRepository for SqlxFollowRepository {
    async fn get_or_create(&self, user_id: i64, author_id: i64) -> Result<(Follow, bool)> {
        let inserted = match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query("INSERT OR IGNORE INTO follows (user_id, author_id) VALUES (?, ?)")
                    .bind(user_id)
                    .bind(author_id)
                    .execute(p)
                    .await
                    .map(|r| r.rows_affected())
            }
            Backend::Mysql(p) => {
                sqlx::query("INSERT IGNORE INTO follows (user_id, author_id) VALUES (?, ?)")
                    .bind(user_id)
                    .bind(author_id)
                    .execute(p)
                    .await
                    .map(|r| r.rows_affected())
            }
        }
        .context("Failed to create follow")?;

        let follow = self
            .find(user_id, author_id)
            .await?
            .ok_or_else(|| anyhow!("Follow {} -> {} missing after insert", user_id, author_id))?;
        Ok((follow, inserted > 0))
    }

    async fn find(&self, user_id: i64, author_id: i64) -> Result<Option<Follow>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => find_follow_sqlite(p, user_id, author_id).await,
            Backend::Mysql(p) => find_follow_mysql(p, user_id, author_id).await,
        }
    }

    async fn delete(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let sql = "DELETE FROM follows WHERE user_id = ? AND author_id = ?";
        let deleted = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(sql)
                .bind(user_id)
                .bind(author_id)
                .execute(p)
                .await
                .map(|r| r.rows_affected()),
            Backend::Mysql(p) => sqlx::query(sql)
                .bind(user_id)
                .bind(author_id)
                .execute(p)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to delete follow")?;
        Ok(deleted > 0)
    }
}

async fn find_follow_sqlite(pool: &SqlitePool, user_id: i64, author_id: i64) -> Result<Option<Follow>> {
    let row = sqlx::query(FIND_FOLLOW)
        .bind(user_id)
        .bind(author_id)
        .fetch_optional(pool)
        .await
        .context("Failed to find follow")?;
    Ok(row.map(|row| Follow {
        id: row.get("id"),
        user_id: row.get("user_id"),
        author_id: row.get("author_id"),
    }))
}

async fn find_follow_mysql(pool: &MySqlPool, user_id: i64, author_id: i64) -> Result<Option<Follow>> {
    let row = sqlx::query(FIND_FOLLOW)
        .bind(user_id)
        .bind(author_id)
        .fetch_optional(pool)
        .await
        .context("Failed to find follow")?;
    Ok(row.map(|row| Follow {
        id: row.get("id"),
        user_id: row.get("user_id"),
        author_id: row.get("author_id"),
    }))
}
