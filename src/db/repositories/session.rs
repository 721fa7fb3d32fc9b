//! Session repository
//!
//! Login sessions keyed by the token stored in the session cookie.

use crate::db::{Backend, DynDatabasePool};
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Get session by token
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    async fn delete(&self, id: &str) -> Result<()>;

    async fn delete_by_user(&self, user_id: i64) -> Result<()>;

    /// Remove expired sessions, returning how many were deleted
    async fn delete_expired(&self) -> Result<u64>;
}

/// SQLx-based session repository for SQLite and MySQL
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        let insert = "INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)";
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query(insert)
                    .bind(&session.id)
                    .bind(session.user_id)
                    .bind(session.expires_at)
                    .bind(session.created_at)
                    .execute(p)
                    .await
                    .map(|r| r.rows_affected())
            }
            Backend::Mysql(p) => {
                sqlx::query(insert)
                    .bind(&session.id)
                    .bind(session.user_id)
                    .bind(session.expires_at)
                    .bind(session.created_at)
                    .execute(p)
                    .await
                    .map(|r| r.rows_affected())
            }
        }
        .context("Failed to create session")?;

        Ok(session.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_session_by_id_sqlite(p, id).await,
            Backend::Mysql(p) => get_session_by_id_mysql(p, id).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let query = "DELETE FROM sessions WHERE id = ?";
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(query).bind(id).execute(p).await.map(|r| r.rows_affected()),
            Backend::Mysql(p) => sqlx::query(query).bind(id).execute(p).await.map(|r| r.rows_affected()),
        }
        .context("Failed to delete session")?;
        Ok(())
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<()> {
        let query = "DELETE FROM sessions WHERE user_id = ?";
        match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(query).bind(user_id).execute(p).await.map(|r| r.rows_affected()),
            Backend::Mysql(p) => sqlx::query(query).bind(user_id).execute(p).await.map(|r| r.rows_affected()),
        }
        .context("Failed to delete sessions by user")?;
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64> {
        let query = "DELETE FROM sessions WHERE expires_at < ?";
        let now = Utc::now();
        let deleted = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(query).bind(now).execute(p).await.map(|r| r.rows_affected()),
            Backend::Mysql(p) => sqlx::query(query).bind(now).execute(p).await.map(|r| r.rows_affected()),
        }
        .context("Failed to delete expired sessions")?;
        Ok(deleted)
    }
}

async fn get_session_by_id_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query("SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session by ID")?;

    Ok(row.map(|row| Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }))
}

async fn get_session_by_id_mysql(pool: &MySqlPool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query("SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get session by ID")?;

    Ok(row.map(|row| Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::testing::{insert_user, setup_pool};
    use chrono::Duration;

    #[tokio::test]
    async fn test_create_and_get_session() {
        let pool = setup_pool().await;
        let user = insert_user(&pool, "leo").await;
        let repo = SqlxSessionRepository::new(pool);

        let session = Session::start(user.id, 7);
        repo.create(&session).await.expect("Failed to create session");

        let found = repo
            .get_by_id(&session.id)
            .await
            .unwrap()
            .expect("Session not found");
        assert_eq!(found.user_id, user.id);
        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_session() {
        let pool = setup_pool().await;
        let user = insert_user(&pool, "leo").await;
        let repo = SqlxSessionRepository::new(pool);

        let session = Session::start(user.id, 7);
        repo.create(&session).await.unwrap();
        repo.delete(&session.id).await.unwrap();

        assert!(repo.get_by_id(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_sessions_by_user() {
        let pool = setup_pool().await;
        let leo = insert_user(&pool, "leo").await;
        let anna = insert_user(&pool, "anna").await;
        let repo = SqlxSessionRepository::new(pool);

        let first = Session::start(leo.id, 7);
        let second = Session::start(leo.id, 7);
        let other = Session::start(anna.id, 7);
        for session in [&first, &second, &other] {
            repo.create(session).await.unwrap();
        }

        repo.delete_by_user(leo.id).await.unwrap();

        assert!(repo.get_by_id(&first.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&second.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&other.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_expired_sessions() {
        let pool = setup_pool().await;
        let user = insert_user(&pool, "leo").await;
        let repo = SqlxSessionRepository::new(pool);

        let mut expired = Session::start(user.id, 7);
        expired.expires_at = Utc::now() - Duration::days(1);
        let valid = Session::start(user.id, 7);
        repo.create(&expired).await.unwrap();
        repo.create(&valid).await.unwrap();

        assert_eq!(repo.delete_expired().await.unwrap(), 1);
        assert!(repo.get_by_id(&expired.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&valid.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sessions_removed_with_user() {
        let pool = setup_pool().await;
        let user = insert_user(&pool, "leo").await;
        let repo = SqlxSessionRepository::new(pool.clone());

        let session = Session::start(user.id, 7);
        repo.create(&session).await.unwrap();
        pool.execute("DELETE FROM users").await.unwrap();

        assert!(repo.get_by_id(&session.id).await.unwrap().is_none());
    }
}
