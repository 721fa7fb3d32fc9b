//! User repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::{NewUser, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user; fails if the username is taken
    async fn create(&self, user: &NewUser) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Exact, case-sensitive username lookup
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn exists_by_username(&self, username: &str) -> Result<bool>;

    async fn count(&self) -> Result<i64>;
}

/// SQLx-based user repository for SQLite and MySQL
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &NewUser) -> Result<User> {
        match self.pool.backend() {
            Backend::Sqlite(p) => create_user_sqlite(p, user).await,
            Backend::Mysql(p) => create_user_mysql(p, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_user_by_id_sqlite(p, id).await,
            Backend::Mysql(p) => get_user_by_id_mysql(p, id).await,
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_user_by_username_sqlite(p, username).await,
            Backend::Mysql(p) => get_user_by_username_mysql(p, username).await,
        }
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool> {
        Ok(self.get_by_username(username).await?.is_some())
    }

    async fn count(&self) -> Result<i64> {
        let query = "SELECT COUNT(*) FROM users";
        let count: i64 = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query_scalar::<_, i64>(query).fetch_one(p).await,
            Backend::Mysql(p) => sqlx::query_scalar::<_, i64>(query).fetch_one(p).await,
        }
        .context("Failed to count users")?;
        Ok(count)
    }
}

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, password_hash, created_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &NewUser) -> Result<User> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, first_name, last_name, password_hash, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.password_hash)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(built_user(result.last_insert_rowid(), user, now))
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    Ok(row.as_ref().map(row_to_user_sqlite))
}

async fn get_user_by_username_sqlite(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS))
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by username")?;

    Ok(row.as_ref().map(row_to_user_sqlite))
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &NewUser) -> Result<User> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, first_name, last_name, password_hash, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.password_hash)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(built_user(result.last_insert_id() as i64, user, now))
}

async fn get_user_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    Ok(row.as_ref().map(row_to_user_mysql))
}

async fn get_user_by_username_mysql(pool: &MySqlPool, username: &str) -> Result<Option<User>> {
    // BINARY keeps the comparison case-sensitive under the default collation
    let row = sqlx::query(&format!(
        "SELECT {} FROM users WHERE username = BINARY ?",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await
    .context("Failed to get user by username")?;

    Ok(row.as_ref().map(row_to_user_mysql))
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
    }
}

fn built_user(id: i64, user: &NewUser, created_at: chrono::DateTime<Utc>) -> User {
    User {
        id,
        username: user.username.clone(),
        email: user.email.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        password_hash: user.password_hash.clone(),
        created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::testing::{new_user, setup_pool};

    async fn setup_test_repo() -> SqlxUserRepository {
        SqlxUserRepository::new(setup_pool().await)
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = setup_test_repo().await;

        let created = repo.create(&new_user("leo")).await.expect("Failed to create user");
        assert!(created.id > 0);

        let by_id = repo.get_by_id(created.id).await.unwrap().expect("User not found");
        assert_eq!(by_id.username, "leo");
        assert_eq!(by_id.email, "leo@example.com");

        let by_name = repo.get_by_username("leo").await.unwrap().expect("User not found");
        assert_eq!(by_name.id, created.id);
        assert_eq!(by_name.password_hash, "hash");
    }

    #[tokio::test]
    async fn test_get_missing_user() {
        let repo = setup_test_repo().await;
        assert!(repo.get_by_id(42).await.unwrap().is_none());
        assert!(repo.get_by_username("nobody").await.unwrap().is_none());
        assert!(!repo.exists_by_username("nobody").await.unwrap());
    }

    #[tokio::test]
    async fn test_unique_username_constraint() {
        let repo = setup_test_repo().await;
        repo.create(&new_user("leo")).await.unwrap();

        assert!(repo.create(&new_user("leo")).await.is_err());
        assert_eq!(repo.count().await.unwrap(), 1);
    }
}
