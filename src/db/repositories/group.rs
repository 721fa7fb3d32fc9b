//! Group repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Group, NewGroup};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Group repository trait
#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Insert a group; fails if the slug is taken
    async fn create(&self, group: &NewGroup) -> Result<Group>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Group>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Group>>;

    /// All groups ordered by title
    async fn list(&self) -> Result<Vec<Group>>;
}

/// SQLx-based group repository for SQLite and MySQL
pub struct SqlxGroupRepository {
    pool: DynDatabasePool,
}

impl SqlxGroupRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn GroupRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl GroupRepository for SqlxGroupRepository {
    async fn create(&self, group: &NewGroup) -> Result<Group> {
        let id = match self.pool.backend() {
            Backend::Sqlite(p) => create_group_sqlite(p, group).await?,
            Backend::Mysql(p) => create_group_mysql(p, group).await?,
        };
        Ok(Group {
            id,
            title: group.title.clone(),
            slug: group.slug.clone(),
            description: group.description.clone(),
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Group>> {
        let query = "SELECT id, title, slug, description FROM post_groups WHERE id = ?";
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let row = sqlx::query(query).bind(id).fetch_optional(p).await;
                Ok(row.context("Failed to get group by ID")?.as_ref().map(row_to_group_sqlite))
            }
            Backend::Mysql(p) => {
                let row = sqlx::query(query).bind(id).fetch_optional(p).await;
                Ok(row.context("Failed to get group by ID")?.as_ref().map(row_to_group_mysql))
            }
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let query = "SELECT id, title, slug, description FROM post_groups WHERE slug = ?";
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let row = sqlx::query(query).bind(slug).fetch_optional(p).await;
                Ok(row.context("Failed to get group by slug")?.as_ref().map(row_to_group_sqlite))
            }
            Backend::Mysql(p) => {
                let row = sqlx::query(query).bind(slug).fetch_optional(p).await;
                Ok(row.context("Failed to get group by slug")?.as_ref().map(row_to_group_mysql))
            }
        }
    }

    async fn list(&self) -> Result<Vec<Group>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => list_groups_sqlite(p).await,
            Backend::Mysql(p) => list_groups_mysql(p).await,
        }
    }
}

const LIST_GROUPS: &str = "SELECT id, title, slug, description FROM post_groups ORDER BY title, id";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_group_sqlite(pool: &SqlitePool, group: &NewGroup) -> Result<i64> {
    let result = sqlx::query("INSERT INTO post_groups (title, slug, description) VALUES (?, ?, ?)")
        .bind(&group.title)
        .bind(&group.slug)
        .bind(&group.description)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to create group '{}'", group.slug))?;
    Ok(result.last_insert_rowid())
}

async fn list_groups_sqlite(pool: &SqlitePool) -> Result<Vec<Group>> {
    let rows = sqlx::query(LIST_GROUPS)
        .fetch_all(pool)
        .await
        .context("Failed to list groups")?;
    Ok(rows.iter().map(row_to_group_sqlite).collect())
}

fn row_to_group_sqlite(row: &sqlx::sqlite::SqliteRow) -> Group {
    Group {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_group_mysql(pool: &MySqlPool, group: &NewGroup) -> Result<i64> {
    let result = sqlx::query("INSERT INTO post_groups (title, slug, description) VALUES (?, ?, ?)")
        .bind(&group.title)
        .bind(&group.slug)
        .bind(&group.description)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to create group '{}'", group.slug))?;
    Ok(result.last_insert_id() as i64)
}

async fn list_groups_mysql(pool: &MySqlPool) -> Result<Vec<Group>> {
    let rows = sqlx::query(LIST_GROUPS)
        .fetch_all(pool)
        .await
        .context("Failed to list groups")?;
    Ok(rows.iter().map(row_to_group_mysql).collect())
}

fn row_to_group_mysql(row: &sqlx::mysql::MySqlRow) -> Group {
    Group {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::testing::{insert_group, setup_pool};

    #[tokio::test]
    async fn test_create_and_lookup_group() {
        let pool = setup_pool().await;
        let created = insert_group(&pool, "cats").await;
        let repo = SqlxGroupRepository::new(pool);

        let by_slug = repo.get_by_slug("cats").await.unwrap().expect("Group not found");
        assert_eq!(by_slug, created);

        let by_id = repo.get_by_id(created.id).await.unwrap().expect("Group not found");
        assert_eq!(by_id.title, "Group cats");
        assert_eq!(by_id.description, "About cats");
    }

    #[tokio::test]
    async fn test_missing_group() {
        let repo = SqlxGroupRepository::new(setup_pool().await);
        assert!(repo.get_by_slug("nope").await.unwrap().is_none());
        assert!(repo.get_by_id(5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected() {
        let pool = setup_pool().await;
        insert_group(&pool, "cats").await;
        let repo = SqlxGroupRepository::new(pool);

        let duplicate = repo
            .create(&NewGroup {
                title: "Other".to_string(),
                slug: "cats".to_string(),
                description: String::new(),
            })
            .await;
        assert!(duplicate.is_err());
    }

    #[tokio::test]
    async fn test_list_orders_by_title() {
        let pool = setup_pool().await;
        insert_group(&pool, "zebras").await;
        insert_group(&pool, "ants").await;
        let repo = SqlxGroupRepository::new(pool);

        let slugs: Vec<String> = repo.list().await.unwrap().into_iter().map(|g| g.slug).collect();
        assert_eq!(slugs, vec!["ants", "zebras"]);
    }
}
