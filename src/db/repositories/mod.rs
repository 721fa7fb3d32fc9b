//! Database repositories
//!
//! One repository per entity. Each exposes an `async_trait` interface and an
//! `Sqlx*` implementation that dispatches to SQLite or MySQL queries.

pub mod comment;
pub mod follow;
pub mod group;
pub mod post;
pub mod session;
pub mod user;

pub use comment::{CommentRepository, SqlxCommentRepository};
pub use follow::{FollowRepository, SqlxFollowRepository};
pub use group::{GroupRepository, SqlxGroupRepository};
pub use post::{PostFilter, PostRepository, SqlxPostRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by repository and service tests

    use super::*;
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{Group, NewGroup, NewPost, NewUser, Post, User};

    pub async fn setup_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }

    pub fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: "hash".to_string(),
        }
    }

    pub async fn insert_user(pool: &DynDatabasePool, username: &str) -> User {
        SqlxUserRepository::new(pool.clone())
            .create(&new_user(username))
            .await
            .expect("Failed to create user")
    }

    pub async fn insert_group(pool: &DynDatabasePool, slug: &str) -> Group {
        SqlxGroupRepository::new(pool.clone())
            .create(&NewGroup {
                title: format!("Group {}", slug),
                slug: slug.to_string(),
                description: format!("About {}", slug),
            })
            .await
            .expect("Failed to create group")
    }

    pub async fn insert_post(
        pool: &DynDatabasePool,
        author_id: i64,
        text: &str,
        group_id: Option<i64>,
    ) -> Post {
        SqlxPostRepository::new(pool.clone())
            .create(&NewPost {
                text: text.to_string(),
                author_id,
                group_id,
                image: None,
            })
            .await
            .expect("Failed to create post")
    }
}
