//! Group service

use crate::config::GroupSeed;
use crate::db::repositories::GroupRepository;
use crate::models::{Group, NewGroup};
use anyhow::Result;
use std::sync::Arc;

/// Read access to groups plus startup seeding
pub struct GroupService {
    repo: Arc<dyn GroupRepository>,
}

impl GroupService {
    pub fn new(repo: Arc<dyn GroupRepository>) -> Self {
        Self { repo }
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        self.repo.get_by_slug(slug).await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Group>> {
        self.repo.get_by_id(id).await
    }

    /// All groups, for the post form's select box
    pub async fn list(&self) -> Result<Vec<Group>> {
        self.repo.list().await
    }

    /// Create each configured group whose slug does not exist yet.
    ///
    /// Returns the number of groups created.
    pub async fn ensure_seeded(&self, seeds: &[GroupSeed]) -> Result<usize> {
        let mut created = 0;
        for seed in seeds {
            if self.repo.get_by_slug(&seed.slug).await?.is_some() {
                continue;
            }
            self.repo
                .create(&NewGroup {
                    title: seed.title.clone(),
                    slug: seed.slug.clone(),
                    description: seed.description.clone(),
                })
                .await?;
            created += 1;
        }
        if created > 0 {
            tracing::info!("Seeded {} group(s)", created);
        }
        Ok(created)
    }
}
