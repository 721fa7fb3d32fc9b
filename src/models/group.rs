//! Group model

use serde::{Deserialize, Serialize};

/// A themed community posts can be filed under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    /// At most 200 characters
    pub title: String,
    /// Unique, used in `/group/{slug}/`
    pub slug: String,
    pub description: String,
}

impl Group {
    pub fn to_ref(&self) -> GroupRef {
        GroupRef {
            id: self.id,
            slug: self.slug.clone(),
            title: self.title.clone(),
        }
    }
}

/// The slice of a group shown on a post card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRef {
    pub id: i64,
    pub slug: String,
    pub title: String,
}

/// Row to insert into `post_groups`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroup {
    pub title: String,
    pub slug: String,
    pub description: String,
}
