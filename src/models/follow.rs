//! Follow model

use serde::{Deserialize, Serialize};

/// `user_id` follows `author_id`; each pair exists at most once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Follow {
    pub id: i64,
    pub user_id: i64,
    pub author_id: i64,
}
