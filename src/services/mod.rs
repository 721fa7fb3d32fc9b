//! Services layer
//!
//! Business rules sit here, between the web handlers and the repositories:
//! form validation, authorization checks and the home feed cache.

pub mod comment;
pub mod follow;
pub mod group;
pub mod media;
pub mod password;
pub mod post;
pub mod user;

pub use comment::{CommentService, CommentServiceError};
pub use follow::{FollowOutcome, FollowService, FollowServiceError};
pub use group::GroupService;
pub use media::MediaService;
pub use password::{hash_password, verify_password};
pub use post::{PostService, PostServiceError, Profile};
pub use user::{UserService, UserServiceError};
