//! Data models
//!
//! Database entities (users, sessions, groups, posts, comments, follows),
//! the inputs bound from HTML forms, and the pagination container used by
//! every listing page.

mod comment;
mod follow;
mod form;
mod group;
mod pagination;
mod post;
mod session;
mod user;

pub use comment::{Comment, CommentInput, NewComment};
pub use follow::Follow;
pub use form::FormErrors;
pub use group::{Group, GroupRef, NewGroup};
pub use pagination::{num_pages, ListParams, PagedResult};
pub use post::{NewPost, Post, PostChanges, PostInput, UploadedImage};
pub use session::Session;
pub use user::{AuthorRef, LoginInput, NewUser, SignupInput, User};
pub(crate) use user::full_name;
