//! Yatube - a small blogging platform
//!
//! Users publish short posts, optionally filed under a group and illustrated
//! with an image, comment on each other's posts and follow authors to get a
//! personal feed.

pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod templates;
pub mod web;
