//! Blog posts for the Husky blog.
//!
//! Post CRUD against the `posts` table, newest-first pagination, and the
//! fake post generator behind `husky forge`.

mod fakes;
mod posts;

pub use fakes::{fake_body, fake_posts, fake_posts_with, fake_title};
pub use posts::{
    count_posts, create_post, delete_post, get_post, list_posts, validate_new_post, NewPost,
};

use husky_types::FieldError;
use thiserror::Error;

/// Errors that can occur during post operations.
#[derive(Debug, Error)]
pub enum BlogError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("post not found: {0}")]
    NotFound(i64),
    #[error("post {0} belongs to another author")]
    Forbidden(i64),
    #[error("invalid post fields")]
    Validation(Vec<FieldError>),
}
