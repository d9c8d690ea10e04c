//! Post persistence and pagination.

use chrono::{DateTime, Utc};
use husky_types::{FieldError, Page, Post, MAX_BODY_LEN, MAX_TITLE_LEN};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::BlogError;

/// Input for a new post.
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub title: String,
    pub body: String,
}

const POST_SELECT: &str = "SELECT p.id, p.title, p.body, p.timestamp, p.author_id, u.name
    FROM posts p LEFT JOIN users u ON u.id = p.author_id";

fn map_row_to_post(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        timestamp: row.get(3)?,
        author_id: row.get(4)?,
        author_name: row.get(5)?,
    })
}

/// Validates post fields, collecting every failure.
pub fn validate_new_post(new: &NewPost) -> Vec<FieldError> {
    let mut errors = Vec::new();

    let title = new.title.trim();
    if title.is_empty() {
        errors.push(FieldError::new("title", "Title is required."));
    } else if title.chars().count() > MAX_TITLE_LEN {
        errors.push(FieldError::new(
            "title",
            format!("Title must be at most {MAX_TITLE_LEN} characters."),
        ));
    }

    let body = new.body.trim();
    if body.is_empty() {
        errors.push(FieldError::new("body", "Body is required."));
    } else if body.chars().count() > MAX_BODY_LEN {
        errors.push(FieldError::new(
            "body",
            format!("Body must be at most {MAX_BODY_LEN} characters."),
        ));
    }

    errors
}

/// Validates and stores a post authored by `author_id`, stamped now.
pub fn create_post(conn: &Connection, author_id: i64, new: &NewPost) -> Result<Post, BlogError> {
    let errors = validate_new_post(new);
    if !errors.is_empty() {
        return Err(BlogError::Validation(errors));
    }
    let id = insert_post(
        conn,
        new.title.trim(),
        new.body.trim(),
        Utc::now(),
        Some(author_id),
    )?;
    tracing::info!(post_id = id, author_id, "created post");
    get_post(conn, id)
}

/// Inserts a row without validation. Used by the fake data generator.
pub(crate) fn insert_post(
    conn: &Connection,
    title: &str,
    body: &str,
    timestamp: DateTime<Utc>,
    author_id: Option<i64>,
) -> Result<i64, BlogError> {
    conn.execute(
        "INSERT INTO posts (title, body, timestamp, author_id) VALUES (?1, ?2, ?3, ?4)",
        params![title, body, timestamp, author_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Retrieves a post by ID.
pub fn get_post(conn: &Connection, id: i64) -> Result<Post, BlogError> {
    conn.query_row(
        &format!("{POST_SELECT} WHERE p.id = ?1"),
        [id],
        map_row_to_post,
    )
    .optional()?
    .ok_or(BlogError::NotFound(id))
}

/// Counts all posts.
pub fn count_posts(conn: &Connection) -> Result<u64, BlogError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Returns one page of posts, newest first.
///
/// `page` is 1-based; 0 is treated as 1. A page past the end comes back with
/// no items and [`Page::is_out_of_range`] set.
pub fn list_posts(conn: &Connection, page: u32, per_page: u32) -> Result<Page<Post>, BlogError> {
    let page = page.max(1);
    let per_page = per_page.max(1);
    let total = count_posts(conn)?;
    let offset = u64::from(page - 1) * u64::from(per_page);

    let mut stmt = conn.prepare(&format!(
        "{POST_SELECT} ORDER BY p.timestamp DESC, p.id DESC LIMIT ?1 OFFSET ?2"
    ))?;
    let rows = stmt.query_map(
        params![i64::from(per_page), i64::try_from(offset).unwrap_or(i64::MAX)],
        map_row_to_post,
    )?;
    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }

    Ok(Page {
        items,
        page,
        per_page,
        total,
    })
}

/// Deletes a post on behalf of `user_id`.
///
/// # Errors
///
/// - `BlogError::NotFound` if the post does not exist.
/// - `BlogError::Forbidden` if `user_id` is not the author.
pub fn delete_post(conn: &Connection, id: i64, user_id: i64) -> Result<(), BlogError> {
    let post = get_post(conn, id)?;
    if post.author_id != Some(user_id) {
        tracing::warn!(post_id = id, user_id, "refusing to delete post of another author");
        return Err(BlogError::Forbidden(id));
    }
    conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
    tracing::info!(post_id = id, user_id, "deleted post");
    Ok(())
}
