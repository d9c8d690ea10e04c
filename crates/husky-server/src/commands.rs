//! Database maintenance commands behind `husky init` and `husky forge`.

use husky_db::{create_all, drop_all, DbPool, MigrationError};
use std::io::Write;
use thiserror::Error;

/// Prompt shown before `init --drop` destroys data.
pub const DROP_PROMPT: &str = "This operation will delete the database, do you want to continue?";

/// Default number of posts generated by `forge`.
pub const DEFAULT_FORGE_POSTS: u32 = 50;

/// Errors that can occur while running a maintenance command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("database connection failed: {0}")]
    Pool(#[from] r2d2::Error),
    #[error(transparent)]
    Schema(#[from] MigrationError),
    #[error("failed to generate posts: {0}")]
    Forge(#[from] husky_blog::BlogError),
    #[error("failed to read confirmation: {0}")]
    Prompt(String),
    #[error("output error: {0}")]
    Output(#[from] std::io::Error),
    /// The operator declined the confirmation prompt.
    #[error("Aborted!")]
    Aborted,
}

/// Initializes the database. With `drop`, asks `confirm` first and then
/// drops every table before recreating the schema.
pub fn init<W, C>(pool: &DbPool, drop: bool, confirm: C, out: &mut W) -> Result<(), CommandError>
where
    W: Write,
    C: FnOnce(&str) -> Result<bool, CommandError>,
{
    let conn = pool.get()?;

    if drop {
        if !confirm(DROP_PROMPT)? {
            return Err(CommandError::Aborted);
        }
        drop_all(&conn)?;
        writeln!(out, "Drop tables.")?;
    }

    let applied = create_all(&conn)?;
    tracing::debug!(applied, "schema up to date");
    writeln!(out, "Initialized database.")?;
    Ok(())
}

/// Rebuilds the schema from scratch and fills it with `posts` fake posts.
pub fn forge<W: Write>(pool: &DbPool, posts: u32, out: &mut W) -> Result<(), CommandError> {
    let conn = pool.get()?;

    drop_all(&conn)?;
    create_all(&conn)?;

    writeln!(out, "Generating {posts} posts...")?;
    husky_blog::fake_posts(&conn, posts)?;

    writeln!(out, "Done.")?;
    Ok(())
}
