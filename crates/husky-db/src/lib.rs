//! Database layer for the Husky blog.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! and embedded SQL migrations. Every table is created through versioned
//! migrations managed by this crate; `drop_all` and `create_all` back the
//! `init` and `forge` CLI commands.

mod migrations;
mod pool;

pub use migrations::{create_all, drop_all, run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError, MEMORY_PATH};
