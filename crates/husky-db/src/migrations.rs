//! Embedded SQL migration runner.
//!
//! Migrations are SQL files embedded at compile time. They run sequentially,
//! tracked by the `_husky_migrations` table. Each migration runs exactly
//! once; already-applied migrations are skipped.

use rusqlite::Connection;
use thiserror::Error;

/// Name of the table recording which migrations have been applied.
const TRACKING_TABLE: &str = "_husky_migrations";

/// A single embedded migration.
struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. New migrations are appended here.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "001_users",
        sql: include_str!("migrations/001_users.sql"),
    },
    Migration {
        name: "002_posts",
        sql: include_str!("migrations/002_posts.sql"),
    },
    Migration {
        name: "003_sessions",
        sql: include_str!("migrations/003_sessions.sql"),
    },
];

/// Application tables, children before parents so foreign keys never block
/// a drop.
const TABLES: &[&str] = &["sessions", "posts", "users"];

/// Errors that can occur during schema management.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A SQL statement within a migration failed.
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        /// The name of the migration that failed.
        name: String,
        /// The underlying SQLite error.
        source: rusqlite::Error,
    },

    /// Failed to query migration state.
    #[error("failed to check migration state: {0}")]
    StateQuery(rusqlite::Error),

    /// Dropping the schema failed.
    #[error("failed to drop tables: {0}")]
    Drop(rusqlite::Error),
}

/// Runs all pending migrations against the given connection.
///
/// Returns the number of migrations applied by this call.
///
/// # Errors
///
/// Returns `MigrationError` if any migration fails to execute or if the
/// migration tracking table cannot be queried.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    run_migrations_from_list(conn, MIGRATIONS)
}

/// Creates every table that does not exist yet. Alias for [`run_migrations`].
pub fn create_all(conn: &Connection) -> Result<usize, MigrationError> {
    run_migrations(conn)
}

/// Drops every application table along with the migration tracking table,
/// leaving an empty database. A following [`create_all`] rebuilds the schema
/// from scratch.
///
/// # Errors
///
/// Returns `MigrationError::Drop` if any `DROP TABLE` fails; the whole drop
/// is rolled back in that case.
pub fn drop_all(conn: &Connection) -> Result<(), MigrationError> {
    let tx = conn.unchecked_transaction().map_err(MigrationError::Drop)?;
    for table in TABLES.iter().chain(std::iter::once(&TRACKING_TABLE)) {
        tracing::debug!(table, "dropping table");
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {table};"))
            .map_err(MigrationError::Drop)?;
    }
    tx.commit().map_err(MigrationError::Drop)?;
    tracing::info!(tables = TABLES.len(), "dropped all tables");
    Ok(())
}

fn run_migrations_from_list(
    conn: &Connection,
    migrations: &[Migration],
) -> Result<usize, MigrationError> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {TRACKING_TABLE} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );"
    ))
    .map_err(|e| MigrationError::ExecutionFailed {
        name: "_husky_migrations_bootstrap".to_string(),
        source: e,
    })?;

    let mut applied = 0;

    for migration in migrations {
        let already_applied: bool = conn
            .query_row(
                &format!("SELECT COUNT(*) > 0 FROM {TRACKING_TABLE} WHERE name = ?1"),
                [migration.name],
                |row| row.get(0),
            )
            .map_err(MigrationError::StateQuery)?;

        if already_applied {
            tracing::debug!(
                migration = migration.name,
                "migration already applied, skipping"
            );
            continue;
        }

        tracing::info!(migration = migration.name, "applying migration");

        let failed = |e: rusqlite::Error| MigrationError::ExecutionFailed {
            name: migration.name.to_string(),
            source: e,
        };

        let tx = conn.unchecked_transaction().map_err(failed)?;
        tx.execute_batch(migration.sql).map_err(failed)?;
        tx.execute(
            &format!("INSERT INTO {TRACKING_TABLE} (name) VALUES (?1)"),
            [migration.name],
        )
        .map_err(failed)?;
        tx.commit().map_err(failed)?;

        applied += 1;
    }

    Ok(applied)
}
