//! Server-side sessions keyed by an opaque cookie token.
//!
//! The browser holds a random 32-byte token; the `sessions` table only ever
//! sees its SHA-256 digest. Each session carries the CSRF token for the
//! visitor's forms and at most one pending flash message.

use chrono::{DateTime, Duration, Utc};
use husky_types::{Flash, FlashKind};
use rusqlite::{params, Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};

use crate::AuthError;

/// A loaded session row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Hex SHA-256 of the cookie token; the primary key.
    pub token_hash: String,
    /// Logged-in user, if any.
    pub user_id: Option<i64>,
    /// Token that unsafe requests from this visitor must echo back.
    pub csrf_token: String,
    pub expires_at: DateTime<Utc>,
}

/// A freshly issued session together with the raw token for the cookie.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    /// Raw cookie value. Never persisted.
    pub token: String,
    pub session: Session,
}

/// Generates 32 random bytes, hex encoded.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Hex SHA-256 digest of a cookie token.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn map_row_to_session(row: &Row) -> rusqlite::Result<Session> {
    Ok(Session {
        token_hash: row.get(0)?,
        user_id: row.get(1)?,
        csrf_token: row.get(2)?,
        expires_at: row.get(3)?,
    })
}

/// Creates a session that lives for `ttl`, optionally bound to a user.
///
/// Expired sessions are swept first, so the table stays bounded by the
/// number of live visitors.
pub fn create_session(
    conn: &Connection,
    user_id: Option<i64>,
    ttl: Duration,
) -> Result<IssuedSession, AuthError> {
    let now = Utc::now();
    let expires_at = now
        .checked_add_signed(ttl)
        .ok_or(AuthError::SessionLifetime)?;

    let token = generate_token();
    let session = Session {
        token_hash: hash_token(&token),
        user_id,
        csrf_token: generate_token(),
        expires_at,
    };

    prune_expired(conn, now)?;
    conn.execute(
        "INSERT INTO sessions (token_hash, user_id, csrf_token, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            session.token_hash,
            session.user_id,
            session.csrf_token,
            now,
            session.expires_at
        ],
    )?;

    tracing::debug!(user_id = ?user_id, "created session");

    Ok(IssuedSession { token, session })
}

/// Looks up a live session by its raw cookie token.
///
/// Expired sessions are reported as `None` exactly like unknown ones.
pub fn load_session(
    conn: &Connection,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<Session>, AuthError> {
    let session = conn
        .query_row(
            "SELECT token_hash, user_id, csrf_token, expires_at
             FROM sessions WHERE token_hash = ?1 AND expires_at > ?2",
            params![hash_token(token), now],
            map_row_to_session,
        )
        .optional()?;
    Ok(session)
}

/// Replaces the visitor's current session with a new one bound to
/// `user_id`. The old token stops working immediately.
///
/// A pending flash message is carried over to the new session.
pub fn login_session(
    conn: &Connection,
    old_token_hash: Option<&str>,
    user_id: i64,
    ttl: Duration,
) -> Result<IssuedSession, AuthError> {
    let tx = conn.unchecked_transaction()?;

    let carried = match old_token_hash {
        Some(hash) => {
            let flash = take_flash(&tx, hash)?;
            delete_session(&tx, hash)?;
            flash
        }
        None => None,
    };

    let issued = create_session(&tx, Some(user_id), ttl)?;
    if let Some(flash) = carried {
        set_flash(&tx, &issued.session.token_hash, &flash)?;
    }

    tx.commit()?;

    tracing::info!(user_id, "user logged in");
    Ok(issued)
}

/// Deletes a session. Deleting an unknown session is not an error.
pub fn delete_session(conn: &Connection, token_hash: &str) -> Result<(), AuthError> {
    conn.execute("DELETE FROM sessions WHERE token_hash = ?1", [token_hash])?;
    Ok(())
}

/// Removes every session that expired at or before `now`.
pub fn prune_expired(conn: &Connection, now: DateTime<Utc>) -> Result<usize, AuthError> {
    let removed = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [now])?;
    if removed > 0 {
        tracing::debug!(removed, "pruned expired sessions");
    }
    Ok(removed)
}

/// Stores a flash message for the next page render, replacing any pending one.
pub fn set_flash(conn: &Connection, token_hash: &str, flash: &Flash) -> Result<(), AuthError> {
    conn.execute(
        "UPDATE sessions SET flash_kind = ?1, flash_message = ?2 WHERE token_hash = ?3",
        params![flash.kind.as_str(), flash.message, token_hash],
    )?;
    Ok(())
}

/// Pops the pending flash message, if any.
pub fn take_flash(conn: &Connection, token_hash: &str) -> Result<Option<Flash>, AuthError> {
    let stored: Option<(Option<String>, Option<String>)> = conn
        .query_row(
            "SELECT flash_kind, flash_message FROM sessions WHERE token_hash = ?1",
            [token_hash],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((kind, Some(message))) = stored else {
        return Ok(None);
    };

    conn.execute(
        "UPDATE sessions SET flash_kind = NULL, flash_message = NULL WHERE token_hash = ?1",
        [token_hash],
    )?;

    let kind = kind.as_deref().map_or(FlashKind::Info, FlashKind::parse_lossy);
    Ok(Some(Flash { kind, message }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_random_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn hash_token_is_stable_and_hides_token() {
        let token = generate_token();
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
        assert_eq!(hash_token(&token).len(), 64);
    }
}
