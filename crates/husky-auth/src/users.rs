//! User accounts: registration, lookup, and credential checks.

use chrono::Utc;
use husky_types::{
    FieldError, User, MAX_EMAIL_LEN, MAX_NAME_LEN, MAX_PASSWORD_LEN, MAX_USERNAME_LEN,
    MIN_PASSWORD_LEN,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::password::{hash_password, verify_password};
use crate::AuthError;

/// Registration input as submitted by the visitor.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub name: String,
    pub password: String,
    /// Confirmation field; must equal `password`.
    pub password2: String,
}

const USER_COLUMNS: &str = "id, username, email, name, created_at";

fn map_row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        name: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Validates registration fields, collecting every failure.
pub fn validate_new_user(new: &NewUser) -> Vec<FieldError> {
    let mut errors = Vec::new();

    let username = new.username.trim();
    if username.is_empty() {
        errors.push(FieldError::new("username", "Username is required."));
    } else if username.chars().count() > MAX_USERNAME_LEN {
        errors.push(FieldError::new(
            "username",
            format!("Username must be at most {MAX_USERNAME_LEN} characters."),
        ));
    } else if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        errors.push(FieldError::new(
            "username",
            "Username may only contain letters, digits and underscores.",
        ));
    }

    let email = new.email.trim();
    if email.is_empty() {
        errors.push(FieldError::new("email", "Email is required."));
    } else if email.len() > MAX_EMAIL_LEN || !looks_like_email(email) {
        errors.push(FieldError::new("email", "Invalid email address."));
    }

    let name = new.name.trim();
    if name.is_empty() {
        errors.push(FieldError::new("name", "Name is required."));
    } else if name.chars().count() > MAX_NAME_LEN {
        errors.push(FieldError::new(
            "name",
            format!("Name must be at most {MAX_NAME_LEN} characters."),
        ));
    }

    let password_len = new.password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&password_len) {
        errors.push(FieldError::new(
            "password",
            format!(
                "Password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters."
            ),
        ));
    } else if new.password != new.password2 {
        errors.push(FieldError::new("password2", "Passwords must match."));
    }

    errors
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Validates and stores a new user, returning the created record.
///
/// # Errors
///
/// - `AuthError::Validation` when any field is invalid.
/// - `AuthError::Conflict` when the username or email is taken.
pub fn create_user(conn: &Connection, new: &NewUser) -> Result<User, AuthError> {
    let errors = validate_new_user(new);
    if !errors.is_empty() {
        return Err(AuthError::Validation(errors));
    }

    let username = new.username.trim();
    let email = new.email.trim();

    let username_taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
        [username],
        |row| row.get(0),
    )?;
    if username_taken {
        return Err(AuthError::Conflict(FieldError::new(
            "username",
            "That username is already taken.",
        )));
    }
    let email_taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
        [email],
        |row| row.get(0),
    )?;
    if email_taken {
        return Err(AuthError::Conflict(FieldError::new(
            "email",
            "That email is already registered.",
        )));
    }

    let password_hash = hash_password(&new.password)?;
    let created_at = Utc::now();

    conn.execute(
        "INSERT INTO users (username, email, name, password_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![username, email, new.name.trim(), password_hash, created_at],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(ref err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            AuthError::Conflict(FieldError::new(
                "username",
                "That username or email is already registered.",
            ))
        }
        other => AuthError::Database(other),
    })?;

    let id = conn.last_insert_rowid();
    tracing::info!(user_id = id, username, "registered user");

    get_user(conn, id)
}

/// Retrieves a user by ID.
pub fn get_user(conn: &Connection, id: i64) -> Result<User, AuthError> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        [id],
        map_row_to_user,
    )
    .optional()?
    .ok_or_else(|| AuthError::NotFound(id.to_string()))
}

/// Retrieves a user by username.
pub fn get_user_by_username(conn: &Connection, username: &str) -> Result<User, AuthError> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
        [username],
        map_row_to_user,
    )
    .optional()?
    .ok_or_else(|| AuthError::NotFound(username.to_string()))
}

/// Checks a username/password pair and returns the matching user.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` for an unknown username and for a
/// wrong password alike.
pub fn authenticate(conn: &Connection, username: &str, password: &str) -> Result<User, AuthError> {
    let stored: Option<(i64, String)> = conn
        .query_row(
            "SELECT id, password_hash FROM users WHERE username = ?1",
            [username.trim()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((id, hash)) = stored else {
        tracing::debug!(username, "login attempt for unknown user");
        return Err(AuthError::InvalidCredentials);
    };

    if !verify_password(password, &hash) {
        tracing::debug!(user_id = id, "login attempt with wrong password");
        return Err(AuthError::InvalidCredentials);
    }

    get_user(conn, id)
}
