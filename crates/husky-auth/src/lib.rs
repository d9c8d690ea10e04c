//! Authentication for the Husky blog.
//!
//! Covers the user table (registration with field validation, lookup,
//! credential checks with argon2 hashes), database-backed sessions with
//! flash messages, and CSRF token verification.
//!
//! All functions take a borrowed `rusqlite::Connection` and are blocking;
//! the HTTP layer calls them from `spawn_blocking`.

mod csrf;
mod error;
mod password;
mod session;
mod users;

pub use csrf::{verify_csrf, CsrfError};
pub use error::AuthError;
pub use password::{hash_password, verify_password};
pub use session::{
    create_session, delete_session, generate_token, hash_token, load_session, login_session,
    prune_expired, set_flash, take_flash, IssuedSession, Session,
};
pub use users::{
    authenticate, create_user, get_user, get_user_by_username, validate_new_user, NewUser,
};
