//! Shared domain types for the Husky blog.
//!
//! Holds the plain data structures passed between the persistence crates
//! (`husky-auth`, `husky-blog`) and the HTTP layer (`husky-server`), along
//! with the field limits both sides validate against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum username length in characters.
pub const MAX_USERNAME_LEN: usize = 20;
/// Maximum display name length in characters.
pub const MAX_NAME_LEN: usize = 30;
/// Maximum email length in bytes.
pub const MAX_EMAIL_LEN: usize = 254;
/// Minimum password length in characters.
pub const MIN_PASSWORD_LEN: usize = 8;
/// Maximum password length in characters.
pub const MAX_PASSWORD_LEN: usize = 128;
/// Maximum post title length in characters.
pub const MAX_TITLE_LEN: usize = 60;
/// Maximum post body length in characters.
pub const MAX_BODY_LEN: usize = 20_000;

/// A registered user.
///
/// The password hash never leaves `husky-auth`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Internal database ID.
    pub id: i64,
    /// Unique login name.
    pub username: String,
    /// Unique email address.
    pub email: String,
    /// Display name shown next to posts.
    pub name: String,
    /// Account creation time.
    pub created_at: DateTime<Utc>,
}

/// A blog post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Internal database ID.
    pub id: i64,
    pub title: String,
    pub body: String,
    /// Publication time.
    pub timestamp: DateTime<Utc>,
    /// Author's user ID. `None` for generated posts or deleted authors.
    pub author_id: Option<i64>,
    /// Author's display name, joined in at query time.
    pub author_name: Option<String>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// 1-based page number.
    pub page: u32,
    /// Maximum items per page.
    pub per_page: u32,
    /// Total number of items across all pages.
    pub total: u64,
}

impl<T> Page<T> {
    /// Total number of pages. An empty listing still has one (empty) page.
    pub fn pages(&self) -> u32 {
        if self.per_page == 0 || self.total == 0 {
            return 1;
        }
        let per_page = u64::from(self.per_page);
        u32::try_from(self.total.div_ceil(per_page)).unwrap_or(u32::MAX)
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.pages()
    }

    /// Whether the requested page lies past the last page.
    pub fn is_out_of_range(&self) -> bool {
        self.page > self.pages()
    }
}

/// Category of a flash message, mapped to a CSS class when rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlashKind {
    Info,
    Success,
    Warning,
    Danger,
}

impl FlashKind {
    /// Returns the stored string form of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }

    /// Parses a stored kind, falling back to `Info` for unknown values.
    pub fn parse_lossy(s: &str) -> Self {
        match s {
            "success" => Self::Success,
            "warning" => Self::Warning,
            "danger" => Self::Danger,
            _ => Self::Info,
        }
    }
}

/// A one-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn new(kind: FlashKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A validation failure attached to a single form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Form field name, e.g. `"username"`.
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Returns the first error message reported for `field`, if any.
pub fn error_for<'a>(errors: &'a [FieldError], field: &str) -> Option<&'a str> {
    errors
        .iter()
        .find(|e| e.field == field)
        .map(|e| e.message.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(page: u32, per_page: u32, total: u64) -> Page<()> {
        Page {
            items: Vec::new(),
            page,
            per_page,
            total,
        }
    }

    #[test]
    fn pages_rounds_up() {
        assert_eq!(page(1, 10, 0).pages(), 1);
        assert_eq!(page(1, 10, 10).pages(), 1);
        assert_eq!(page(1, 10, 11).pages(), 2);
        assert_eq!(page(1, 10, 50).pages(), 5);
    }

    #[test]
    fn prev_next_flags() {
        let first = page(1, 10, 25);
        assert!(!first.has_prev());
        assert!(first.has_next());

        let last = page(3, 10, 25);
        assert!(last.has_prev());
        assert!(!last.has_next());
        assert!(!last.is_out_of_range());

        assert!(page(4, 10, 25).is_out_of_range());
    }

    #[test]
    fn empty_listing_first_page_is_in_range() {
        let empty = page(1, 10, 0);
        assert!(!empty.is_out_of_range());
        assert!(!empty.has_next());
        assert!(page(2, 10, 0).is_out_of_range());
    }

    #[test]
    fn flash_kind_round_trips_known_values() {
        for kind in [
            FlashKind::Info,
            FlashKind::Success,
            FlashKind::Warning,
            FlashKind::Danger,
        ] {
            assert_eq!(FlashKind::parse_lossy(kind.as_str()), kind);
        }
        assert_eq!(FlashKind::parse_lossy("bogus"), FlashKind::Info);
    }

    #[test]
    fn field_error_displays_field_and_message() {
        let error = FieldError::new("email", "Invalid email address.");
        assert_eq!(error.to_string(), "email: Invalid email address.");
    }

    #[test]
    fn error_for_returns_first_match() {
        let errors = vec![
            FieldError::new("title", "Title is required."),
            FieldError::new("title", "second"),
            FieldError::new("body", "Body is required."),
        ];
        assert_eq!(error_for(&errors, "title"), Some("Title is required."));
        assert_eq!(error_for(&errors, "body"), Some("Body is required."));
        assert_eq!(error_for(&errors, "email"), None);
    }
}
