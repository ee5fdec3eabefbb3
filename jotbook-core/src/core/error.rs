//! Error types for the Jotbook core library.

use thiserror::Error;

/// All errors that can occur within the Jotbook core library.
#[derive(Debug, Error)]
pub enum JotbookError {
    /// A SQLite operation in the durable key-value store failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// An I/O operation on the filesystem failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored record could not be serialized to or deserialized from JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The storage backend failed for a reason other than SQLite or I/O.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Input was rejected before anything was written.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// The write would break a uniqueness rule (e.g. a duplicate email).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A note ID was requested that does not exist in the caller's scope.
    #[error("Note not found: {0}")]
    NoteNotFound(String),

    /// A user ID was requested that is not in the registered-user set.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// The operation requires a signed-in user.
    #[error("No user is signed in")]
    NotAuthenticated,

    /// A password could not be hashed, or a stored hash could not be parsed.
    #[error("Password hash error: {0}")]
    PasswordHash(String),
}

/// Convenience alias that pins the error type to [`JotbookError`].
pub type Result<T> = std::result::Result<T, JotbookError>;

impl JotbookError {
    /// Returns a short, human-readable message suitable for display to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Database(e) => format!("Failed to save: {e}"),
            Self::Io(e) => format!("File error: {e}"),
            Self::Json(e) => format!("Data format error: {e}"),
            Self::Storage(e) => format!("Storage unavailable: {e}"),
            Self::ValidationFailed(msg) => msg.clone(),
            Self::Conflict(msg) => msg.clone(),
            Self::NoteNotFound(_) => "Note no longer exists".to_string(),
            Self::UserNotFound(_) => "Account no longer exists".to_string(),
            Self::NotAuthenticated => "Please sign in first".to_string(),
            Self::PasswordHash(_) => "Could not process the password".to_string(),
        }
    }

    /// Whether this error came from the durable store rather than from the caller's input.
    #[must_use]
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Io(_) | Self::Json(_) | Self::Storage(_)
        )
    }
}
