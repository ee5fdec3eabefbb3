use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::password::hash_password;
use crate::Result;

/// A registered account, as persisted under [`USERS_KEY`](crate::USERS_KEY).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    /// Unique across all users; compared exactly.
    pub email: String,
    /// Argon2 PHC string, never the plaintext password.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Builds a new account with a fresh id, the current time, and a hashed password.
    ///
    /// # Errors
    ///
    /// Returns [`crate::JotbookError::PasswordHash`] if the password cannot be hashed.
    pub fn register(username: &str, email: &str, password: &str) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: hash_password(password)?,
            created_at: Utc::now(),
        })
    }
}
