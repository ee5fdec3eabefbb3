use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::filter::SortBy;
use crate::{JotbookError, Result};

/// Fixed classification attached to every note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Work,
    Study,
    Personal,
}

impl Category {
    /// Every category, in display order.
    pub const ALL: [Category; 3] = [Category::Work, Category::Study, Category::Personal];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Study => "study",
            Self::Personal => "personal",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = JotbookError;

    /// Parses a category name case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "work" => Ok(Self::Work),
            "study" => Ok(Self::Study),
            "personal" => Ok(Self::Personal),
            other => Err(JotbookError::ValidationFailed(format!(
                "Unknown category: {other}"
            ))),
        }
    }
}

/// A single note, as persisted under [`NOTES_KEY`](crate::NOTES_KEY).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    pub category: Category,
    /// Owning user's id; never changes after creation.
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Whether the note has been changed since it was created.
    #[must_use]
    pub fn is_edited(&self) -> bool {
        self.updated_at != self.created_at
    }

    /// The timestamp named by `sort_by`.
    #[must_use]
    pub fn timestamp(&self, sort_by: SortBy) -> DateTime<Utc> {
        match sort_by {
            SortBy::CreatedAt => self.created_at,
            SortBy::UpdatedAt => self.updated_at,
        }
    }

    /// Applies `patch` and refreshes `updated_at`. `created_at` and `user_id` are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`JotbookError::ValidationFailed`] if the patch would leave the
    /// content empty; the note is not modified in that case.
    pub fn apply(&mut self, patch: NotePatch) -> Result<()> {
        if let Some(content) = &patch.content {
            validate_content(content)?;
        }
        if let Some(title) = patch.title {
            self.title = normalize_title(Some(title));
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        self.touch();
        Ok(())
    }

    /// Moves `updated_at` to now, never earlier than its previous value.
    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.updated_at);
    }
}

/// Fields supplied by the user when creating a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    pub title: Option<String>,
    pub content: String,
    pub category: Category,
}

impl NoteDraft {
    pub fn new(content: impl Into<String>, category: Category) -> Self {
        Self {
            title: None,
            content: content.into(),
            category,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Partial update for an existing note. `None` fields are left as they are.
///
/// A title that is blank after trimming clears the note's title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<Category>,
}

impl NotePatch {
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    #[must_use]
    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }
}

pub(crate) fn validate_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(JotbookError::ValidationFailed(
            "Note content cannot be empty".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn normalize_title(title: Option<String>) -> Option<String> {
    title.filter(|t| !t.trim().is_empty())
}
