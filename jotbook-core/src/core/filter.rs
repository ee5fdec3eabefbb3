//! Search, category and sort criteria, and the derivation of the displayed list.
//!
//! [`FilterState::apply`] is a pure function of its inputs: it never mutates the
//! notes it is given, and equal inputs always produce equal output.
//!
//! The derivation runs in three steps:
//!
//! 1. **Search**: if `search_query` is non-blank, keep notes whose title or
//!    content contains the trimmed query, ignoring case.
//! 2. **Category**: if `category` is set, keep only notes in it.
//! 3. **Sort**: order by the timestamp named in `sort_by`, newest first for
//!    [`SortOrder::Desc`]. The sort is stable, so notes with equal timestamps keep
//!    their relative order.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::{Category, Note};

/// Timestamp used to order the displayed list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[default]
    CreatedAt,
    UpdatedAt,
}

/// Direction of the displayed list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// The opposite direction.
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Transient criteria for deriving the displayed note list.
///
/// Callers replace the whole state on each change; there is no partial merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub search_query: Option<String>,
    pub category: Option<Category>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

impl FilterState {
    #[must_use]
    pub fn with_search(mut self, query: impl Into<String>) -> Self {
        self.search_query = Some(query.into());
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    #[must_use]
    pub fn sorted(mut self, sort_by: SortBy, sort_order: SortOrder) -> Self {
        self.sort_by = sort_by;
        self.sort_order = sort_order;
        self
    }

    /// Flips the sort direction, keeping every other criterion.
    #[must_use]
    pub fn toggle_sort_order(mut self) -> Self {
        self.sort_order = self.sort_order.toggled();
        self
    }

    /// Returns the notes that pass the search and category filters, sorted.
    #[must_use]
    pub fn apply(&self, notes: &[Note]) -> Vec<Note> {
        let query = self
            .search_query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        let mut visible: Vec<Note> = notes
            .iter()
            .filter(|note| query.as_deref().map_or(true, |q| matches_query(note, q)))
            .filter(|note| self.category.map_or(true, |c| note.category == c))
            .cloned()
            .collect();

        // Vec::sort_by is stable; equal timestamps keep storage order.
        visible.sort_by(|a, b| {
            let ordering: Ordering = a.timestamp(self.sort_by).cmp(&b.timestamp(self.sort_by));
            match self.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
        visible
    }
}

/// `query` must already be lowercased.
fn matches_query(note: &Note, query: &str) -> bool {
    note.title
        .as_deref()
        .is_some_and(|t| t.to_lowercase().contains(query))
        || note.content.to_lowercase().contains(query)
}
