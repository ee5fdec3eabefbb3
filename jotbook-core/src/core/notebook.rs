//! The signed-in user's notes, plus the filtered and sorted list derived from them.
//!
//! A [`Notebook`] is opened with [`Notebook::for_session`] once someone is
//! signed in, and must be dropped when they sign out; it holds no reference to
//! the session and does not notice the sign-out by itself.
//!
//! The notebook caches the user's notes, forwards mutations to the shared
//! [`NoteRepository`], and recomputes the displayed list eagerly after every
//! change to the notes or the [`FilterState`]. Callers read the result from the
//! return value or from [`Notebook::visible`]; nothing is recomputed lazily.
//!
//! When a mutation fails, both the cache and the displayed list are left as they
//! were.

use std::sync::Arc;

use crate::core::repository::NoteRepository;
use crate::core::session::SessionManager;
use crate::core::storage::KeyValueStore;
use crate::{Category, FilterState, JotbookError, Note, NoteDraft, NotePatch, Result, User};

/// Per-session notes context for one user.
pub struct Notebook<S> {
    repository: Arc<NoteRepository<S>>,
    user_id: String,
    notes: Vec<Note>,
    filter: FilterState,
    visible: Vec<Note>,
}

impl<S: KeyValueStore> Notebook<S> {
    /// Loads `user`'s notes and derives the initial list under `filter`.
    ///
    /// A storage failure is logged and yields an empty notebook; call
    /// [`reload`](Self::reload) to retry.
    pub(crate) async fn open(
        repository: Arc<NoteRepository<S>>,
        user: &User,
        filter: FilterState,
    ) -> Self {
        let notes = match repository.load(&user.id).await {
            Ok(notes) => notes,
            Err(e) => {
                log::error!("failed to load notes for user {}: {e}", user.id);
                Vec::new()
            }
        };
        let mut notebook = Self {
            repository,
            user_id: user.id.clone(),
            notes,
            filter,
            visible: Vec::new(),
        };
        notebook.recompute();
        notebook
    }

    /// Opens the notebook of whoever is signed in to `session`.
    ///
    /// Drop the returned notebook when that user signs out.
    ///
    /// # Errors
    ///
    /// Returns [`JotbookError::NotAuthenticated`] if nobody is signed in.
    pub async fn for_session<K: KeyValueStore>(
        repository: Arc<NoteRepository<S>>,
        session: &SessionManager<K>,
        filter: FilterState,
    ) -> Result<Self> {
        let user = session.current_user().ok_or(JotbookError::NotAuthenticated)?;
        Ok(Self::open(repository, user, filter).await)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// All of the user's notes, unfiltered, in storage order.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// The filtered and sorted list for display.
    pub fn visible(&self) -> &[Note] {
        &self.visible
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn get_note(&self, note_id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == note_id)
    }

    /// The user's notes in `category`, ignoring the current filter.
    pub fn notes_by_category(&self, category: Category) -> Vec<Note> {
        self.notes
            .iter()
            .filter(|n| n.category == category)
            .cloned()
            .collect()
    }

    /// Replaces the filter state wholesale and returns the new list.
    pub fn set_filter(&mut self, filter: FilterState) -> &[Note] {
        self.filter = filter;
        self.recompute();
        &self.visible
    }

    /// Re-reads the user's notes from storage.
    ///
    /// # Errors
    ///
    /// Returns a storage error; the cached notes are kept.
    pub async fn reload(&mut self) -> Result<&[Note]> {
        self.notes = self.repository.load(&self.user_id).await?;
        self.recompute();
        Ok(&self.visible)
    }

    /// Creates a note and returns it. The displayed list is refreshed.
    ///
    /// # Errors
    ///
    /// Returns [`JotbookError::ValidationFailed`] for blank content, or a storage error.
    pub async fn add_note(&mut self, draft: NoteDraft) -> Result<Note> {
        let note = self.repository.add_note(&self.user_id, draft).await?;
        self.notes.push(note.clone());
        self.recompute();
        Ok(note)
    }

    /// Updates a note and returns the new list.
    ///
    /// # Errors
    ///
    /// Returns [`JotbookError::NoteNotFound`] if the user owns no such note,
    /// [`JotbookError::ValidationFailed`] for blank content, or a storage error.
    pub async fn update_note(&mut self, note_id: &str, patch: NotePatch) -> Result<&[Note]> {
        let updated = self
            .repository
            .update_note(&self.user_id, note_id, patch)
            .await?;
        match self.notes.iter_mut().find(|n| n.id == note_id) {
            Some(slot) => *slot = updated,
            None => self.notes.push(updated),
        }
        self.recompute();
        Ok(&self.visible)
    }

    /// Deletes a note and returns the new list. Unknown ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns a storage error; the note stays in the cache.
    pub async fn delete_note(&mut self, note_id: &str) -> Result<&[Note]> {
        self.repository.delete_note(&self.user_id, note_id).await?;
        self.notes.retain(|n| n.id != note_id);
        self.recompute();
        Ok(&self.visible)
    }

    /// Deletes all of the user's notes and returns the (empty) list.
    ///
    /// # Errors
    ///
    /// Returns a storage error; the cache is kept.
    pub async fn clear(&mut self) -> Result<&[Note]> {
        self.repository.clear(&self.user_id).await?;
        self.notes.clear();
        self.recompute();
        Ok(&self.visible)
    }

    fn recompute(&mut self) {
        self.visible = self.filter.apply(&self.notes);
    }
}
