//! Durable note storage, partitioned by owning user.
//!
//! All users' notes share one flat JSON array under [`NOTES_KEY`]. Every
//! mutation reads the whole array, changes only entries owned by the calling
//! user, and writes the whole array back while holding the repository's lock, so
//! concurrent calls on one repository can never lose each other's writes or drop
//! another user's notes.
//!
//! Every operation takes the caller's `user_id`; a note owned by someone else is
//! indistinguishable from a note that does not exist.

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::core::note::{normalize_title, validate_content};
use crate::core::storage::{read_json, write_json, KeyValueStore, NOTES_KEY};
use crate::{JotbookError, Note, NoteDraft, NotePatch, Result};

/// Per-user view over the shared note set.
pub struct NoteRepository<S> {
    store: S,
    /// Held across every read-modify-write of the note set.
    notes_lock: Mutex<()>,
}

impl<S: KeyValueStore> NoteRepository<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            notes_lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<Vec<Note>> {
        Ok(read_json(&self.store, NOTES_KEY).await?.unwrap_or_default())
    }

    async fn write_all(&self, notes: &[Note]) -> Result<()> {
        write_json(&self.store, NOTES_KEY, notes).await
    }

    /// Returns `user_id`'s notes in storage order.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the note set cannot be read or parsed.
    pub async fn load(&self, user_id: &str) -> Result<Vec<Note>> {
        let notes = self
            .read_all()
            .await?
            .into_iter()
            .filter(|n| n.user_id == user_id)
            .collect::<Vec<_>>();
        log::debug!("loaded {} notes for user {user_id}", notes.len());
        Ok(notes)
    }

    /// Fetches a single note owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the note set cannot be read or parsed.
    pub async fn get_note(&self, user_id: &str, note_id: &str) -> Result<Option<Note>> {
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .find(|n| n.id == note_id && n.user_id == user_id))
    }

    /// Creates a note for `user_id` with a fresh id and `created_at == updated_at == now`.
    ///
    /// # Errors
    ///
    /// Returns [`JotbookError::ValidationFailed`] if the content is blank (nothing
    /// is written), or a storage error.
    pub async fn add_note(&self, user_id: &str, draft: NoteDraft) -> Result<Note> {
        validate_content(&draft.content)?;

        let now = Utc::now();
        let note = Note {
            id: Uuid::new_v4().to_string(),
            title: normalize_title(draft.title),
            content: draft.content,
            category: draft.category,
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        };

        let _guard = self.notes_lock.lock().await;
        let mut notes = self.read_all().await?;
        notes.push(note.clone());
        self.write_all(&notes).await?;

        log::debug!("added note {} for user {user_id}", note.id);
        Ok(note)
    }

    /// Applies `patch` to one of `user_id`'s notes and refreshes its `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`JotbookError::NoteNotFound`] if `user_id` owns no note with that
    /// id, [`JotbookError::ValidationFailed`] if the patch blanks the content, or a
    /// storage error. Nothing is written on error.
    pub async fn update_note(&self, user_id: &str, note_id: &str, patch: NotePatch) -> Result<Note> {
        let _guard = self.notes_lock.lock().await;
        let mut notes = self.read_all().await?;

        let note = notes
            .iter_mut()
            .find(|n| n.id == note_id && n.user_id == user_id)
            .ok_or_else(|| JotbookError::NoteNotFound(note_id.to_string()))?;
        note.apply(patch)?;
        let updated = note.clone();

        self.write_all(&notes).await?;
        log::debug!("updated note {note_id} for user {user_id}");
        Ok(updated)
    }

    /// Inserts or replaces a whole note.
    ///
    /// If `user_id` already owns a note with `note.id`, its title, content and
    /// category are replaced and `updated_at` refreshed; `created_at` and
    /// `user_id` are kept from the stored copy. Otherwise the note is inserted as
    /// new, with a fresh id and timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`JotbookError::ValidationFailed`] if the content is blank, or a
    /// storage error.
    pub async fn save_note(&self, user_id: &str, note: Note) -> Result<Note> {
        validate_content(&note.content)?;

        let _guard = self.notes_lock.lock().await;
        let mut notes = self.read_all().await?;

        let saved = match notes
            .iter_mut()
            .find(|n| n.id == note.id && n.user_id == user_id)
        {
            Some(existing) => {
                existing.title = normalize_title(note.title);
                existing.content = note.content;
                existing.category = note.category;
                existing.touch();
                existing.clone()
            }
            None => {
                let now = Utc::now();
                let fresh = Note {
                    id: Uuid::new_v4().to_string(),
                    title: normalize_title(note.title),
                    content: note.content,
                    category: note.category,
                    user_id: user_id.to_string(),
                    created_at: now,
                    updated_at: now,
                };
                notes.push(fresh.clone());
                fresh
            }
        };

        self.write_all(&notes).await?;
        Ok(saved)
    }

    /// Deletes one of `user_id`'s notes. Returns whether anything was removed.
    ///
    /// Deleting an unknown id is a no-op and does not touch storage.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the note set cannot be read or written.
    pub async fn delete_note(&self, user_id: &str, note_id: &str) -> Result<bool> {
        let _guard = self.notes_lock.lock().await;
        let mut notes = self.read_all().await?;

        let before = notes.len();
        notes.retain(|n| !(n.id == note_id && n.user_id == user_id));
        if notes.len() == before {
            log::debug!("delete of unknown note {note_id} ignored");
            return Ok(false);
        }

        self.write_all(&notes).await?;
        log::debug!("deleted note {note_id} for user {user_id}");
        Ok(true)
    }

    /// Deletes every note owned by `user_id`, leaving other users' notes alone.
    /// Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the note set cannot be read or written.
    pub async fn clear(&self, user_id: &str) -> Result<usize> {
        let _guard = self.notes_lock.lock().await;
        let mut notes = self.read_all().await?;

        let before = notes.len();
        notes.retain(|n| n.user_id != user_id);
        let removed = before - notes.len();
        if removed > 0 {
            self.write_all(&notes).await?;
        }
        log::info!("cleared {removed} notes for user {user_id}");
        Ok(removed)
    }
}
