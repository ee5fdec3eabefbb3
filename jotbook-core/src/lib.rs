//! Core library for Jotbook, a local-first, multi-user note-taking application.
//!
//! A [`SessionManager`] signs users up and in against credentials kept in a
//! [`KeyValueStore`]. Once someone is signed in, a [`Notebook`] opened for that
//! [`User`] holds their notes and the filtered, sorted list derived from them;
//! all note mutations go through [`Notebook`] or the underlying [`NoteRepository`].
//!
//! Types are re-exported from their respective sub-modules for convenience;
//! consumers should import from the crate root rather than the `core` module.

pub mod core;

// Re-export commonly used types.
#[doc(inline)]
pub use core::{
    credentials::CredentialStore,
    error::{JotbookError, Result},
    filter::{FilterState, SortBy, SortOrder},
    memory::MemoryStore,
    note::{Category, Note, NoteDraft, NotePatch},
    notebook::Notebook,
    password::{hash_password, verify_password},
    repository::NoteRepository,
    session::{
        guard_redirect, AuthState, Redirect, RouteGroup, RouteGuard, SessionManager, SessionPhase,
    },
    settings::{
        default_data_directory, load_settings, load_settings_from, save_settings,
        save_settings_to, settings_file_path, AppSettings,
    },
    storage::{
        read_json, write_json, KeyValueStore, SqliteStore, CURRENT_USER_KEY, NOTES_KEY, USERS_KEY,
    },
    user::User,
};
