//! Internal domain modules for the Jotbook core library.
//!
//! All public types from these modules are re-exported at the crate root
//! with `#[doc(inline)]`; import from there in preference to this module.

pub mod credentials;
pub mod error;
pub mod filter;
pub mod memory;
pub mod note;
pub mod notebook;
pub mod password;
pub mod repository;
pub mod session;
pub mod settings;
pub mod storage;
pub mod user;

#[doc(inline)]
pub use credentials::CredentialStore;
#[doc(inline)]
pub use error::{JotbookError, Result};
#[doc(inline)]
pub use filter::{FilterState, SortBy, SortOrder};
#[doc(inline)]
pub use memory::MemoryStore;
#[doc(inline)]
pub use note::{Category, Note, NoteDraft, NotePatch};
#[doc(inline)]
pub use notebook::Notebook;
#[doc(inline)]
pub use password::{hash_password, verify_password};
#[doc(inline)]
pub use repository::NoteRepository;
#[doc(inline)]
pub use session::{
    guard_redirect, AuthState, Redirect, RouteGroup, RouteGuard, SessionManager, SessionPhase,
};
#[doc(inline)]
pub use settings::{load_settings, save_settings, AppSettings};
#[doc(inline)]
pub use storage::{KeyValueStore, SqliteStore};
#[doc(inline)]
pub use user::User;
