//! Application settings persistence for Jotbook.
//!
//! Stores where the local database lives and the initial sort of the note list
//! in a JSON file at an OS-appropriate location.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::filter::{FilterState, SortBy, SortOrder};
use crate::core::storage::SqliteStore;
use crate::Result;

/// Persisted application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    /// Directory holding the database file.
    pub data_directory: String,
    /// File name of the SQLite database inside `data_directory`.
    pub database_file: String,
    pub default_sort_by: SortBy,
    pub default_sort_order: SortOrder,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            data_directory: default_data_directory().to_string_lossy().to_string(),
            database_file: "jotbook.db".to_string(),
            default_sort_by: SortBy::default(),
            default_sort_order: SortOrder::default(),
        }
    }
}

impl AppSettings {
    pub fn database_path(&self) -> PathBuf {
        Path::new(&self.data_directory).join(&self.database_file)
    }

    /// Opens the key-value store at [`database_path`](Self::database_path),
    /// creating the data directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::JotbookError::Io`] if the directory cannot be created, or
    /// [`crate::JotbookError::Database`] if the file is not a usable database.
    pub fn open_store(&self) -> Result<SqliteStore> {
        fs::create_dir_all(&self.data_directory)?;
        let path = self.database_path();
        log::info!("opening note store at {}", path.display());
        SqliteStore::open(path)
    }

    /// Filter state the note list starts with: no search, no category, and the
    /// configured sort.
    pub fn default_filter(&self) -> FilterState {
        FilterState::default().sorted(self.default_sort_by, self.default_sort_order)
    }
}

/// Returns the path to the settings JSON file.
///
/// - macOS / Linux: `~/.config/jotbook/settings.json`
/// - Windows: `%APPDATA%/Jotbook/settings.json`
pub fn settings_file_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("Jotbook").join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("jotbook").join("settings.json")
    }
}

/// Returns the default data directory, e.g. `~/.local/share/Jotbook` on Linux.
pub fn default_data_directory() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".local")
                .join("share")
        })
        .join("Jotbook")
}

/// Loads settings from disk; returns defaults if the file is missing or corrupt.
pub fn load_settings() -> AppSettings {
    load_settings_from(&settings_file_path())
}

pub fn load_settings_from(path: &Path) -> AppSettings {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("ignoring unreadable settings file {}: {e}", path.display());
            AppSettings::default()
        }),
        Err(_) => AppSettings::default(),
    }
}

/// Saves settings to disk, creating parent directories as needed.
pub fn save_settings(settings: &AppSettings) -> Result<()> {
    save_settings_to(&settings_file_path(), settings)
}

pub fn save_settings_to(path: &Path, settings: &AppSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    Ok(())
}
