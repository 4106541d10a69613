//! Profile storage backed by a JSON file.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use radiochat_app::{ProfileError, ProfileStore};
use thiserror::Error;

/// Errors opening a profile file.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The file exists but could not be read.
    #[error("could not read {path}: {source}")]
    Read {
        /// Profile file path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The file is not a JSON object of strings.
    #[error("{path} is not a valid profile file: {source}")]
    Parse {
        /// Profile file path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
}

/// [`ProfileStore`] persisted as a flat JSON object.
///
/// The whole file is rewritten on every save.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open `path`, starting empty if the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)
                .map_err(|source| StoreError::Parse { path: path.clone(), source })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Read { path, source }),
        };

        Ok(Self { path, values: Mutex::new(values) })
    }

    /// File backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProfileStore for JsonFileStore {
    fn load(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    fn save(&self, key: &str, value: &str) -> Result<(), ProfileError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());

        let text = serde_json::to_string_pretty(&*values)
            .map_err(|e| ProfileError::Store(e.to_string()))?;
        fs::write(&self.path, text)
            .map_err(|e| ProfileError::Store(format!("{}: {e}", self.path.display())))
    }
}

#[cfg(test)]
mod tests {
    use radiochat_app::{USER_COLOR_KEY, USER_NAME_KEY};

    use super::*;

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("profile.json")).unwrap();
        assert_eq!(store.load(USER_NAME_KEY), None);
    }

    #[test]
    fn saved_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.save(USER_NAME_KEY, "Alice").unwrap();
        store.save(USER_COLOR_KEY, "teal").unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.load(USER_NAME_KEY).as_deref(), Some("Alice"));
        assert_eq!(reopened.load(USER_COLOR_KEY).as_deref(), Some("teal"));
    }

    #[test]
    fn garbage_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        fs::write(&path, "[1, 2]").unwrap();

        assert!(matches!(JsonFileStore::open(&path), Err(StoreError::Parse { .. })));
    }

    #[test]
    fn unwritable_path_reports_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("missing").join("profile.json")).unwrap();

        assert!(matches!(store.save(USER_NAME_KEY, "Alice"), Err(ProfileError::Store(_))));
    }
}
