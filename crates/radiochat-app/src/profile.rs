//! Locally persisted user profile: display name and avatar color.
//!
//! Storage is an external collaborator behind [`ProfileStore`], a plain
//! string key-value contract. The profile is read once at startup and written
//! when the user sets a name.

use std::{collections::HashMap, sync::Mutex};

use radiochat_core::Environment;
use thiserror::Error;
use tracing::warn;

use crate::ChatState;

/// Store key for the saved display name.
pub const USER_NAME_KEY: &str = "radio-chat-username";

/// Store key for the saved avatar color token.
pub const USER_COLOR_KEY: &str = "radio-chat-usercolor";

/// Avatar color tokens a new profile picks from.
pub const AVATAR_PALETTE: [&str; 10] =
    ["red", "blue", "green", "yellow", "purple", "pink", "indigo", "orange", "teal", "cyan"];

/// Profile errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProfileError {
    /// Name is blank.
    #[error("Name cannot be empty")]
    EmptyName,

    /// Another author in the log already uses this name.
    #[error("The name {0:?} is already used by another user. Please choose another name.")]
    NameTaken(String),

    /// The store could not persist a value.
    #[error("could not save profile: {0}")]
    Store(String),
}

/// String key-value storage for profile fields.
pub trait ProfileStore: Send + Sync {
    /// Saved value for `key`.
    fn load(&self, key: &str) -> Option<String>;

    /// Persist `value` under `key`.
    fn save(&self, key: &str, value: &str) -> Result<(), ProfileError>;
}

/// In-memory [`ProfileStore`].
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryProfileStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn load(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn save(&self, key: &str, value: &str) -> Result<(), ProfileError> {
        let mut values = self.values.lock().map_err(|e| ProfileError::Store(e.to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// The local user's identity as shown to others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    name: Option<String>,
    color: String,
}

impl Profile {
    /// Read the saved profile.
    ///
    /// A missing or unknown color is replaced with a random palette entry and
    /// saved. A failed save is logged; the color is still used for this
    /// session.
    pub fn load<S: ProfileStore + ?Sized, E: Environment>(store: &S, env: &E) -> Self {
        let name = store
            .load(USER_NAME_KEY)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let color = match store.load(USER_COLOR_KEY) {
            Some(color) if AVATAR_PALETTE.contains(&color.as_str()) => color,
            _ => {
                let color = AVATAR_PALETTE[env.random_index(AVATAR_PALETTE.len())].to_string();
                if let Err(error) = store.save(USER_COLOR_KEY, &color) {
                    warn!(%error, "failed to save avatar color");
                }
                color
            },
        };

        Self { name, color }
    }

    /// Saved display name, if the user has set one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Avatar color token.
    pub fn color(&self) -> &str {
        &self.color
    }

    /// Set and save the display name.
    ///
    /// Rejects blank names and names used by another author in `state`
    /// (trimmed, case-insensitive). Re-setting the current name is allowed.
    pub fn set_name<S: ProfileStore + ?Sized>(
        &mut self,
        store: &S,
        name: &str,
        state: &ChatState,
    ) -> Result<(), ProfileError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProfileError::EmptyName);
        }

        let is_current =
            self.name.as_deref().is_some_and(|current| current.to_lowercase() == name.to_lowercase());
        if !is_current && state.name_in_use(name) {
            return Err(ProfileError::NameTaken(name.to_string()));
        }

        store.save(USER_NAME_KEY, name)?;
        self.name = Some(name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use radiochat_core::{Author, Message, MessageId};

    use super::*;

    #[derive(Clone)]
    struct FixedEnv(u64);

    impl Environment for FixedEnv {
        type Instant = std::time::Instant;

        fn now(&self) -> Self::Instant {
            std::time::Instant::now()
        }

        fn wall_clock_millis(&self) -> i64 {
            0
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            let bytes = self.0.to_be_bytes();
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = bytes[i % bytes.len()];
            }
        }
    }

    fn state_with_author(name: &str) -> ChatState {
        ChatState {
            messages: vec![Message {
                id: MessageId::new("m1"),
                author: Author { name: name.to_string(), avatar: None },
                content: "hi".to_string(),
                timestamp: Default::default(),
            }],
            ..ChatState::default()
        }
    }

    #[test]
    fn load_picks_and_saves_color() {
        let store = MemoryProfileStore::new();
        let profile = Profile::load(&store, &FixedEnv(3));

        assert_eq!(profile.color(), AVATAR_PALETTE[3]);
        assert_eq!(profile.name(), None);
        assert_eq!(store.load(USER_COLOR_KEY).as_deref(), Some(AVATAR_PALETTE[3]));
    }

    #[test]
    fn load_keeps_saved_values() {
        let store = MemoryProfileStore::new();
        store.save(USER_NAME_KEY, "Alice").unwrap();
        store.save(USER_COLOR_KEY, "teal").unwrap();

        let profile = Profile::load(&store, &FixedEnv(0));
        assert_eq!(profile.name(), Some("Alice"));
        assert_eq!(profile.color(), "teal");
    }

    #[test]
    fn set_name_rejects_blank_and_taken() {
        let store = MemoryProfileStore::new();
        let mut profile = Profile::load(&store, &FixedEnv(0));
        let state = state_with_author("Bob");

        assert_eq!(profile.set_name(&store, "  ", &state), Err(ProfileError::EmptyName));
        assert_eq!(
            profile.set_name(&store, " bob ", &state),
            Err(ProfileError::NameTaken("bob".into()))
        );
        assert_eq!(store.load(USER_NAME_KEY), None);

        profile.set_name(&store, " Alice ", &state).unwrap();
        assert_eq!(profile.name(), Some("Alice"));
        assert_eq!(store.load(USER_NAME_KEY).as_deref(), Some("Alice"));
    }

    #[test]
    fn own_name_can_be_set_again() {
        let store = MemoryProfileStore::new();
        let mut profile = Profile::load(&store, &FixedEnv(0));
        profile.set_name(&store, "Alice", &ChatState::default()).unwrap();

        let state = state_with_author("Alice");
        assert!(profile.set_name(&store, "alice", &state).is_ok());
    }
}
