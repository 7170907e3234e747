//! Page-scoped persisted ids used for reload-time rejoin.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Store key holding the active game id while its channel is open.
pub const GAME_KEY: &str = "game";

/// Store key holding the watched tournament id while its channel is open.
pub const TOURNAMENT_KEY: &str = "tournament";

/// Session-scoped string store, the native stand-in for the browser's
/// per-page storage. While a remote game or tournament channel is open it
/// holds that id, so an interrupted session can offer a rejoin; terminal
/// closes remove it.
#[derive(Clone, Default)]
pub struct RejoinStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl RejoinStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, value: String) {
        self.values.lock().unwrap().insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    pub fn remove(&self, key: &str) {
        self.values.lock().unwrap().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let store = RejoinStore::new();
        assert_eq!(store.get(GAME_KEY), None);

        store.set(GAME_KEY, "42".to_string());
        assert_eq!(store.get(GAME_KEY), Some("42".to_string()));

        store.remove(GAME_KEY);
        assert_eq!(store.get(GAME_KEY), None);

        // Removing an absent key is fine.
        store.remove(GAME_KEY);
    }

    #[test]
    fn test_clones_share_state() {
        let store = RejoinStore::new();
        let handle = store.clone();

        handle.set(TOURNAMENT_KEY, "7".to_string());
        assert_eq!(store.get(TOURNAMENT_KEY), Some("7".to_string()));
    }
}
