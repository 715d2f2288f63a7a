//! Guest session snapshot.
//!
//! Guests have no server-side history, so the whole active session is kept
//! under a single key and restored verbatim on the next start.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::store::{get_json, set_json, KeyValueStore, StoreError};
use crate::session::Message;

/// Key holding the identity blob.
pub const IDENTITY_KEY: &str = "iris.identity";

/// Key holding the single active guest session.
pub const GUEST_SESSION_KEY: &str = "iris.guest_session";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestSnapshot {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub image_preview: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub last_updated: DateTime<Utc>,
}

pub fn save_guest_snapshot(
    store: &dyn KeyValueStore,
    snapshot: &GuestSnapshot,
) -> Result<(), StoreError> {
    set_json(store, GUEST_SESSION_KEY, snapshot)
}

pub fn load_guest_snapshot(store: &dyn KeyValueStore) -> Result<Option<GuestSnapshot>, StoreError> {
    get_json(store, GUEST_SESSION_KEY)
}

pub fn clear_guest_snapshot(store: &dyn KeyValueStore) -> Result<(), StoreError> {
    store.remove(GUEST_SESSION_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{FileStore, MemoryStore};

    fn snapshot() -> GuestSnapshot {
        GuestSnapshot {
            session_id: Some("s-9".into()),
            image_preview: Some("data:image/png;base64,AA==".into()),
            messages: vec![Message::user("what is this?", None)],
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn save_and_load_through_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let snap = snapshot();

        save_guest_snapshot(&store, &snap).unwrap();
        let loaded = load_guest_snapshot(&store).unwrap().unwrap();

        assert_eq!(loaded, snap);
        assert!(dir.path().join("iris.guest_session.json").exists());
    }

    #[test]
    fn load_missing_is_none() {
        let store = MemoryStore::new();
        assert!(load_guest_snapshot(&store).unwrap().is_none());
    }

    #[test]
    fn clear_removes_snapshot() {
        let store = MemoryStore::new();
        save_guest_snapshot(&store, &snapshot()).unwrap();
        clear_guest_snapshot(&store).unwrap();
        assert!(load_guest_snapshot(&store).unwrap().is_none());
    }

    #[test]
    fn uses_camel_case_keys() {
        let store = MemoryStore::new();
        save_guest_snapshot(&store, &snapshot()).unwrap();
        let raw = store.get(GUEST_SESSION_KEY).unwrap().unwrap();
        assert!(raw.contains("\"sessionId\""));
        assert!(raw.contains("\"imagePreview\""));
        assert!(raw.contains("\"lastUpdated\""));
    }
}
