//! In-memory credential store.
//!
//! Backs tests and short-lived hosts. A single instance is shared (it is
//! cheaply cloneable) across coordinators to model same-origin storage
//! visible to several application instances at once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;

use super::{CredentialStore, StoredCredentials, CLEAR_ORDER};

#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    keys: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryCredentialStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned lock only means a panic elsewhere; the map itself is
        // still coherent string data.
        self.keys.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn write(&self, creds: &StoredCredentials) -> Result<()> {
        let mut keys = self.lock();
        for (key, value) in creds.to_pairs() {
            match value {
                Some(value) => {
                    keys.insert(key.to_string(), value);
                }
                None => {
                    keys.remove(key);
                }
            }
        }
        Ok(())
    }

    fn read(&self) -> StoredCredentials {
        let keys = self.lock();
        StoredCredentials::from_lookup(|key| keys.get(key).cloned())
    }

    fn clear(&self) {
        let mut keys = self.lock();
        for key in CLEAR_ORDER {
            keys.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn shared_clones_see_the_same_keys() {
        let store = MemoryCredentialStore::new();
        let other_instance = store.clone();

        store
            .write(&StoredCredentials {
                access_token: Some("a".into()),
                refresh_token: None,
                access_expiry_at: Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
                refresh_expiry_at: None,
                remember_me: false,
            })
            .unwrap();

        assert_eq!(other_instance.read().access_token.as_deref(), Some("a"));
        other_instance.clear();
        assert!(store.read().is_empty());
    }
}
