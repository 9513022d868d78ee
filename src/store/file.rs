//! File-backed credential store: one file per session key under a
//! directory, values stored as plain strings.

use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

use super::{CredentialStore, StoredCredentials, CLEAR_ORDER};

/// Directory name under the platform config dir used by
/// [`FileCredentialStore::default_location`].
const APP_DIR: &str = "sessionguard";

/// Credential store persisting each key as its own file.
///
/// Key files are created/removed individually so another process watching
/// the directory observes the same key granularity the in-memory layout
/// has, and so `clear` can honor the tokens-first removal order.
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Store rooted in the platform config directory.
    pub fn default_location() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(Self::new(config_dir.join(APP_DIR)))
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn read_key(&self, key: &str) -> Option<String> {
        match std::fs::read_to_string(self.key_path(key)) {
            Ok(value) => Some(value),
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    warn!(key, error = %e, "Failed to read credential key");
                }
                None
            }
        }
    }

    fn remove_key(&self, key: &str) {
        if let Err(e) = std::fs::remove_file(self.key_path(key)) {
            if e.kind() != ErrorKind::NotFound {
                warn!(key, error = %e, "Failed to remove credential key");
            }
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn write(&self, creds: &StoredCredentials) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .context("Failed to create credential store directory")?;
        for (key, value) in creds.to_pairs() {
            match value {
                Some(value) => std::fs::write(self.key_path(key), value)
                    .with_context(|| format!("Failed to write credential key {key}"))?,
                None => self.remove_key(key),
            }
        }
        Ok(())
    }

    fn read(&self) -> StoredCredentials {
        StoredCredentials::from_lookup(|key| self.read_key(key))
    }

    fn clear(&self) {
        for key in CLEAR_ORDER {
            self.remove_key(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KEY_ACCESS_EXPIRY, KEY_ACCESS_TOKEN};
    use chrono::{TimeZone, Utc};

    fn temp_store() -> (tempfile::TempDir, FileCredentialStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileCredentialStore::new(dir.path().join("creds"));
        (dir, store)
    }

    #[test]
    fn read_on_missing_directory_is_empty() {
        let (_dir, store) = temp_store();
        assert!(store.read().is_empty());
    }

    #[test]
    fn write_read_clear_round_trip() {
        let (_dir, store) = temp_store();
        let creds = StoredCredentials {
            access_token: Some("access".into()),
            refresh_token: Some("refresh".into()),
            access_expiry_at: Some(Utc.timestamp_opt(1_700_000_100, 0).unwrap()),
            refresh_expiry_at: Some(Utc.timestamp_opt(1_702_000_000, 0).unwrap()),
            remember_me: true,
        };
        store.write(&creds).unwrap();
        assert_eq!(store.read(), creds);

        store.clear();
        assert!(store.read().is_empty());
        // Clearing an already-empty store is a no-op.
        store.clear();
        assert!(store.read().is_empty());
    }

    #[test]
    fn rewrite_removes_dropped_keys() {
        let (_dir, store) = temp_store();
        store
            .write(&StoredCredentials {
                access_token: Some("a".into()),
                refresh_token: Some("r".into()),
                access_expiry_at: Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
                refresh_expiry_at: Some(Utc.timestamp_opt(1_701_000_000, 0).unwrap()),
                remember_me: true,
            })
            .unwrap();

        let slimmer = StoredCredentials {
            access_token: Some("a2".into()),
            refresh_token: None,
            access_expiry_at: Some(Utc.timestamp_opt(1_700_000_500, 0).unwrap()),
            refresh_expiry_at: None,
            remember_me: false,
        };
        store.write(&slimmer).unwrap();
        assert_eq!(store.read(), slimmer);
    }

    #[test]
    fn corrupt_expiry_file_reads_as_absent() {
        let (_dir, store) = temp_store();
        std::fs::create_dir_all(&store.dir).unwrap();
        std::fs::write(store.key_path(KEY_ACCESS_TOKEN), "tok").unwrap();
        std::fs::write(store.key_path(KEY_ACCESS_EXPIRY), "garbage").unwrap();

        let creds = store.read();
        assert_eq!(creds.access_token.as_deref(), Some("tok"));
        assert_eq!(creds.access_expiry_at, None);
    }
}
