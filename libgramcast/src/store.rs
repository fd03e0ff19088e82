//! Session credential store
//!
//! One opaque credential blob per account, named `<identifier>.session`
//! under the session directory. Presence of the file is the sole source of
//! truth for "known account" at startup; [`SessionStore::load_all`]
//! reconciles the files with live connections.

use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::protocol::{with_timeout, ClientFactory};
use crate::registry::AccountRegistry;

const SESSION_EXT: &str = "session";

#[derive(Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Open the store, creating the session directory if needed.
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Path of the credential blob for one account
    pub fn session_path(&self, identifier: &str) -> PathBuf {
        self.dir.join(format!("{identifier}.{SESSION_EXT}"))
    }

    /// Identifiers of all persisted credentials, in sorted order
    pub fn identifiers(&self) -> Result<Vec<String>> {
        let mut identifiers = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SESSION_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                identifiers.push(stem.to_string());
            }
        }
        identifiers.sort();
        Ok(identifiers)
    }

    /// Reconcile on-disk credentials with live connections.
    ///
    /// Each credential gets a client, a connect attempt and an
    /// authorization check. Authorized clients land in the registry;
    /// unauthorized ones are disconnected and their file is left on disk
    /// untouched. A failure for one credential is logged and skipped, it
    /// never aborts the rest of the scan. Returns the number of accounts
    /// that came up.
    pub async fn load_all(
        &self,
        factory: &dyn ClientFactory,
        registry: &AccountRegistry,
    ) -> Result<usize> {
        let mut loaded = 0;
        for identifier in self.identifiers()? {
            let path = self.session_path(&identifier);
            let client = match factory.create(&path) {
                Ok(client) => client,
                Err(e) => {
                    warn!(account = %identifier, "failed to create client: {e}");
                    continue;
                }
            };
            match with_timeout(client.connect()).await {
                Ok(()) => {
                    if client.is_authorized().await {
                        info!(account = %identifier, "session connected");
                        registry.insert(identifier, client);
                        loaded += 1;
                    } else {
                        info!(account = %identifier, "stale session, skipping");
                        client.disconnect().await;
                    }
                }
                Err(e) => {
                    warn!(account = %identifier, "failed to connect session: {e}");
                }
            }
        }
        Ok(loaded)
    }

    /// Best-effort removal of one account.
    ///
    /// Disconnects and drops the live client if there is one, then deletes
    /// the credential file if present. Deletion errors are ignored; the
    /// contract is "best-effort remove", not "verified remove".
    pub async fn remove(&self, identifier: &str, registry: &AccountRegistry) {
        if let Some(client) = registry.remove(identifier) {
            client.disconnect().await;
        }
        let path = self.session_path(identifier);
        if path.exists() {
            if let Err(e) = fs::remove_file(&path) {
                debug!(account = %identifier, "could not delete credential file: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::mock::{MockConfig, MockFactory};
    use crate::protocol::ProtocolClient;
    use tempfile::TempDir;

    fn seed_session(store: &SessionStore, identifier: &str) {
        fs::write(store.session_path(identifier), b"opaque").unwrap();
    }

    fn authorized_config() -> MockConfig {
        MockConfig {
            authorized: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_identifiers_ignores_foreign_files() {
        let temp = TempDir::new().unwrap();
        let store = SessionStore::new(temp.path().to_path_buf()).unwrap();
        seed_session(&store, "111");
        seed_session(&store, "222");
        fs::write(temp.path().join("notes.txt"), b"x").unwrap();

        assert_eq!(store.identifiers().unwrap(), vec!["111", "222"]);
    }

    #[tokio::test]
    async fn test_load_all_skips_broken_credential() {
        let temp = TempDir::new().unwrap();
        let store = SessionStore::new(temp.path().to_path_buf()).unwrap();
        for id in ["111", "222", "333"] {
            seed_session(&store, id);
        }

        let factory = MockFactory::new(authorized_config());
        factory.set_override(
            "222",
            MockConfig {
                connect_succeeds: false,
                ..Default::default()
            },
        );

        let registry = AccountRegistry::new();
        let loaded = store.load_all(&factory, &registry).await.unwrap();

        assert_eq!(loaded, 2);
        assert_eq!(registry.identifiers(), vec!["111", "333"]);
        // The broken credential stays on disk.
        assert!(store.session_path("222").exists());
    }

    #[tokio::test]
    async fn test_load_all_leaves_stale_session_on_disk() {
        let temp = TempDir::new().unwrap();
        let store = SessionStore::new(temp.path().to_path_buf()).unwrap();
        seed_session(&store, "111");

        // Default mock config connects but is not authorized.
        let factory = MockFactory::default();
        let registry = AccountRegistry::new();
        let loaded = store.load_all(&factory, &registry).await.unwrap();

        assert_eq!(loaded, 0);
        assert!(registry.is_empty());
        assert!(store.session_path("111").exists());
        // The stale client was disconnected again.
        let client = factory.client("111").unwrap();
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_remove_deletes_file_and_registry_entry() {
        let temp = TempDir::new().unwrap();
        let store = SessionStore::new(temp.path().to_path_buf()).unwrap();
        seed_session(&store, "111");

        let factory = MockFactory::new(authorized_config());
        let registry = AccountRegistry::new();
        store.load_all(&factory, &registry).await.unwrap();
        assert!(registry.contains("111"));

        store.remove("111", &registry).await;
        assert!(!registry.contains("111"));
        assert!(!store.session_path("111").exists());
        assert!(!factory.client("111").unwrap().is_connected());
    }

    #[tokio::test]
    async fn test_remove_of_unknown_account_is_a_no_op() {
        let temp = TempDir::new().unwrap();
        let store = SessionStore::new(temp.path().to_path_buf()).unwrap();
        let registry = AccountRegistry::new();

        // No file, no registry entry: still succeeds, nothing changes.
        store.remove("404", &registry).await;
        assert!(registry.is_empty());
    }
}
