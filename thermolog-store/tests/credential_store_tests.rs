//! Credential store durability and replacement semantics.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thermolog_core::Credential;
use thermolog_fetch::{KeychainApi, KeychainError};
use thermolog_store::{CredentialStore, FileCredentialStore, KeychainCredentialStore};

/// Keychain double backed by a map.
#[derive(Default)]
struct MapKeychain {
    entries: Mutex<HashMap<(String, String), String>>,
}

#[async_trait]
impl KeychainApi for MapKeychain {
    async fn get(&self, service: &str, account: &str) -> Result<Option<String>, KeychainError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.get(&(service.to_string(), account.to_string())).cloned())
    }

    async fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), KeychainError> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert((service.to_string(), account.to_string()), secret.to_string());
        Ok(())
    }

    async fn delete(&self, service: &str, account: &str) -> Result<(), KeychainError> {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(&(service.to_string(), account.to_string()));
        Ok(())
    }
}

fn cred(token: &str) -> Credential {
    Credential::new(token, "user.77").unwrap()
}

#[tokio::test]
async fn test_file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("credential.json");

    FileCredentialStore::new(&path)
        .update(&cred("token-before-restart"))
        .await
        .unwrap();

    let reopened = FileCredentialStore::new(&path);
    let current = reopened.current().await.unwrap().unwrap();
    assert_eq!(current.token, "token-before-restart");
    assert_eq!(current.account_id, "user.77");
}

#[tokio::test]
async fn test_file_store_newer_token_wins() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCredentialStore::new(dir.path().join("credential.json"));

    store.update(&cred("first-token-aaaa")).await.unwrap();
    store.update(&cred("second-token-bbbb")).await.unwrap();

    assert_eq!(store.current().await.unwrap().unwrap().token, "second-token-bbbb");
}

#[tokio::test]
async fn test_file_store_clear() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credential.json");
    let store = FileCredentialStore::new(&path);

    store.update(&cred("token-to-clear")).await.unwrap();
    store.clear().await.unwrap();

    assert!(store.current().await.unwrap().is_none());
    assert!(!path.exists());
    // Clearing twice is fine.
    store.clear().await.unwrap();
}

#[tokio::test]
async fn test_file_store_empty_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCredentialStore::new(dir.path().join("never-written.json"));
    assert!(store.current().await.unwrap().is_none());
}

#[tokio::test]
async fn test_file_store_clear_if_token_spares_newer() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCredentialStore::new(dir.path().join("credential.json"));

    store.update(&cred("rejected-token-1")).await.unwrap();
    store.update(&cred("fresh-token-2222")).await.unwrap();

    assert!(!store.clear_if_token("rejected-token-1").await.unwrap());
    assert_eq!(store.current().await.unwrap().unwrap().token, "fresh-token-2222");

    assert!(store.clear_if_token("fresh-token-2222").await.unwrap());
    assert!(store.current().await.unwrap().is_none());
}

#[tokio::test]
async fn test_keychain_store_roundtrip() {
    let keychain = Arc::new(MapKeychain::default());
    let store = KeychainCredentialStore::new(keychain.clone());

    store.update(&cred("keychain-token-1")).await.unwrap();
    assert_eq!(store.current().await.unwrap().unwrap().token, "keychain-token-1");

    // A second store over the same keychain sees it.
    let other = KeychainCredentialStore::new(keychain);
    assert!(other.current().await.unwrap().is_some());

    assert!(other.clear_if_token("keychain-token-1").await.unwrap());
    assert!(store.current().await.unwrap().is_none());
}
