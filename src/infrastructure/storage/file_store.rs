use crate::application::ports::key_value_store::KeyValueStore;
use crate::shared::error::{AppError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File-backed store: one file per key under a data directory. The default
/// durable store for hosts without a native key-value primitive.
///
/// Keys are percent-encoded into filenames so arbitrary strings (URLs
/// included) round-trip through the filesystem.
pub struct FileKeyValueStore {
    root: PathBuf,
}

impl FileKeyValueStore {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", encode_key(key)))
    }
}

fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'-' => {
                encoded.push(byte as char);
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

fn decode_key(encoded: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(encoded.len());
    let mut chars = encoded.bytes();
    while let Some(byte) = chars.next() {
        if byte == b'%' {
            let hi = chars.next()?;
            let lo = chars.next()?;
            let hex = [hi, lo];
            let hex = std::str::from_utf8(&hex).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
        } else {
            bytes.push(byte);
        }
    }
    String::from_utf8(bytes).ok()
}

fn key_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    decode_key(stem)
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(AppError::Storage(err.to_string())),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        // Write-then-rename so a committed value is never half on disk.
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AppError::Storage(err.to_string())),
        }
    }

    async fn multi_get(&self, keys: &[&str]) -> Result<Vec<(String, Option<String>)>> {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            results.push((key.to_string(), self.get_item(key).await?));
        }
        Ok(results)
    }

    async fn multi_set(&self, pairs: &[(&str, String)]) -> Result<()> {
        for (key, value) in pairs {
            self.set_item(key, value).await?;
        }
        Ok(())
    }

    async fn multi_remove(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.remove_item(key).await?;
        }
        Ok(())
    }

    async fn get_all_keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match key_from_path(&path) {
                Some(key) => keys.push(key),
                None => debug!(?path, "skipping undecodable store file"),
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_encoding_round_trips_urls() {
        let key = "image_cache_https://cdn.example.com/a b.png?v=1";
        let encoded = encode_key(key);
        assert!(!encoded.contains('/'));
        assert!(!encoded.contains(' '));
        assert_eq!(decode_key(&encoded).as_deref(), Some(key));
    }

    #[tokio::test]
    async fn set_get_remove_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyValueStore::new(dir.path()).await.unwrap();

        store.set_item("news_cache", "[]").await.unwrap();
        assert_eq!(
            store.get_item("news_cache").await.unwrap().as_deref(),
            Some("[]")
        );

        let keys = store.get_all_keys().await.unwrap();
        assert_eq!(keys, vec!["news_cache".to_string()]);

        store.remove_item("news_cache").await.unwrap();
        assert_eq!(store.get_item("news_cache").await.unwrap(), None);
        // Removing a missing key is not an error.
        store.remove_item("news_cache").await.unwrap();
    }

    #[tokio::test]
    async fn multi_get_reports_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyValueStore::new(dir.path()).await.unwrap();
        store.set_item("user", "{}").await.unwrap();

        let pairs = store.multi_get(&["user", "authToken"]).await.unwrap();
        assert_eq!(pairs[0].1.as_deref(), Some("{}"));
        assert_eq!(pairs[1].1, None);
    }
}
