//! Byte storage for file content.
//!
//! Content is addressed by an opaque [`StorageKey`] that the catalog records
//! alongside each file version. Keys are never reused: replacing a file's
//! content writes a new key, so older versions stay readable.

use bytes::Bytes;
use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// Opaque reference to a blob in a [`ByteStore`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    /// Generate a fresh, globally unique key.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for StorageKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Hex SHA-256 of `data`, used as the content checksum recorded in the catalog.
pub fn content_checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Stores and retrieves file content.
pub trait ByteStore: Send + Sync {
    /// Read the full blob. Missing keys yield [`StoreError::NotFound`].
    fn read<'a>(&'a self, key: &'a StorageKey) -> BoxFuture<'a, StoreResult<Bytes>>;

    /// Write a blob, replacing any previous content under the same key.
    fn write<'a>(&'a self, key: &'a StorageKey, data: Bytes) -> BoxFuture<'a, StoreResult<()>>;

    /// Delete a blob. Deleting a missing key is not an error.
    fn delete<'a>(&'a self, key: &'a StorageKey) -> BoxFuture<'a, StoreResult<()>>;
}

/// Volatile byte store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryByteStore {
    blobs: DashMap<StorageKey, Bytes>,
}

impl MemoryByteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl ByteStore for MemoryByteStore {
    fn read<'a>(&'a self, key: &'a StorageKey) -> BoxFuture<'a, StoreResult<Bytes>> {
        Box::pin(async move {
            self.blobs
                .get(key)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| StoreError::not_found(format!("blob {key}")))
        })
    }

    fn write<'a>(&'a self, key: &'a StorageKey, data: Bytes) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            self.blobs.insert(key.clone(), data);
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a StorageKey) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            self.blobs.remove(key);
            Ok(())
        })
    }
}

/// Byte store keeping one file per key under a root directory.
#[derive(Debug, Clone)]
pub struct FsByteStore {
    root: PathBuf,
}

impl FsByteStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "Opened filesystem byte store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, key: &StorageKey) -> StoreResult<PathBuf> {
        let name = key.as_str();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(StoreError::invalid(format!("storage key '{name}'")));
        }
        Ok(self.root.join(name))
    }
}

impl ByteStore for FsByteStore {
    fn read<'a>(&'a self, key: &'a StorageKey) -> BoxFuture<'a, StoreResult<Bytes>> {
        Box::pin(async move {
            let path = self.blob_path(key)?;
            match tokio::fs::read(&path).await {
                Ok(data) => Ok(Bytes::from(data)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    Err(StoreError::not_found(format!("blob {key}")))
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    fn write<'a>(&'a self, key: &'a StorageKey, data: Bytes) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            let path = self.blob_path(key)?;
            debug!(key = %key, len = data.len(), "Writing blob");
            // Write to a sibling temp file, then rename over the target.
            let tmp = path.with_extension("partial");
            tokio::fs::write(&tmp, &data).await?;
            tokio::fs::rename(&tmp, &path).await?;
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a StorageKey) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            let path = self.blob_path(key)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }
}
