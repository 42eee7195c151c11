//! Secure storage contract
//!
//! The core treats stored bytes as opaque: key handles encrypt before
//! calling [`SecureStorage::store`] and decrypt after
//! [`SecureStorage::retrieve`]. Platform keychains implement the trait
//! outside this crate; two backends ship here:
//!
//! - **MemoryStorage**: in-memory map (testing, ephemeral sessions)
//! - **FileSystemStorage**: one file per id under a base directory

use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use zeroize::Zeroizing;

/// Get/set contract for persisted ciphertext
#[async_trait]
pub trait SecureStorage: Send + Sync {
    /// Store ciphertext under `id`, replacing any previous value
    async fn store(&self, id: &str, ciphertext: &[u8]) -> Result<()>;

    /// Ciphertext for `id`, or `None` when absent
    async fn retrieve(&self, id: &str) -> Result<Option<Vec<u8>>>;

    /// Remove `id`; `true` if something was removed
    async fn remove(&self, id: &str) -> Result<bool>;

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.retrieve(id).await?.is_some())
    }
}

/// In-memory store
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: Arc<RwLock<HashMap<String, Zeroizing<Vec<u8>>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SecureStorage for MemoryStorage {
    async fn store(&self, id: &str, ciphertext: &[u8]) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(id.to_string(), Zeroizing::new(ciphertext.to_vec()));
        Ok(())
    }

    async fn retrieve(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().await;
        Ok(entries.get(id).map(|bytes| bytes.to_vec()))
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;
        Ok(entries.remove(id).is_some())
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.entries.read().await.contains_key(id))
    }
}

/// File system store, one `<id>.key` file per entry
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    base_path: PathBuf,
}

impl FileSystemStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        if !base_path.exists() {
            std::fs::create_dir_all(&base_path)?;
        }
        Ok(Self { base_path })
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        // No path traversal out of the base directory
        let safe_id = id.replace(['/', '\\', '.', '~'], "_");
        self.base_path.join(format!("{}.key", safe_id))
    }
}

#[async_trait]
impl SecureStorage for FileSystemStorage {
    async fn store(&self, id: &str, ciphertext: &[u8]) -> Result<()> {
        let path = self.entry_path(id);
        tokio::fs::write(&path, ciphertext).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&path, perms).await?;
        }

        Ok(())
    }

    async fn retrieve(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(id);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let path = self.entry_path(id);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(false);
        }
        // Overwrite with zeros before unlinking
        let size = tokio::fs::metadata(&path).await?.len() as usize;
        tokio::fs::write(&path, vec![0u8; size]).await?;
        tokio::fs::remove_file(&path).await?;
        Ok(true)
    }
}
