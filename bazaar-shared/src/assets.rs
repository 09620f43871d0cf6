/// Binary asset storage (avatars)
///
/// [`AssetStore`] uploads opaque bytes into a folder and returns an id plus a
/// public URL; the credential service only stores that reference.
///
/// - [`LocalAssetStore`]: files under a root directory, served from a base URL
/// - [`MemoryAssetStore`]: process memory (tests)

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Largest accepted upload (5 MiB)
pub const MAX_ASSET_BYTES: usize = 5 * 1024 * 1024;

/// Asset store errors
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// Upload is unacceptable (empty, too large, bad id)
    #[error("{0}")]
    Rejected(String),

    /// Storage backend failed
    #[error("Asset storage error: {0}")]
    Storage(String),
}

/// Reference to a stored asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    /// Store-specific identifier, `{folder}/{uuid}`
    pub asset_id: String,

    pub url: String,
}

/// Asset upload contract
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>, folder: &str) -> Result<AssetRef, AssetError>;

    /// Removes an asset; unknown ids are not an error
    async fn delete(&self, asset_id: &str) -> Result<(), AssetError>;
}

fn check_upload(bytes: &[u8]) -> Result<(), AssetError> {
    if bytes.is_empty() {
        return Err(AssetError::Rejected("Image is empty".to_string()));
    }
    if bytes.len() > MAX_ASSET_BYTES {
        return Err(AssetError::Rejected(format!(
            "Image exceeds {} bytes",
            MAX_ASSET_BYTES
        )));
    }
    Ok(())
}

/// Only plain relative paths may name an asset
fn safe_relative(asset_id: &str) -> Result<&Path, AssetError> {
    let path = Path::new(asset_id);
    if asset_id.is_empty() || !path.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(AssetError::Rejected(format!("Invalid asset id: {}", asset_id)));
    }
    Ok(path)
}

/// Stores assets as files on local disk
#[derive(Debug, Clone)]
pub struct LocalAssetStore {
    root: PathBuf,
    public_url: String,
}

impl LocalAssetStore {
    /// # Arguments
    ///
    /// * `root` - Directory assets are written under
    /// * `public_url` - Base URL the directory is served from
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    async fn upload(&self, bytes: Vec<u8>, folder: &str) -> Result<AssetRef, AssetError> {
        check_upload(&bytes)?;

        let asset_id = format!("{}/{}", folder, Uuid::new_v4());
        let path = self.root.join(safe_relative(&asset_id)?);

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| AssetError::Storage(e.to_string()))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| AssetError::Storage(e.to_string()))?;

        tracing::debug!(asset_id = %asset_id, size = bytes.len(), "Asset stored");

        Ok(AssetRef {
            url: format!("{}/{}", self.public_url, asset_id),
            asset_id,
        })
    }

    async fn delete(&self, asset_id: &str) -> Result<(), AssetError> {
        let path = self.root.join(safe_relative(asset_id)?);

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AssetError::Storage(e.to_string())),
        }
    }
}

/// Keeps assets in memory
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    assets: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, asset_id: &str) -> bool {
        self.assets.read().await.contains_key(asset_id)
    }

    pub async fn len(&self) -> usize {
        self.assets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.assets.read().await.is_empty()
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn upload(&self, bytes: Vec<u8>, folder: &str) -> Result<AssetRef, AssetError> {
        check_upload(&bytes)?;

        let asset_id = format!("{}/{}", folder, Uuid::new_v4());
        self.assets.write().await.insert(asset_id.clone(), bytes);

        Ok(AssetRef {
            url: format!("memory://{}", asset_id),
            asset_id,
        })
    }

    async fn delete(&self, asset_id: &str) -> Result<(), AssetError> {
        self.assets.write().await.remove(asset_id);
        Ok(())
    }
}
