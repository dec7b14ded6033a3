// Asset loading functionality

use super::format::{ClipDocument, ModelDocument};
use super::{AssetError, AssetSource};
use log::debug;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Asset loader responsible for resolving and decoding asset files
#[derive(Debug, Clone)]
pub struct AssetLoader<S> {
    source: S,
    base_path: PathBuf,
}

impl<S: AssetSource> AssetLoader<S> {
    /// Create a new asset loader reading from `source` relative to `base_path`
    pub fn new<P: AsRef<Path>>(source: S, base_path: P) -> Self {
        Self {
            source,
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Get the full path for an asset
    pub fn resolve_path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.base_path.join(name)
    }

    /// Load asset bytes
    pub async fn load_bytes(&self, name: impl AsRef<Path>) -> Result<Vec<u8>, AssetError> {
        let path = self.resolve_path(name);
        debug!("Loading asset {}", path.display());
        self.source.read(&path).await
    }

    /// Load and decode a model document
    pub async fn load_model(&self, name: impl AsRef<Path>) -> Result<ModelDocument, AssetError> {
        let path = self.resolve_path(name.as_ref());
        let bytes = self.load_bytes(name).await?;
        decode(&bytes, &path)
    }

    /// Load and decode a clip document.
    ///
    /// Fails with [`AssetError::NoAnimationTrack`] when the file carries no
    /// keyframed animation.
    pub async fn load_clips(&self, name: impl AsRef<Path>) -> Result<ClipDocument, AssetError> {
        let path = self.resolve_path(name.as_ref());
        let bytes = self.load_bytes(name).await?;
        let document: ClipDocument = decode(&bytes, &path)?;

        if !document.animations.iter().any(|anim| anim.has_tracks()) {
            return Err(AssetError::NoAnimationTrack(
                path.to_string_lossy().to_string(),
            ));
        }

        Ok(document)
    }

    /// Get the base path
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get the underlying source
    pub fn source(&self) -> &S {
        &self.source
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8], path: &Path) -> Result<T, AssetError> {
    serde_json::from_slice(bytes).map_err(|e| AssetError::Decode {
        path: path.to_string_lossy().to_string(),
        message: e.to_string(),
    })
}
