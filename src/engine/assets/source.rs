// Byte sources that assets are read from

use super::AssetError;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Something that can asynchronously produce the bytes of an asset
pub trait AssetSource {
    /// Read the full contents of the asset at `path`
    fn read(&self, path: &Path) -> impl Future<Output = Result<Vec<u8>, AssetError>>;
}

impl<S: AssetSource + ?Sized> AssetSource for &S {
    fn read(&self, path: &Path) -> impl Future<Output = Result<Vec<u8>, AssetError>> {
        (**self).read(path)
    }
}

impl<S: AssetSource + ?Sized> AssetSource for Rc<S> {
    fn read(&self, path: &Path) -> impl Future<Output = Result<Vec<u8>, AssetError>> {
        (**self).read(path)
    }
}

/// Reads assets from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource;

impl AssetSource for FileSource {
    async fn read(&self, path: &Path) -> Result<Vec<u8>, AssetError> {
        if !path.exists() {
            return Err(AssetError::NotFound(path.to_string_lossy().to_string()));
        }

        Ok(std::fs::read(path)?)
    }
}

/// Serves assets from memory, keyed by path
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: HashMap<PathBuf, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add raw bytes under a path
    pub fn insert(&mut self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), bytes.into());
    }

    /// Add a value serialized as JSON under a path
    pub fn insert_json<T: Serialize>(
        &mut self,
        path: impl Into<PathBuf>,
        value: &T,
    ) -> Result<(), AssetError> {
        let path = path.into();
        let bytes = serde_json::to_vec(value).map_err(|e| AssetError::Decode {
            path: path.to_string_lossy().to_string(),
            message: e.to_string(),
        })?;
        self.files.insert(path, bytes);
        Ok(())
    }

    /// Remove an asset, returning whether it existed
    pub fn remove(&mut self, path: &Path) -> bool {
        self.files.remove(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl AssetSource for MemorySource {
    async fn read(&self, path: &Path) -> Result<Vec<u8>, AssetError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(path.to_string_lossy().to_string()))
    }
}
