//! File-backed resource loader
//!
//! Resolves keys as file paths (optionally relative to a root directory)
//! and reads the whole file into memory. A fully read file is fully
//! buffered, so its handle reports `HaveEnoughData` until released.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::debug;

use super::error::LoadError;
use super::key::ResourceKey;
use super::traits::{MediaHandle, ReadyState, ResourceLoader, TimeRange};

/// Loader reading local media files
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    root: Option<PathBuf>,
}

impl FileLoader {
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Resolve relative keys against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: Some(root.into()) }
    }

    /// Map a key to a path on disk
    pub fn resolve(&self, key: &ResourceKey) -> PathBuf {
        let path = Path::new(key.as_str());
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ResourceLoader for FileLoader {
    fn load(&self, key: &ResourceKey) -> Result<Arc<dyn MediaHandle>, LoadError> {
        let path = self.resolve(key);
        let bytes = std::fs::read(&path)?;
        if bytes.is_empty() {
            return Err(LoadError::Decode(format!("{} is empty", path.display())));
        }
        debug!("Loaded {} ({} bytes)", path.display(), bytes.len());
        Ok(Arc::new(FileHandle::new(path, bytes)))
    }
}

/// In-memory copy of a media file
#[derive(Debug)]
pub struct FileHandle {
    path: PathBuf,
    data: Mutex<Option<Vec<u8>>>,
}

impl FileHandle {
    pub fn new(path: PathBuf, bytes: Vec<u8>) -> Self {
        Self {
            path,
            data: Mutex::new(Some(bytes)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_released(&self) -> bool {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).is_none()
    }

    /// Run `f` over the payload; `None` once released.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
        let data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        data.as_deref().map(f)
    }
}

impl MediaHandle for FileHandle {
    fn buffered(&self) -> Vec<TimeRange> {
        if self.is_released() {
            Vec::new()
        } else {
            vec![TimeRange::everything()]
        }
    }

    fn ready_state(&self) -> ReadyState {
        if self.is_released() {
            ReadyState::HaveNothing
        } else {
            ReadyState::HaveEnoughData
        }
    }

    fn size_hint(&self) -> Option<u64> {
        self.with_bytes(|b| b.len() as u64)
    }

    fn release(&self) {
        if self.data.lock().unwrap_or_else(|e| e.into_inner()).take().is_some() {
            debug!("Released {}", self.path.display());
        }
    }
}
