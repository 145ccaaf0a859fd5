//! Filesystem-backed storage.
//!
//! Each area is a directory named `<prefix><uuid>` under a root directory
//! (the OS temp dir by default). Each key maps to one regular file in that
//! directory. File names percent-encode `%`, `/`, `\` and a leading `.`, so a
//! key can never name a subdirectory or a hidden file.
//!
//! Writes land in a hidden staging file first and are renamed over the entry.
//! A reader racing a writer sees the old value or the new one, never a mix.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use sim_runtime_common::{SimError, StorageConfig};

use super::{StorageArea, StorageBackend};

/// Allocates one temporary directory per resource instance.
#[derive(Debug, Clone)]
pub struct FsBackend {
    root: PathBuf,
    prefix: String,
}

impl FsBackend {
    /// Create a backend that allocates `<root>/<prefix><uuid>` directories.
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
        }
    }

    /// Create a backend from storage configuration.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.root_dir(), config.dir_prefix.clone())
    }

}

#[async_trait]
impl StorageBackend for FsBackend {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    async fn allocate(&self, resource_id: &str) -> Result<Arc<dyn StorageArea>, SimError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| SimError::backend_io("allocate", self.root.display().to_string(), e))?;

        // `create_dir` refuses an existing path, so a name clash surfaces as
        // an error instead of two resources sharing one directory.
        let path = self
            .root
            .join(format!("{}{}", self.prefix, Uuid::new_v4().simple()));
        tokio::fs::create_dir(&path)
            .await
            .map_err(|e| SimError::backend_io("allocate", path.display().to_string(), e))?;

        debug!(resource_id, path = %path.display(), "Allocated filesystem storage area");

        Ok(Arc::new(FsArea { path }))
    }
}

/// A directory holding one resource's objects.
#[derive(Debug)]
pub struct FsArea {
    path: PathBuf,
}

impl FsArea {
    fn entry(&self, key: &str) -> PathBuf {
        self.path.join(encode_key(key))
    }

    fn staging(&self) -> PathBuf {
        self.path
            .join(format!(".staging-{}", Uuid::new_v4().simple()))
    }

    fn io_error(&self, operation: &'static str, key: &str, source: io::Error) -> SimError {
        SimError::backend_io(operation, self.entry(key).display().to_string(), source)
    }
}

#[async_trait]
impl StorageArea for FsArea {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), SimError> {
        let staging = self.staging();
        tokio::fs::write(&staging, value)
            .await
            .map_err(|e| self.io_error("write", key, e))?;

        if let Err(e) = tokio::fs::rename(&staging, self.entry(key)).await {
            if let Err(cleanup) = tokio::fs::remove_file(&staging).await {
                debug!(path = %staging.display(), error = %cleanup, "Staging file left behind");
            }
            return Err(self.io_error("write", key, e));
        }
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, SimError> {
        match tokio::fs::read(self.entry(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error("read", key, e)),
        }
    }

    async fn list(&self) -> Result<Vec<String>, SimError> {
        let mut entries = tokio::fs::read_dir(&self.path)
            .await
            .map_err(|e| SimError::backend_io("list", self.location(), e))?;

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SimError::backend_io("list", self.location(), e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| SimError::backend_io("list", self.location(), e))?;
            if !file_type.is_file() {
                continue;
            }
            // Hidden names are staging files; undecodable names are not ours.
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            if let Some(key) = decode_name(&name) {
                keys.push(key);
            }
        }

        Ok(keys)
    }

    async fn remove(&self, key: &str) -> Result<bool, SimError> {
        match tokio::fs::remove_file(self.entry(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.io_error("remove", key, e)),
        }
    }

    async fn contains(&self, key: &str) -> Result<bool, SimError> {
        match tokio::fs::metadata(self.entry(key)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.io_error("stat", key, e)),
        }
    }

    async fn destroy(&self) -> Result<(), SimError> {
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Removed filesystem storage area");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SimError::backend_io("destroy", self.location(), e)),
        }
    }
}

/// File name for `key`.
fn encode_key(key: &str) -> String {
    let mut name = String::with_capacity(key.len());
    for (i, c) in key.char_indices() {
        match c {
            '%' => name.push_str("%25"),
            '/' => name.push_str("%2F"),
            '\\' => name.push_str("%5C"),
            '.' if i == 0 => name.push_str("%2E"),
            c => name.push(c),
        }
    }
    name
}

/// Key stored under file `name`, or `None` if `name` is not an encoded key.
fn decode_name(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}
