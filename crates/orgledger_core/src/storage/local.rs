//! Directory-backed image store.

use super::{ImageStore, StorageError, StorageResult};
use crate::config::StorageConfig;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use uuid::Uuid;

static EXTENSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.([A-Za-z0-9]{1,10})$").expect("valid extension regex"));
static STORED_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\.[a-z0-9]{1,10}$")
        .expect("valid stored name regex")
});

/// Writes images as `<uuid>.<ext>` under one directory.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    root: PathBuf,
    public_prefix: String,
    max_bytes: u64,
    allowed_extensions: Vec<String>,
}

impl LocalImageStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: config.upload_dir.clone(),
            public_prefix: config.public_prefix.trim_end_matches('/').to_string(),
            max_bytes: config.max_image_bytes,
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn extension_of(&self, original_name: &str) -> StorageResult<String> {
        let ext = EXTENSION_RE
            .captures(original_name.trim())
            .and_then(|caps| caps.get(1))
            .map(|found| found.as_str().to_ascii_lowercase())
            .ok_or_else(|| StorageError::UnsupportedExtension(String::new()))?;
        if !self.allowed_extensions.contains(&ext) {
            return Err(StorageError::UnsupportedExtension(ext));
        }
        Ok(ext)
    }

    fn resolve(&self, reference: &str) -> StorageResult<PathBuf> {
        let name = reference
            .strip_prefix(&self.public_prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|name| STORED_NAME_RE.is_match(name))
            .ok_or_else(|| StorageError::InvalidReference(reference.to_string()))?;
        Ok(self.root.join(name))
    }
}

impl ImageStore for LocalImageStore {
    fn store(&self, original_name: &str, bytes: &[u8]) -> StorageResult<String> {
        if bytes.is_empty() {
            return Err(StorageError::Empty);
        }
        let size = bytes.len() as u64;
        if size > self.max_bytes {
            return Err(StorageError::TooLarge {
                size,
                max: self.max_bytes,
            });
        }
        let ext = self.extension_of(original_name)?;

        std::fs::create_dir_all(&self.root)?;
        let name = format!("{}.{ext}", Uuid::new_v4());
        std::fs::write(self.root.join(&name), bytes)?;
        info!(
            "event=image_store module=storage status=ok bytes={} ext={}",
            size, ext
        );
        Ok(format!("{}/{name}", self.public_prefix))
    }

    fn delete(&self, reference: &str) -> StorageResult<()> {
        let path = self.resolve(reference)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!("event=image_delete module=storage status=ok");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!("event=image_delete module=storage status=missing");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
