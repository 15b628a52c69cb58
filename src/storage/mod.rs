//! Storage collaborator for annotated bitmaps.
//!
//! The pipeline only depends on `ImageStore`; `LocalImageStore` keeps objects in
//! a directory named after the configured bucket.

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::codec::encode_png;
use crate::error::{Result, ScreeningError};

/// Object storage used for annotated bitmaps.
pub trait ImageStore: Send + Sync {
    /// Persist an image under `file_name` and return its URL.
    fn upload_image(&self, image: &RgbImage, file_name: &str) -> Result<String>;

    /// Retrieval URL for a stored image.
    fn generate_presigned_url(&self, file_name: &str) -> Result<String>;

    /// Remove a stored image; `Ok(false)` if it did not exist.
    fn delete_image(&self, file_name: &str) -> Result<bool>;
}

/// Filesystem-backed store returning `file://` URLs.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    root: PathBuf,
}

impl LocalImageStore {
    /// Create the store, creating its root directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            ScreeningError::Storage(format!(
                "Failed to create storage root {}: {}",
                root.display(),
                e
            ))
        })?;
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    /// Storage root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, file_name: &str) -> Result<PathBuf> {
        if file_name.is_empty() || sanitize_filename(file_name) != file_name {
            return Err(ScreeningError::Storage(format!(
                "Invalid object name: {file_name:?}"
            )));
        }
        Ok(self.root.join(file_name))
    }
}

impl ImageStore for LocalImageStore {
    fn upload_image(&self, image: &RgbImage, file_name: &str) -> Result<String> {
        let path = self.object_path(file_name)?;
        let png = encode_png(image)?;

        // Readers only ever see complete objects under the final name.
        let partial = self.root.join(format!("{file_name}.part"));
        let written = fs::write(&partial, &png).and_then(|()| fs::rename(&partial, &path));
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&partial) {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Failed to remove {}: {}", partial.display(), cleanup);
                }
            }
            return Err(ScreeningError::Storage(format!(
                "Failed to write {}: {}",
                path.display(),
                e
            )));
        }

        log::debug!("Stored {} ({} bytes)", path.display(), png.len());
        Ok(file_url(&path))
    }

    fn generate_presigned_url(&self, file_name: &str) -> Result<String> {
        let path = self.object_path(file_name)?;
        let canonical = path.canonicalize().map_err(|_| {
            ScreeningError::Storage(format!("Object not found: {file_name}"))
        })?;
        if !canonical.starts_with(&self.root) {
            return Err(ScreeningError::Storage(
                "Object resolves outside the storage root".into(),
            ));
        }
        Ok(file_url(&canonical))
    }

    fn delete_image(&self, file_name: &str) -> Result<bool> {
        let path = self.object_path(file_name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ScreeningError::Storage(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// Keep ASCII alphanumerics and `-`, `_`, `.`; anything else becomes `_`.
fn sanitize_filename(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.starts_with('.') {
        cleaned.replacen('.', "_", 1)
    } else {
        cleaned
    }
}
