//! Image discovery for batch screening.

use std::path::{Path, PathBuf};

use crate::error::{Result, ScreeningError};

/// Extensions picked up by default.
pub const DEFAULT_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Finds fundus photographs in a directory tree.
pub struct ImageDiscovery {
    /// Whether to scan recursively.
    recursive: bool,

    /// Accepted extensions, lower case.
    extensions: Vec<String>,

    /// Maximum depth for recursive scanning (None = unlimited).
    max_depth: Option<usize>,
}

impl Default for ImageDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageDiscovery {
    /// Create a discovery accepting the default extensions.
    pub fn new() -> Self {
        Self {
            recursive: false,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            max_depth: None,
        }
    }

    /// Enable recursive scanning.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Set maximum depth for recursive scanning.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Replace the accepted extensions.
    pub fn extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_lowercase()).collect();
        self
    }

    /// Discover images in the given directory, sorted by path.
    pub fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(ScreeningError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Directory not found: {}", dir.display()),
            )));
        }

        let mut files = Vec::new();
        self.discover_recursive(dir, 0, &mut files)?;
        files.sort();
        Ok(files)
    }

    fn discover_recursive(&self, dir: &Path, depth: usize, files: &mut Vec<PathBuf>) -> Result<()> {
        if self.max_depth.is_some_and(|max| depth > max) {
            return Ok(());
        }

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let Ok(metadata) = std::fs::symlink_metadata(&path) else {
                continue;
            };

            if metadata.is_dir() {
                if self.recursive {
                    self.discover_recursive(&path, depth + 1, files)?;
                }
            } else if metadata.is_file() && self.matches(&path) {
                files.push(path);
            }
        }

        Ok(())
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|e| *e == ext))
    }
}
