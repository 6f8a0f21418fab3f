//! Template subsystem.
//!
//! # Data Flow
//! ```text
//! TemplateDir::load(id)          file whose stem equals id
//!     → template text
//!     → renderer.rs               server template renders its locations
//!     → rendered configuration
//!
//! watcher.rs:
//!     location template directory changes → TemplateChanged event
//! ```

pub mod renderer;
pub mod watcher;

pub use renderer::TemplateRenderer;
pub use watcher::TemplateWatcher;

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors locating, reading or rendering templates.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("no template named `{id}` in {}", dir.display())]
    NotFound { id: String, dir: PathBuf },

    #[error("failed to read template `{id}` from {}: {source}", dir.display())]
    Io {
        id: String,
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render template `{name}`: {source}")]
    Render {
        name: String,
        #[source]
        source: minijinja::Error,
    },
}

/// A directory of templates addressed by file stem.
#[derive(Debug, Clone)]
pub struct TemplateDir {
    dir: PathBuf,
}

impl TemplateDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Read the template whose file name, extension stripped, is exactly `id`.
    pub fn load(&self, id: &str) -> Result<String, TemplateError> {
        let io_err = |source| TemplateError::Io {
            id: id.to_string(),
            dir: self.dir.clone(),
            source,
        };

        let mut candidates = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && path.file_stem().is_some_and(|stem| stem == id) {
                candidates.push(path);
            }
        }

        // Stable choice when several extensions share a stem.
        candidates.sort();
        let path = candidates.into_iter().next().ok_or_else(|| TemplateError::NotFound {
            id: id.to_string(),
            dir: self.dir.clone(),
        })?;

        fs::read_to_string(&path).map_err(io_err)
    }
}
