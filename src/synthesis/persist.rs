//! Atomic replacement of the generated configuration file.
//!
//! The content is written to a temporary file in the destination directory,
//! synced, then renamed over the destination. Readers see either the old or
//! the new file, never a partial one.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to move new content into {}: {source}", path.display())]
    Rename {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Replace `path` with `content`, creating parent directories as needed.
pub fn persist_atomic(path: &Path, content: &[u8]) -> Result<(), PersistError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    fs::create_dir_all(&dir).map_err(|source| PersistError::CreateDir {
        path: dir.clone(),
        source,
    })?;

    let write_err = |source| PersistError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(&dir).map_err(write_err)?;
    tmp.write_all(content).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;

    let permissions = fs::metadata(path)
        .map(|metadata| metadata.permissions())
        .ok()
        .or_else(default_permissions);
    if let Some(permissions) = permissions {
        tmp.as_file().set_permissions(permissions).map_err(write_err)?;
    }
    tmp.as_file().sync_all().map_err(write_err)?;

    tmp.persist(path).map_err(|e| PersistError::Rename {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    if let Ok(dir_handle) = fs::File::open(&dir) {
        if let Err(e) = dir_handle.sync_all() {
            tracing::debug!(
                dir = %dir.display(),
                error = %e,
                "Directory fsync failed after rename"
            );
        }
    }

    Ok(())
}

/// Mode for a destination that does not exist yet.
#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}
