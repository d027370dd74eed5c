//! Navigation operations implementation

use crate::error::{NavigateError, StorageError};
use crate::storage::operations::locate_directory;
use crate::storage::resolve_virtual;
use std::path::Path;

/// Changes the working directory for a client. Returns the new virtual path.
pub fn change_directory(
    home: &Path,
    current_virtual_path: &str,
    target_path: &str,
) -> Result<String, NavigateError> {
    locate_directory(home, current_virtual_path, target_path).map_err(|e| match e {
        StorageError::NotADirectory(p) => NavigateError::NotADirectory(p),
        StorageError::AccessDenied(p) => NavigateError::PathTraversal(p),
        StorageError::NotFound(p) | StorageError::InvalidPath(p) => {
            NavigateError::DirectoryNotFound(p)
        }
        other => NavigateError::DirectoryNotFound(other.to_string()),
    })
}

/// Parent of the current virtual directory. The root is its own parent.
pub fn parent_directory(home: &Path, current_virtual_path: &str) -> String {
    resolve_virtual(home, current_virtual_path, "..")
}
