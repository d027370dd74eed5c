//! Storage operations
//!
//! Directory and file operations behind MKD, RMD, DELE, LIST/NLST, RETR,
//! STOR/STOU and RNFR/RNTO. Every operation resolves its argument through
//! [`resolve_and_validate`] on each call; nothing is cached.

use log::{error, info, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::storage::results::{ListEntry, StoreTarget};
use crate::storage::validation::{ensure_contained, resolve_and_validate, virtual_to_real};

/// Rejects operations aimed at the home directory itself.
fn reject_root(virtual_path: &str) -> Result<(), StorageError> {
    if virtual_path == "/" {
        return Err(StorageError::AccessDenied(virtual_path.to_string()));
    }
    Ok(())
}

/// Name of the temporary sibling an upload is written to.
fn partial_name(file_name: &str) -> String {
    format!(".{}.part", file_name)
}

fn is_partial_upload(name: &str) -> bool {
    name.len() > ".part".len() + 1 && name.starts_with('.') && name.ends_with(".part")
}

fn not_found_or_io(e: std::io::Error, virtual_path: &str) -> StorageError {
    if e.kind() == ErrorKind::NotFound {
        StorageError::NotFound(virtual_path.to_string())
    } else {
        StorageError::Io(e)
    }
}

/// Creates a directory. Returns its virtual path.
pub fn create_directory(
    home: &Path,
    current_virtual_path: &str,
    dir_name: &str,
) -> Result<String, StorageError> {
    let (virtual_path, real_path) = resolve_and_validate(home, current_virtual_path, dir_name)?;

    if real_path.exists() {
        return Err(StorageError::AlreadyExists(virtual_path));
    }

    fs::create_dir(&real_path).map_err(|e| not_found_or_io(e, &virtual_path))?;
    info!(
        "Created directory {} (real: {})",
        virtual_path,
        real_path.display()
    );
    Ok(virtual_path)
}

/// Removes an empty directory. Returns its virtual path.
pub fn remove_directory(
    home: &Path,
    current_virtual_path: &str,
    dir_name: &str,
) -> Result<String, StorageError> {
    let (virtual_path, real_path) = resolve_and_validate(home, current_virtual_path, dir_name)?;
    reject_root(&virtual_path)?;

    let metadata =
        fs::symlink_metadata(&real_path).map_err(|e| not_found_or_io(e, &virtual_path))?;
    if !metadata.is_dir() {
        return Err(StorageError::NotADirectory(virtual_path));
    }

    if fs::read_dir(&real_path)?.next().is_some() {
        return Err(StorageError::NotEmpty(virtual_path));
    }

    fs::remove_dir(&real_path)?;
    info!(
        "Removed directory {} (real: {})",
        virtual_path,
        real_path.display()
    );
    Ok(virtual_path)
}

/// Deletes a regular file. Returns its virtual path.
pub fn delete_file(
    home: &Path,
    current_virtual_path: &str,
    filename: &str,
) -> Result<String, StorageError> {
    let (virtual_path, real_path) = resolve_and_validate(home, current_virtual_path, filename)?;
    reject_root(&virtual_path)?;

    let metadata = fs::metadata(&real_path).map_err(|e| not_found_or_io(e, &virtual_path))?;
    if !metadata.is_file() {
        return Err(StorageError::NotAFile(virtual_path));
    }

    if let Err(e) = fs::remove_file(&real_path) {
        error!(
            "Failed to delete file {} (real: {}): {}",
            virtual_path,
            real_path.display(),
            e
        );
        return Err(StorageError::from(e));
    }

    info!("Deleted file {} (real: {})", virtual_path, real_path.display());
    Ok(virtual_path)
}

/// Lists a directory, or a single entry when the path names a regular file.
/// Entries are sorted by name. Temporary files of uploads in progress are
/// left out.
pub fn list_directory(home: &Path, virtual_path: &str) -> Result<Vec<ListEntry>, StorageError> {
    let real_path = virtual_to_real(home, virtual_path);
    ensure_contained(&real_path, home, virtual_path)?;

    let metadata = fs::metadata(&real_path).map_err(|e| not_found_or_io(e, virtual_path))?;

    if metadata.is_file() {
        let name = real_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| virtual_path.to_string());
        return Ok(vec![ListEntry::from_metadata(name, &metadata)]);
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(&real_path)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_partial_upload(&name) {
            continue;
        }
        // Dangling symlinks have no target metadata; skip them.
        if let Ok(metadata) = entry.metadata() {
            entries.push(ListEntry::from_metadata(name, &metadata));
        }
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    info!(
        "Listed directory {} (real: {}) - {} entries",
        virtual_path,
        real_path.display(),
        entries.len()
    );
    Ok(entries)
}

/// Checks that a path exists inside the home and names a directory.
/// Returns the resolved virtual path.
pub fn locate_directory(
    home: &Path,
    current_virtual_path: &str,
    path: &str,
) -> Result<String, StorageError> {
    let (virtual_path, real_path) = resolve_and_validate(home, current_virtual_path, path)?;
    let metadata = fs::metadata(&real_path).map_err(|e| not_found_or_io(e, &virtual_path))?;
    if !metadata.is_dir() {
        return Err(StorageError::NotADirectory(virtual_path));
    }
    Ok(virtual_path)
}

/// Prepares for file retrieval
pub fn prepare_file_retrieval(
    home: &Path,
    current_virtual_path: &str,
    filename: &str,
) -> Result<PathBuf, StorageError> {
    let (virtual_path, file_path) = resolve_and_validate(home, current_virtual_path, filename)?;

    let metadata = fs::metadata(&file_path).map_err(|e| not_found_or_io(e, &virtual_path))?;
    if !metadata.is_file() {
        return Err(StorageError::NotAFile(virtual_path));
    }

    info!(
        "Prepared file retrieval for {} (real: {})",
        virtual_path,
        file_path.display()
    );
    Ok(file_path)
}

/// Prepares for file storage
pub fn prepare_file_storage(
    home: &Path,
    current_virtual_path: &str,
    filename: &str,
) -> Result<StoreTarget, StorageError> {
    let (virtual_path, file_path) = resolve_and_validate(home, current_virtual_path, filename)?;
    reject_root(&virtual_path)?;

    match file_path.parent() {
        Some(parent_dir) if parent_dir.is_dir() => {}
        Some(parent_dir) if parent_dir.exists() => {
            return Err(StorageError::NotADirectory(virtual_path));
        }
        _ => return Err(StorageError::NotFound(virtual_path)),
    }

    if file_path.exists() {
        return Err(StorageError::AlreadyExists(virtual_path));
    }

    let temp_name = match file_path.file_name() {
        Some(name) => partial_name(&name.to_string_lossy()),
        None => return Err(StorageError::InvalidPath(virtual_path)),
    };
    let temp_path = file_path.with_file_name(temp_name);

    if temp_path.exists() {
        return Err(StorageError::AlreadyExists(virtual_path));
    }

    info!(
        "Prepared file storage for {} (real: {})",
        virtual_path,
        file_path.display()
    );
    Ok(StoreTarget {
        file_path,
        temp_path,
        virtual_path,
    })
}

const UNIQUE_NAME_ATTEMPTS: usize = 16;

/// Prepares storage under a fresh name in the working directory, built from
/// `suggested` (default `file`) as `<stem>_<8 hex digits><ext>`. Only the last
/// component of the suggestion is used.
pub fn prepare_unique_storage(
    home: &Path,
    current_virtual_path: &str,
    suggested: Option<&str>,
) -> Result<StoreTarget, StorageError> {
    let base = suggested
        .and_then(|s| s.rsplit(['/', '\\']).next())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or("file");
    let (stem, ext) = match base.rfind('.') {
        Some(i) if i > 0 => base.split_at(i),
        _ => (base, ""),
    };

    for _ in 0..UNIQUE_NAME_ATTEMPTS {
        let candidate = format!("{}_{:08x}{}", stem, rand::random::<u32>(), ext);
        match prepare_file_storage(home, current_virtual_path, &candidate) {
            Err(StorageError::AlreadyExists(taken)) => {
                warn!("Unique name {} already taken, retrying", taken);
            }
            result => return result,
        }
    }

    error!("No unique name found for {} in {}", base, current_virtual_path);
    Err(StorageError::AlreadyExists(current_virtual_path.to_string()))
}

/// Checks that a rename source exists. Returns its virtual path.
pub fn prepare_rename(
    home: &Path,
    current_virtual_path: &str,
    path: &str,
) -> Result<String, StorageError> {
    let (virtual_path, real_path) = resolve_and_validate(home, current_virtual_path, path)?;
    reject_root(&virtual_path)?;

    if fs::symlink_metadata(&real_path).is_err() {
        return Err(StorageError::NotFound(virtual_path));
    }
    Ok(virtual_path)
}

/// Renames `from_virtual` (as returned by [`prepare_rename`]) to `to`.
/// Returns the destination's virtual path.
pub fn rename_entry(
    home: &Path,
    current_virtual_path: &str,
    from_virtual: &str,
    to: &str,
) -> Result<String, StorageError> {
    let (from_virtual, from_real) = resolve_and_validate(home, "/", from_virtual)?;
    let (to_virtual, to_real) = resolve_and_validate(home, current_virtual_path, to)?;
    reject_root(&from_virtual)?;
    reject_root(&to_virtual)?;

    if fs::symlink_metadata(&from_real).is_err() {
        return Err(StorageError::NotFound(from_virtual));
    }
    if to_real.exists() {
        return Err(StorageError::AlreadyExists(to_virtual));
    }

    fs::rename(&from_real, &to_real).map_err(|e| not_found_or_io(e, &to_virtual))?;
    info!("Renamed {} to {}", from_virtual, to_virtual);
    Ok(to_virtual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn home() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/report.txt"), b"quarterly").unwrap();
        fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        dir
    }

    #[test]
    fn test_create_directory() {
        let dir = home();
        let created = create_directory(dir.path(), "/docs", "drafts").unwrap();
        assert_eq!(created, "/docs/drafts");
        assert!(dir.path().join("docs/drafts").is_dir());

        assert!(matches!(
            create_directory(dir.path(), "/", "docs"),
            Err(StorageError::AlreadyExists(_))
        ));
        assert!(matches!(
            create_directory(dir.path(), "/", "missing/child"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_create_directory_outside_home_is_clamped() {
        let dir = home();
        // Clamped to the root, which already exists.
        assert!(matches!(
            create_directory(dir.path(), "/", "../../outside"),
            Err(StorageError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_remove_directory_preconditions() {
        let dir = home();
        assert!(matches!(
            remove_directory(dir.path(), "/", "docs"),
            Err(StorageError::NotEmpty(_))
        ));
        assert!(matches!(
            remove_directory(dir.path(), "/", "notes.txt"),
            Err(StorageError::NotADirectory(_))
        ));
        assert!(matches!(
            remove_directory(dir.path(), "/", "ghost"),
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            remove_directory(dir.path(), "/docs", "../.."),
            Err(StorageError::AccessDenied(_))
        ));

        fs::create_dir(dir.path().join("empty")).unwrap();
        assert_eq!(remove_directory(dir.path(), "/", "/empty").unwrap(), "/empty");
        assert!(!dir.path().join("empty").exists());
    }

    #[test]
    fn test_delete_file() {
        let dir = home();
        assert!(matches!(
            delete_file(dir.path(), "/", "docs"),
            Err(StorageError::NotAFile(_))
        ));
        assert!(matches!(
            delete_file(dir.path(), "/", "ghost.txt"),
            Err(StorageError::NotFound(_))
        ));
        assert_eq!(
            delete_file(dir.path(), "/docs", "report.txt").unwrap(),
            "/docs/report.txt"
        );
        assert!(!dir.path().join("docs/report.txt").exists());
    }

    #[test]
    fn test_list_directory_sorted() {
        let dir = home();
        let entries = list_directory(dir.path(), "/").unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["docs", "notes.txt"]);
        assert!(entries[0].is_dir);
        assert_eq!(entries[1].size, 5);

        let single = list_directory(dir.path(), "/notes.txt").unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].name, "notes.txt");

        assert!(matches!(
            list_directory(dir.path(), "/ghost"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_prepare_file_storage() {
        let dir = home();
        let target = prepare_file_storage(dir.path(), "/docs", "new.bin").unwrap();
        assert_eq!(target.virtual_path, "/docs/new.bin");
        assert_eq!(target.file_path, dir.path().join("docs/new.bin"));
        assert_eq!(target.temp_path, dir.path().join("docs/.new.bin.part"));

        assert!(matches!(
            prepare_file_storage(dir.path(), "/", "notes.txt"),
            Err(StorageError::AlreadyExists(_))
        ));
        assert!(matches!(
            prepare_file_storage(dir.path(), "/", "nowhere/file"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_prepare_unique_storage() {
        let dir = home();
        let target = prepare_unique_storage(dir.path(), "/docs", Some("report.txt")).unwrap();
        let name = target.virtual_path.strip_prefix("/docs/").unwrap();
        assert!(name.starts_with("report_") && name.ends_with(".txt"), "{}", name);
        assert_eq!(name.len(), "report_".len() + 8 + ".txt".len());
        assert!(!target.file_path.exists());
        assert_eq!(target.file_path.parent().unwrap(), dir.path().join("docs"));

        let fallback = prepare_unique_storage(dir.path(), "/", None).unwrap();
        assert!(fallback.virtual_path.starts_with("/file_"));

        let stripped = prepare_unique_storage(dir.path(), "/", Some("../../etc/passwd")).unwrap();
        assert!(stripped.virtual_path.starts_with("/passwd_"));
        assert_eq!(stripped.file_path.parent().unwrap(), dir.path());

        let hidden = prepare_unique_storage(dir.path(), "/", Some(".profile")).unwrap();
        assert!(hidden.virtual_path.starts_with("/.profile_"));

        assert!(matches!(
            prepare_unique_storage(dir.path(), "/ghost", Some("a.txt")),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_listing_hides_partial_uploads() {
        let dir = home();
        fs::write(dir.path().join(".notes.txt.part"), b"half").unwrap();
        fs::write(dir.path().join(".hidden"), b"kept").unwrap();
        let entries = list_directory(dir.path(), "/").unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![".hidden", "docs", "notes.txt"]);
    }

    #[test]
    fn test_prepare_file_retrieval() {
        let dir = home();
        let path = prepare_file_retrieval(dir.path(), "/", "docs/report.txt").unwrap();
        assert_eq!(path, dir.path().join("docs/report.txt"));
        assert!(matches!(
            prepare_file_retrieval(dir.path(), "/", "docs"),
            Err(StorageError::NotAFile(_))
        ));
    }

    #[test]
    fn test_rename_entry() {
        let dir = home();
        let from = prepare_rename(dir.path(), "/", "notes.txt").unwrap();
        assert_eq!(from, "/notes.txt");
        let to = rename_entry(dir.path(), "/docs", &from, "moved.txt").unwrap();
        assert_eq!(to, "/docs/moved.txt");
        assert!(dir.path().join("docs/moved.txt").is_file());

        assert!(matches!(
            prepare_rename(dir.path(), "/", "notes.txt"),
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            rename_entry(dir.path(), "/", "/docs/moved.txt", "/docs/report.txt"),
            Err(StorageError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_locate_directory() {
        let dir = home();
        assert_eq!(locate_directory(dir.path(), "/", "docs").unwrap(), "/docs");
        assert!(matches!(
            locate_directory(dir.path(), "/", "notes.txt"),
            Err(StorageError::NotADirectory(_))
        ));
    }
}
