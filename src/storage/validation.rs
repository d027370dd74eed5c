//! Path validation
//!
//! Maps client-visible virtual paths onto real paths confined to a user's
//! home directory. Everything here is pure and deterministic except
//! [`ensure_contained`], which also consults the filesystem to catch symlinks
//! that point out of the home.

use std::path::{Component, Path, PathBuf};

use crate::error::StorageError;

/// Collapses `.`/`..`/empty segments of a virtual path. `..` at the root stays
/// at the root. The result always starts with `/`.
pub fn normalize_virtual(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Lexically normalizes a real path and makes it absolute against the
/// process working directory. Symlinks are not followed.
pub fn normalize_real(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Resolves `argument` against the current virtual directory.
///
/// Absolute arguments are taken from the virtual root, relative ones are joined
/// onto `current_virtual`. If the real path the result designates would fall
/// outside `home`, the result is clamped to `/`.
pub fn resolve_virtual(home: &Path, current_virtual: &str, argument: &str) -> String {
    let candidate = if argument.starts_with('/') {
        argument.to_string()
    } else {
        format!("{}/{}", current_virtual, argument)
    };

    let home = normalize_real(home);
    let real = normalize_real(&home.join(candidate.trim_start_matches('/')));

    match real.strip_prefix(&home) {
        Ok(inside) => {
            let segments: Vec<String> = inside
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            format!("/{}", segments.join("/"))
        }
        Err(_) => "/".to_string(),
    }
}

/// Converts a virtual path to the real path under `home`. The virtual root is
/// `home` itself.
pub fn virtual_to_real(home: &Path, virtual_path: &str) -> PathBuf {
    let clean = normalize_virtual(virtual_path);
    if clean == "/" {
        home.to_path_buf()
    } else {
        home.join(clean.trim_start_matches('/'))
    }
}

/// True iff the normalized `real_path` lies at or below the normalized `home`.
/// Comparison is per path component, so `/srv/ftp/alice2` is not inside
/// `/srv/ftp/alice`.
pub fn is_contained(real_path: &Path, home: &Path) -> bool {
    normalize_real(real_path).starts_with(normalize_real(home))
}

/// The authoritative gate run before every read, write, create or delete.
///
/// Applies the lexical check, then canonicalizes the nearest existing ancestor
/// of `real_path` and requires it to stay inside the canonical home.
pub fn ensure_contained(
    real_path: &Path,
    home: &Path,
    virtual_path: &str,
) -> Result<(), StorageError> {
    if !is_contained(real_path, home) || !canonical_contained(real_path, home) {
        return Err(StorageError::AccessDenied(virtual_path.to_string()));
    }
    Ok(())
}

fn canonical_contained(real_path: &Path, home: &Path) -> bool {
    let Ok(canonical_home) = home.canonicalize() else {
        return false;
    };

    let mut probe = real_path;
    loop {
        match probe.canonicalize() {
            Ok(canonical) => return canonical.starts_with(&canonical_home),
            Err(_) => match probe.parent() {
                Some(parent) => probe = parent,
                None => return false,
            },
        }
    }
}

/// Resolves an argument and validates it in one step.
///
/// Returns the virtual path together with its real counterpart.
pub fn resolve_and_validate(
    home: &Path,
    current_virtual: &str,
    argument: &str,
) -> Result<(String, PathBuf), StorageError> {
    if argument.is_empty() {
        return Err(StorageError::InvalidPath("empty path".into()));
    }

    let virtual_path = resolve_virtual(home, current_virtual, argument);
    let real_path = virtual_to_real(home, &virtual_path);
    ensure_contained(&real_path, home, &virtual_path)?;
    Ok((virtual_path, real_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: &str = "/srv/ftp/alice";

    #[test]
    fn test_normalize_virtual() {
        assert_eq!(normalize_virtual("/"), "/");
        assert_eq!(normalize_virtual(""), "/");
        assert_eq!(normalize_virtual("/a/./b//c/"), "/a/b/c");
        assert_eq!(normalize_virtual("/a/b/../c"), "/a/c");
        assert_eq!(normalize_virtual("/../../x"), "/x");
    }

    #[test]
    fn test_relative_and_absolute_resolution() {
        let home = Path::new(HOME);
        assert_eq!(resolve_virtual(home, "/", "docs"), "/docs");
        assert_eq!(resolve_virtual(home, "/docs", "drafts/../final"), "/docs/final");
        assert_eq!(resolve_virtual(home, "/docs", "/pub"), "/pub");
        assert_eq!(resolve_virtual(home, "/docs", ".."), "/");
        assert_eq!(resolve_virtual(home, "/docs", "."), "/docs");
    }

    #[test]
    fn test_dot_dot_sequences_clamp_to_root() {
        let home = Path::new(HOME);
        for argument in ["../../../etc", "..", "../..", "/../../etc", "a/../../../../etc/passwd"] {
            let virtual_path = resolve_virtual(home, "/", argument);
            assert_eq!(virtual_path, "/", "argument {argument}");
            assert_eq!(virtual_to_real(home, &virtual_path), PathBuf::from(HOME));
        }
    }

    #[test]
    fn test_escape_from_subdirectory_clamps_to_root() {
        let home = Path::new(HOME);
        assert_eq!(resolve_virtual(home, "/docs", "../../.."), "/");
        assert_eq!(resolve_virtual(home, "/docs/a", "../b"), "/docs/b");
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let home = Path::new(HOME);
        let first = resolve_virtual(home, "/a/b", "../c/./d");
        let second = resolve_virtual(home, "/a/b", "../c/./d");
        assert_eq!(first, second);
        assert_eq!(first, "/a/c/d");
    }

    #[test]
    fn test_virtual_to_real() {
        let home = Path::new(HOME);
        assert_eq!(virtual_to_real(home, "/"), PathBuf::from(HOME));
        assert_eq!(
            virtual_to_real(home, "/docs/report.txt"),
            PathBuf::from("/srv/ftp/alice/docs/report.txt")
        );
        assert_eq!(
            virtual_to_real(home, "/../docs"),
            PathBuf::from("/srv/ftp/alice/docs")
        );
    }

    #[test]
    fn test_containment_is_component_wise() {
        let home = Path::new(HOME);
        assert!(is_contained(Path::new("/srv/ftp/alice"), home));
        assert!(is_contained(Path::new("/srv/ftp/alice/docs"), home));
        assert!(is_contained(Path::new("/srv/ftp/alice/docs/../x"), home));
        assert!(!is_contained(Path::new("/srv/ftp/alice2"), home));
        assert!(!is_contained(Path::new("/srv/ftp/alice/../bob"), home));
        assert!(!is_contained(Path::new("/etc"), home));
    }

    #[test]
    fn test_ensure_contained_on_real_tree() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path();
        std::fs::create_dir(home.join("docs")).unwrap();

        assert!(ensure_contained(&home.join("docs"), home, "/docs").is_ok());
        assert!(ensure_contained(&home.join("docs/new"), home, "/docs/new").is_ok());
        assert!(matches!(
            ensure_contained(&home.join("../elsewhere"), home, "/elsewhere"),
            Err(StorageError::AccessDenied(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_out_of_home_is_denied() {
        let outside = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path();
        std::os::unix::fs::symlink(outside.path(), home.join("escape")).unwrap();

        let result = resolve_and_validate(home, "/", "escape/secret.txt");
        assert!(matches!(result, Err(StorageError::AccessDenied(_))));
    }

    #[test]
    fn test_resolve_and_validate_rejects_empty_argument() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            resolve_and_validate(dir.path(), "/", ""),
            Err(StorageError::InvalidPath(_))
        ));
    }
}
