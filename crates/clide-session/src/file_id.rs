//! Canonical file identities.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Canonical absolute path identifying one source file.
///
/// Existing files are resolved through the filesystem (symlinks followed).
/// For a path that does not exist, the nearest existing ancestor is resolved
/// and the missing tail is appended after lexical normalization. A file keeps
/// the identity it was opened under after it is deleted, and `a/./b.cpp` and
/// `a/c/../b.cpp` still map to the same identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(Arc<Path>);

impl FileId {
    /// Resolves `path` to its canonical identity.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if let Ok(canon) = path.canonicalize() {
            return Self(Arc::from(canon));
        }
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        Self(Arc::from(resolve_missing(normalize_lexically(&absolute))))
    }

    /// Returns the canonical path.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Returns an owned copy of the canonical path.
    #[must_use]
    pub fn to_path_buf(&self) -> PathBuf {
        self.0.to_path_buf()
    }
}

impl AsRef<Path> for FileId {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.display().fmt(f)
    }
}

/// Canonicalizes the deepest ancestor of `path` that exists and re-attaches
/// the components below it.
fn resolve_missing(path: PathBuf) -> PathBuf {
    let mut tail = Vec::new();
    let mut base = path.as_path();
    while let (Some(parent), Some(name)) = (base.parent(), base.file_name()) {
        tail.push(name);
        base = parent;
        if let Ok(mut resolved) = base.canonicalize() {
            resolved.extend(tail.iter().rev());
            return resolved;
        }
    }
    path
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            _ => normalized.push(component.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("{prefix}-{stamp}"));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn missing_files_are_normalized_lexically() {
        let a = FileId::new("/no/such/dir/./src/../main.cpp");
        let b = FileId::new("/no/such/dir/main.cpp");
        assert_eq!(a, b);
        assert_eq!(a.as_path(), Path::new("/no/such/dir/main.cpp"));
    }

    #[test]
    fn relative_paths_become_absolute() {
        let id = FileId::new("definitely-missing-file.cpp");
        assert!(id.as_path().is_absolute());
        assert!(id.as_path().ends_with("definitely-missing-file.cpp"));
    }

    #[test]
    fn existing_files_resolve_to_one_identity() {
        let root = temp_dir("clide-file-id");
        fs::create_dir_all(root.join("src")).expect("create src");
        let file = root.join("src/main.cpp");
        fs::write(&file, "int main() {}\n").expect("write file");

        let direct = FileId::new(&file);
        let roundabout = FileId::new(root.join("src/../src/./main.cpp"));
        assert_eq!(direct, roundabout);

        fs::remove_dir_all(root).ok();
    }

    #[cfg(unix)]
    #[test]
    fn deleted_file_keeps_its_symlinked_identity() {
        let root = temp_dir("clide-file-id-link");
        fs::create_dir_all(root.join("real")).expect("create real");
        std::os::unix::fs::symlink(root.join("real"), root.join("link")).expect("symlink");
        let through_link = root.join("link/a.cpp");
        fs::write(&through_link, "int a;\n").expect("write file");

        let opened = FileId::new(&through_link);
        assert_eq!(opened, FileId::new(root.join("real/a.cpp")));

        fs::remove_file(&through_link).expect("remove file");
        assert_eq!(FileId::new(&through_link), opened);
        assert_eq!(FileId::new(root.join("link/./sub/../a.cpp")), opened);

        fs::remove_dir_all(root).ok();
    }
}
