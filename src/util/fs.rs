//! Filesystem utilities.

use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

/// Extension of spec files.
pub const SPEC_EXTENSION: &str = "xcspec";

/// Every spec file under `root`, sorted.
///
/// A missing root yields no files rather than an error.
pub fn find_spec_files(root: &Path) -> Vec<PathBuf> {
    if !root.exists() {
        tracing::debug!("spec search path does not exist: {}", root.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("error walking {}: {}", root.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == SPEC_EXTENSION))
        .collect();

    files.sort();
    files
}

/// `path` without its final extension, as a string.
pub fn without_suffix(path: &Path) -> String {
    path.with_extension("").to_string_lossy().into_owned()
}

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component. The filesystem is not consulted.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(normalized.components().next_back(), Some(Component::Normal(_)))
                    && normalized.pop();
                if !popped && !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// `path` relative to `ancestor`, if `ancestor` contains it.
pub fn relative_subpath(path: &Path, ancestor: &Path) -> Option<PathBuf> {
    if ancestor.as_os_str().is_empty() {
        return None;
    }
    path.strip_prefix(ancestor).ok().map(Path::to_path_buf)
}
