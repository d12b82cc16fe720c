//! Turn dropped or picked paths into file entries
//!
//! Top-level paths are taken as given. Directories are walked recursively
//! (stack-based), skipping hidden entries and known system files.

use crate::file::FileEntry;
use std::path::{Path, PathBuf};

/// Names skipped wherever they appear below a dropped directory.
const SYSTEM_NAMES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini", "__MACOSX"];

fn is_hidden_or_system(name: &str) -> bool {
    name.starts_with('.') || SYSTEM_NAMES.contains(&name)
}

/// Resolve a set of dropped paths into a flat list of entries.
///
/// Files inside a directory are sorted by path so the upload order is stable.
/// Fails on the first path that does not exist or cannot be read.
pub async fn resolve_dropped_paths<P: AsRef<Path>>(paths: &[P]) -> std::io::Result<Vec<FileEntry>> {
    let mut entries = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;

        if metadata.is_dir() {
            for file in collect_dir_files(path).await? {
                entries.push(FileEntry::from_path(&file).await?);
            }
        } else {
            entries.push(FileEntry::from_path(path).await?);
        }
    }

    Ok(entries)
}

async fn collect_dir_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(current) = stack.pop() {
        let mut dir = tokio::fs::read_dir(&current).await?;

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();

            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(is_hidden_or_system)
                .unwrap_or(true);
            if hidden {
                continue;
            }

            let metadata = tokio::fs::metadata(&path).await?;
            if metadata.is_file() {
                files.push(path);
            } else if metadata.is_dir() {
                stack.push(path);
            }
        }
    }

    files.sort();
    log::debug!("Resolved {} files under {}", files.len(), root.display());
    Ok(files)
}
