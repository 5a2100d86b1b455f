//! Nim source discovery.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

pub const NIM_EXTENSION: &str = "nim";

/// Version control metadata and compiler caches, never project sources.
const SKIPPED_DIRS: [&str; 5] = [".git", ".hg", ".svn", "nimcache", "nimblecache"];

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map_or(false, |name| SKIPPED_DIRS.contains(&name))
}

/// All `*.nim` files under `root`, relative to it and sorted. Only version
/// control and compiler cache directories are left out.
pub fn nim_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .map_or(false, |ext| ext == NIM_EXTENSION)
        })
        .filter_map(|e| e.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect();
    files.sort();
    files
}

/// Test files matching `<tests_dir>/t_*.nim`, sorted.
pub fn test_files(tests_dir: &Path) -> Vec<PathBuf> {
    let pattern = format!(
        "{}/t_*.{}",
        glob::Pattern::escape(&tests_dir.to_string_lossy()),
        NIM_EXTENSION
    );
    let mut files: Vec<PathBuf> = match glob::glob(&pattern) {
        Ok(paths) => paths.filter_map(|p| p.ok()).filter(|p| p.is_file()).collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files
}
