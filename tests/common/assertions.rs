//! Custom test assertions for end-to-end tests

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Every regular file under `dir`, including hidden temporaries
pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// Assert that `dir` holds nothing, not even a leftover `.part` file
pub fn assert_no_files(dir: &Path) {
    let files = files_under(dir);
    assert!(
        files.is_empty(),
        "expected no files under {}, found {:?}",
        dir.display(),
        files
    );
}

/// Assert that `dir` holds exactly one file, named `file_name`, of `bytes` bytes
pub fn assert_single_cover(dir: &Path, file_name: &str, bytes: u64) {
    let files = files_under(dir);
    assert_eq!(
        files.len(),
        1,
        "expected exactly one file under {}, found {:?}",
        dir.display(),
        files
    );
    let path = &files[0];
    assert_eq!(
        path.file_name().and_then(|n| n.to_str()),
        Some(file_name),
        "unexpected cover file name"
    );
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    assert_eq!(size, bytes, "unexpected cover size");
}
