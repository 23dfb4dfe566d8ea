//! File I/O utilities.
//!
//! Read failures are returned as `DocweaveError::Io` unchanged so callers can tell a missing
//! or unreadable file apart from a document that failed to parse.

use crate::{DocweaveError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

pub async fn read_file_async(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    fs::read(path.as_ref()).await.map_err(DocweaveError::Io)
}

pub fn read_file_sync(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    std::fs::read(path.as_ref()).map_err(DocweaveError::Io)
}

/// Collect the regular files under `dir`, sorted by path.
///
/// # Errors
///
/// Returns `DocweaveError::Validation` if `dir` is not a directory and
/// `DocweaveError::Io` for I/O errors while reading it.
pub fn collect_files(dir: impl AsRef<Path>, recursive: bool) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(DocweaveError::validation(format!(
            "Path is not a directory: {}",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    collect_files_impl(dir, recursive, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_files_impl(dir: &Path, recursive: bool, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        } else if recursive && path.is_dir() {
            collect_files_impl(&path, recursive, files)?;
        }
    }
    Ok(())
}
