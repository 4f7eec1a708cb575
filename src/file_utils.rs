use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

// @module: File and directory utilities

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        // Ensure the parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Move a file, ensuring the target directory exists
    ///
    /// Falls back to copy and delete when the directories live on different devices.
    pub fn move_file<P1: AsRef<Path>, P2: AsRef<Path>>(from: P1, to: P2) -> Result<()> {
        let from = from.as_ref();
        let to = to.as_ref();

        if !from.exists() {
            return Err(anyhow::anyhow!("Source file does not exist: {:?}", from));
        }

        if let Some(parent) = to.parent() {
            Self::ensure_dir(parent)?;
        }

        if fs::rename(from, to).is_err() {
            fs::copy(from, to)
                .with_context(|| format!("Failed to copy {:?} to {:?}", from, to))?;
            fs::remove_file(from)
                .with_context(|| format!("Failed to remove moved file: {:?}", from))?;
        }

        Ok(())
    }

    // @lists: Regular files directly inside a directory
    pub fn list_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut result = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.context("Failed to read directory entry")?;
            if entry.file_type().is_file() {
                result.push(entry.into_path());
            }
        }

        result.sort();
        Ok(result)
    }

    /// Remove every file in `dir` whose name is `stem` or starts with `stem.`
    ///
    /// Returns the number of removed files. A file that cannot be removed is
    /// logged and skipped.
    pub fn remove_files_with_stem<P: AsRef<Path>>(dir: P, stem: &str) -> Result<usize> {
        let prefix = format!("{}.", stem);
        let mut removed = 0;

        for path in Self::list_files(dir)? {
            let matches = path
                .file_name()
                .map(|name| {
                    let name = name.to_string_lossy();
                    name == stem || name.starts_with(&prefix)
                })
                .unwrap_or(false);

            if !matches {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!("Removed work file {:?}", path);
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove work file {:?}: {}", path, e),
            }
        }

        Ok(removed)
    }

    // @returns: Time since last modification, zero for files from the future
    pub fn file_age<P: AsRef<Path>>(path: P, now: SystemTime) -> Result<Duration> {
        let modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .with_context(|| format!("Failed to read modification time: {:?}", path.as_ref()))?;

        Ok(now.duration_since(modified).unwrap_or(Duration::ZERO))
    }
}
