//! Test fixtures for media storage testing.
//!
//! Provides temporary media directories and deterministic sample files for
//! streaming and library tests.

use std::path::{Path, PathBuf};

/// Deterministic, non-repeating-per-block byte pattern of `len` bytes.
pub fn sample_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 256) % 256) as u8).collect()
}

/// Creates a temporary `videos` directory.
///
/// # Panics
///
/// Panics if the temporary directory cannot be created. This is acceptable
/// in test fixtures where failures indicate environment issues.
pub fn create_media_dir() -> (tempfile::TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().unwrap();
    let media_dir = temp_dir.path().join("videos");
    std::fs::create_dir_all(&media_dir).unwrap();
    (temp_dir, media_dir)
}

/// Writes `len` sample bytes to `dir/name`, creating `dir` as needed.
///
/// # Panics
///
/// Panics if the directory or file cannot be written.
pub fn write_sample_video(dir: &Path, name: &str, len: usize) -> (PathBuf, Vec<u8>) {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    let data = sample_bytes(len);
    std::fs::write(&path, &data).unwrap();
    (path, data)
}
