//! Common test utilities and fixtures
//!
//! Helpers for building tar-container unit archives in memory and writing
//! them to temporary working storage.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

/// Creates a temporary directory for test fixtures
pub fn create_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Build a tar archive in memory from (entry name, bytes) pairs.
pub fn tar_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, *data)
            .expect("Failed to append tar entry");
    }
    builder.into_inner().expect("Failed to finish tar archive")
}

/// Write a unit archive file into `dir` and return its path.
pub fn write_archive(dir: &TempDir, file_name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.path().join(file_name);
    fs::write(&path, tar_archive(entries)).expect("Failed to write archive");
    path
}
