//! Unit tests for the remote execution service.

mod client;
mod transfer;

use camino::Utf8PathBuf;
use tempfile::TempDir;

use crate::test_support::TEST_PRIVATE_KEY;

/// Writes `contents` to a key file inside a fresh temporary directory.
fn key_file(contents: &str) -> (TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = Utf8PathBuf::from_path_buf(dir.path().join("id_ed25519")).expect("utf8 path");
    std::fs::write(&path, contents).expect("write key");
    (dir, path)
}

fn valid_key() -> (TempDir, Utf8PathBuf) {
    key_file(TEST_PRIVATE_KEY)
}
