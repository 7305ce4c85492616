// ABOUTME: Key material sources for key-based authentication.
// ABOUTME: Abstracts reading private key bytes so callers can supply their own storage.

use std::io;
use std::path::{Path, PathBuf};

/// Reads private key bytes from a named location.
pub trait KeyMaterialSource: Send + Sync {
    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads key files from the local filesystem.
///
/// A leading `~/` is expanded against `$HOME`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsKeySource;

impl FsKeySource {
    fn expand(path: &Path) -> PathBuf {
        match (path.strip_prefix("~"), std::env::var_os("HOME")) {
            (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
            _ => path.to_path_buf(),
        }
    }
}

impl KeyMaterialSource for FsKeySource {
    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        let path = Self::expand(path);
        tracing::debug!(path = %path.display(), "reading key material");
        std::fs::read(path)
    }
}
