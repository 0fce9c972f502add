// src/watch/hash.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use blake3::Hasher;
use tracing::debug;

use crate::fs::FileSystem;

/// blake3 hex digest of `contents`.
pub fn compute_hash(contents: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(contents);
    hasher.finalize().to_hex().to_string()
}

/// Last seen content hash per watched file.
///
/// Used to drop events that leave a file byte-for-byte unchanged (editors
/// that rewrite on save, `touch`, ...).
#[derive(Debug, Default)]
pub struct ContentHashes {
    seen: HashMap<PathBuf, String>,
}

impl ContentHashes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current content of `path` and report whether it differs
    /// from the last recorded one.
    ///
    /// A file seen for the first time counts as changed. A file that can no
    /// longer be read (removed) is forgotten and counts as changed.
    pub fn has_changed(&mut self, fs: &dyn FileSystem, path: &Path) -> bool {
        let contents = match fs.read(path) {
            Ok(c) => c,
            Err(err) => {
                debug!(path = ?path, error = %err, "unreadable; treating as changed");
                self.seen.remove(path);
                return true;
            }
        };

        let hash = compute_hash(&contents);
        match self.seen.insert(path.to_path_buf(), hash.clone()) {
            Some(prev) if prev == hash => {
                debug!(path = ?path, "content unchanged");
                false
            }
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn same_content_is_not_a_change() {
        let fs = MockFileSystem::new();
        let path = Path::new("src/app/main.js");
        fs.add_file(path, "let a = 1;");

        let mut hashes = ContentHashes::new();
        assert!(hashes.has_changed(&fs, path));
        assert!(!hashes.has_changed(&fs, path));

        fs.add_file(path, "let a = 2;");
        assert!(hashes.has_changed(&fs, path));
    }

    #[test]
    fn removed_file_is_forgotten() {
        let fs = MockFileSystem::new();
        let path = Path::new("src/gone.js");
        fs.add_file(path, "x");

        let mut hashes = ContentHashes::new();
        hashes.has_changed(&fs, path);
        fs.remove_tree(path).unwrap();

        assert!(hashes.has_changed(&fs, path));
        assert!(!hashes.seen.contains_key(path));
    }

    #[test]
    fn hash_is_hex_blake3() {
        let h = compute_hash(b"abc");
        assert_eq!(h.len(), 64);
        assert_eq!(h, blake3::hash(b"abc").to_hex().to_string());
    }
}
