use std::fs;
use std::path::{Path, PathBuf};

use crate::CaptureError;

const FILE_SUFFIX: &str = "_sign.png";

/// Filesystem store holding one signature PNG per student.
///
/// Files are keyed `{identity}_sign.png` inside a flat directory; saving
/// again for the same identity overwrites. The store is the only state that
/// outlives a process, so sessions can re-register signatures from it.
#[derive(Debug, Clone)]
pub struct SignatureStore {
    dir: PathBuf,
}

impl SignatureStore {
    /// Open the store, creating the directory if it does not exist.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CaptureError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file path a signature for `identity` is (or would be) stored at.
    ///
    /// Identities containing path separators or `..` are rejected so a
    /// student name can never escape the store directory.
    pub fn path_for(&self, identity: &str) -> Result<PathBuf, CaptureError> {
        let trimmed = identity.trim();
        if trimmed.is_empty()
            || trimmed == ".."
            || trimmed.contains('/')
            || trimmed.contains('\\')
            || trimmed.contains('\0')
        {
            return Err(CaptureError::InvalidIdentity(identity.to_string()));
        }
        Ok(self.dir.join(format!("{trimmed}{FILE_SUFFIX}")))
    }

    /// Write `png` for `identity`, overwriting any previous signature.
    /// Returns the stored path.
    pub fn save(&self, identity: &str, png: &[u8]) -> Result<PathBuf, CaptureError> {
        let path = self.path_for(identity)?;
        fs::write(&path, png)?;
        Ok(path)
    }

    /// Read back the stored PNG for `identity`.
    pub fn load(&self, identity: &str) -> Result<Vec<u8>, CaptureError> {
        let path = self.path_for(identity)?;
        Ok(fs::read(path)?)
    }

    /// All stored signatures as `(identity, path)`, sorted by file name so
    /// session restore is deterministic.
    pub fn entries(&self) -> Result<Vec<(String, PathBuf)>, CaptureError> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(identity) = name.strip_suffix(FILE_SUFFIX) else {
                continue;
            };
            if identity.is_empty() {
                continue;
            }
            out.push((identity.to_string(), entry.path()));
        }
        out.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_overwrites_and_entries_list_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let store = SignatureStore::open(dir.path().join("signatures")).unwrap();

        store.save("Grace", b"g1").unwrap();
        store.save("Ada", b"a1").unwrap();
        store.save("Grace", b"g2").unwrap();

        assert_eq!(store.load("Grace").unwrap(), b"g2");

        let entries = store.entries().unwrap();
        let identities: Vec<&str> = entries.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(identities, vec!["Ada", "Grace"]);
    }

    #[test]
    fn path_traversal_identities_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = SignatureStore::open(dir.path()).unwrap();
        for identity in ["", "..", "a/b", "a\\b"] {
            assert!(matches!(
                store.path_for(identity),
                Err(CaptureError::InvalidIdentity(_))
            ));
        }
    }

    #[test]
    fn unrelated_files_are_ignored_by_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = SignatureStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        store.save("Ada", b"a").unwrap();
        let entries = store.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "Ada");
    }
}
