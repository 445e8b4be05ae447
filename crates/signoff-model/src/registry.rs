use std::path::{Path, PathBuf};

/// Session-scoped mapping from student identity to stored signature image.
///
/// Insertion order is preserved for status display and merge iteration.
/// `upsert` replaces in place, so no two entries ever share an identity and
/// re-signing does not move a student to the end of the list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureRegistry {
    entries: Vec<(String, PathBuf)>,
}

impl SignatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `identity -> path`, replacing any existing entry for the
    /// same identity (its position in the list is kept).
    pub fn upsert(&mut self, identity: impl Into<String>, path: impl Into<PathBuf>) {
        let identity = identity.into();
        let path = path.into();
        match self.entries.iter_mut().find(|(id, _)| *id == identity) {
            Some((_, existing)) => *existing = path,
            None => self.entries.push((identity, path)),
        }
    }

    pub fn get(&self, identity: &str) -> Option<&Path> {
        self.entries
            .iter()
            .find(|(id, _)| id == identity)
            .map(|(_, path)| path.as_path())
    }

    /// Discard all entries. Invoked whenever a new workbook is uploaded.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries
            .iter()
            .map(|(id, path)| (id.as_str(), path.as_path()))
    }
}
