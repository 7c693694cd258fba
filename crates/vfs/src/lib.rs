/// In-memory virtual filesystem shared by every resolver in a bundle.
///
/// Paths are canonical absolute slash paths; directories are implicit.
/// An empty buffer is a present file, distinct from absence.
use std::sync::Arc;

use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct Vfs {
    files: DashMap<String, Arc<Vec<u8>>>,
}

impl Vfs {
    pub fn new() -> Self {
        Self {
            files: DashMap::new(),
        }
    }

    /// Reads a file as bytes. `None` means not-present.
    pub fn get(&self, path: &str) -> Option<Arc<Vec<u8>>> {
        self.files.get(&vpath::normalize(path)).map(|r| r.clone())
    }

    /// Reads a file as a UTF-8 string, replacing invalid sequences.
    pub fn get_string(&self, path: &str) -> Option<String> {
        self.get(path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn exists(&self, path: &str) -> bool {
        self.files.contains_key(&vpath::normalize(path))
    }

    /// Writes a file, creating any implicit parent directories.
    ///
    /// Last writer wins for concurrent writes to one path.
    pub fn set(&self, path: &str, contents: impl Into<Vec<u8>>) {
        self.files
            .insert(vpath::normalize(path), Arc::new(contents.into()));
    }

    pub fn remove(&self, path: &str) -> Option<Arc<Vec<u8>>> {
        self.files.remove(&vpath::normalize(path)).map(|(_, v)| v)
    }

    /// Drops every file. Called when a bundle completes.
    pub fn clear(&self) {
        self.files.clear();
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Visits every (path, contents) pair. Iteration order is arbitrary.
    pub fn for_each(&self, mut f: impl FnMut(&str, &Arc<Vec<u8>>)) {
        for entry in self.files.iter() {
            f(entry.key(), entry.value());
        }
    }
}
