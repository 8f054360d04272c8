use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ArchiveError;

/// Read-only access to the entries of a packaged book.
///
/// Implementations must tolerate any number of concurrent callers. The entry
/// list is fixed for the lifetime of the source.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// All entry paths, in archive order.
    fn entries(&self) -> &[String];

    /// Whether an entry with exactly this path exists.
    fn contains(&self, path: &str) -> bool {
        self.entries().iter().any(|entry| entry == path)
    }

    /// Read the full contents of an entry.
    ///
    /// Returns [`ArchiveError::NotFound`] when no entry has this exact path.
    async fn open(&self, path: &str) -> Result<Bytes, ArchiveError>;

    /// Identifier for logging (usually the file path).
    fn identifier(&self) -> &str;
}

/// An archive held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    identifier: String,
    entries: Vec<String>,
    contents: HashMap<String, Bytes>,
}

impl MemoryArchive {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            entries: Vec::new(),
            contents: HashMap::new(),
        }
    }

    /// Add an entry, replacing any existing entry with the same path.
    pub fn with_entry(mut self, path: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let path = path.into();
        if self.contents.insert(path.clone(), data.into()).is_none() {
            self.entries.push(path);
        }
        self
    }
}

#[async_trait]
impl ArchiveSource for MemoryArchive {
    fn entries(&self) -> &[String] {
        &self.entries
    }

    fn contains(&self, path: &str) -> bool {
        self.contents.contains_key(path)
    }

    async fn open(&self, path: &str) -> Result<Bytes, ArchiveError> {
        self.contents
            .get(path)
            .cloned()
            .ok_or_else(|| ArchiveError::NotFound(path.to_string()))
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
