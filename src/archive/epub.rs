//! EPUB (zip) archive source.
//!
//! The file is read once and its central directory parsed once. Every call to
//! [`ArchiveSource::open`] works on a clone of the parsed archive over the same
//! shared buffer, so concurrent readers never share a cursor.

use std::io::{Cursor, Read};
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::ArchiveError;

use super::ArchiveSource;

/// A zip-packaged book loaded into memory.
#[derive(Clone)]
pub struct EpubArchive {
    identifier: String,
    entries: Vec<String>,
    archive: ZipArchive<Cursor<Bytes>>,
}

impl EpubArchive {
    /// Read and parse the archive at `path`.
    ///
    /// Fails if the file cannot be read or is not a zip archive. There is no
    /// degraded mode.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let path = path.as_ref();
        let identifier = path.display().to_string();

        let data = tokio::fs::read(path)
            .await
            .map_err(|e| ArchiveError::Open {
                path: identifier.clone(),
                message: e.to_string(),
            })?;

        Self::from_bytes(identifier, data)
    }

    /// Parse an archive that is already in memory.
    pub fn from_bytes(
        identifier: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Result<Self, ArchiveError> {
        let identifier = identifier.into();

        let archive =
            ZipArchive::new(Cursor::new(data.into())).map_err(|e| ArchiveError::Invalid {
                path: identifier.clone(),
                message: e.to_string(),
            })?;

        // Directory records carry no content and are never served.
        let entries: Vec<String> = archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect();

        debug!(
            archive = %identifier,
            entries = entries.len(),
            "Opened archive"
        );

        Ok(Self {
            identifier,
            entries,
            archive,
        })
    }
}

#[async_trait]
impl ArchiveSource for EpubArchive {
    fn entries(&self) -> &[String] {
        &self.entries
    }

    async fn open(&self, path: &str) -> Result<Bytes, ArchiveError> {
        if !self.contains(path) {
            return Err(ArchiveError::NotFound(path.to_string()));
        }

        let mut archive = self.archive.clone();
        let name = path.to_string();

        // Inflating is CPU work; keep it off the async workers.
        tokio::task::spawn_blocking(move || -> Result<Bytes, ArchiveError> {
            let mut file = archive.by_name(&name).map_err(|e| match e {
                ZipError::FileNotFound => ArchiveError::NotFound(name.clone()),
                other => ArchiveError::Read {
                    path: name.clone(),
                    message: other.to_string(),
                },
            })?;

            let mut buf = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut buf).map_err(|e| ArchiveError::Read {
                path: name.clone(),
                message: e.to_string(),
            })?;

            Ok(Bytes::from(buf))
        })
        .await
        .map_err(|e| ArchiveError::Read {
            path: path.to_string(),
            message: e.to_string(),
        })?
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
