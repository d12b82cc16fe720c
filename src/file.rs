//! Candidate files and their payload handles

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Fallback when no MIME type can be guessed from the name.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Where the bytes of a file come from.
#[derive(Debug, Clone)]
pub enum FilePayload {
    Memory(Arc<[u8]>),
    /// Read at upload time.
    Path(PathBuf),
}

/// A file accepted (or about to be checked) for upload. Immutable.
#[derive(Debug, Clone)]
pub struct FileEntry {
    name: String,
    mime_type: String,
    size: u64,
    payload: FilePayload,
}

impl FileEntry {
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
    ) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size: data.len() as u64,
            payload: FilePayload::Memory(data),
        }
    }

    /// Describe a file on disk; the MIME type is guessed from its extension.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self {
            name,
            mime_type: guess_mime_type(path),
            size: metadata.len(),
            payload: FilePayload::Path(path.to_path_buf()),
        })
    }

    /// Entry with a declared size and type that may differ from the payload,
    /// as reported by an external file picker.
    pub fn with_declared(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
        payload: FilePayload,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size,
            payload,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn payload(&self) -> &FilePayload {
        &self.payload
    }

    /// Lowercased text after the last `.`; the whole name when there is none.
    pub fn extension(&self) -> String {
        let lower = self.name.to_lowercase();
        match lower.rsplit_once('.') {
            Some((_, ext)) => ext.to_string(),
            None => lower,
        }
    }

    pub fn info(&self) -> FileInfo {
        FileInfo {
            name: self.name.clone(),
            mime_type: self.mime_type.clone(),
            size: self.size,
        }
    }
}

/// Serializable description of a [`FileEntry`] without its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
}

fn guess_mime_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string()
}
