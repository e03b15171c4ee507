//! Input resolution: turn a user-selected file into a [`SelectedFile`] handle.
//!
//! A handle carries what the browser's `File` object would: a display name,
//! the declared MIME type and the size. Validation only ever looks at those
//! three fields; the content is read lazily by the extractor so an oversized
//! or unsupported file is rejected without touching its bytes.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// MIME type assigned to extensions we do not recognise.
pub const UNKNOWN_MIME_TYPE: &str = "application/octet-stream";

/// Where the content of a [`SelectedFile`] lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// On disk; read when extraction starts.
    Path(PathBuf),
    /// Already in memory (drag-and-drop, tests, HTTP upload bodies).
    Bytes(Vec<u8>),
}

/// Opaque handle for a file the user picked for attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub source: FileSource,
}

/// The `{name, size, type}` triple sent to the agent alongside the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
}

impl SelectedFile {
    /// Wrap in-memory content with an explicitly declared MIME type.
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size_bytes: bytes.len() as u64,
            source: FileSource::Bytes(bytes),
        }
    }

    /// Stat a local file and infer its MIME type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = mime_from_extension(path).to_string();
        debug!(
            "Selected {} ({} bytes, {})",
            path.display(),
            meta.len(),
            mime_type
        );
        Ok(Self {
            name,
            mime_type,
            size_bytes: meta.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == "application/pdf"
    }

    pub fn descriptor(&self) -> FileDescriptor {
        FileDescriptor {
            name: self.name.clone(),
            size: self.size_bytes,
            mime_type: self.mime_type.clone(),
        }
    }

    /// Load the full content.
    pub async fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        match &self.source {
            FileSource::Path(p) => tokio::fs::read(p).await,
            FileSource::Bytes(b) => Ok(b.clone()),
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Map a file extension to the MIME type a browser would declare for it.
pub fn mime_from_extension(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "txt" | "text" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => UNKNOWN_MIME_TYPE,
    }
}
