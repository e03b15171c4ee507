//! Error types for the coach-chat library.
//!
//! Three families reflect three distinct failure scopes:
//!
//! * [`ChatError`] — **Fatal**: the client cannot be set up at all (bad
//!   configuration, no webhook URL). Returned as `Err(ChatError)` from
//!   constructors and builders.
//!
//! * [`ExtractionError`] — **Per file**: one attachment could not be turned
//!   into text. Stored in [`crate::output::AttachOutcome`]; the other files of
//!   the same selection keep processing.
//!
//! * [`TransportError`] — **Per send**: one chat turn could not reach the
//!   agent. Stored in [`crate::output::SendOutcome`] and shown as a single
//!   transcript entry; the compose session stays usable.
//!
//! The normalizer, segmenter and Markdown renderer are total and have no
//! error type at all.

use thiserror::Error;

/// Fatal errors returned by the coach-chat library.
#[derive(Debug, Error)]
pub enum ChatError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A webhook transport was requested but no URL is configured.
    #[error("No webhook URL configured.\nSet it with --webhook-url or COACH_CHAT_WEBHOOK_URL.")]
    MissingWebhookUrl,

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// A non-fatal failure to extract text from one uploaded file.
///
/// Every variant renders as `Failed to extract text from <name>: <cause>`
/// so the caller can show it verbatim next to the rejected attachment.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ExtractionError {
    /// The file content could not be read.
    #[error("Failed to extract text from {name}: Failed to read file ({detail})")]
    Unreadable { name: String, detail: String },

    /// The PDF header/xref is corrupt, or the document is encrypted.
    #[error("Failed to extract text from {name}: Invalid or corrupted PDF file ({detail})")]
    InvalidPdf { name: String, detail: String },

    /// The PDF opened fine but no page yielded any text (scanned or image-only).
    #[error("Failed to extract text from {name}: PDF contains no extractable text (may be image-based)")]
    NoExtractableText { name: String },

    /// PDF processing exceeded its wall-clock budget.
    #[error("Failed to extract text from {name}: PDF processing took too long ({secs}s). Please try a smaller file.")]
    Timeout { name: String, secs: u64 },

    /// The pdfium library could not be loaded.
    #[error("Failed to extract text from {name}: PDF engine unavailable ({detail})\nSet PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide.")]
    PdfEngineUnavailable { name: String, detail: String },

    /// The extraction task itself died.
    #[error("Failed to extract text from {name}: {detail}")]
    Internal { name: String, detail: String },
}

impl ExtractionError {
    /// Name of the file this error refers to.
    pub fn file_name(&self) -> &str {
        match self {
            ExtractionError::Unreadable { name, .. }
            | ExtractionError::InvalidPdf { name, .. }
            | ExtractionError::NoExtractableText { name }
            | ExtractionError::Timeout { name, .. }
            | ExtractionError::PdfEngineUnavailable { name, .. }
            | ExtractionError::Internal { name, .. } => name,
        }
    }
}

/// Why one selected file did not become an attachment.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttachmentError {
    /// Size or type limits were violated; the content was never read.
    #[error("{name}: {}", .errors.join("; "))]
    Invalid { name: String, errors: Vec<String> },

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

impl AttachmentError {
    pub fn file_name(&self) -> &str {
        match self {
            AttachmentError::Invalid { name, .. } => name,
            AttachmentError::Extraction(e) => e.file_name(),
        }
    }

    /// Messages to show the user, one per line.
    pub fn messages(&self) -> Vec<String> {
        match self {
            AttachmentError::Invalid { errors, .. } => errors.clone(),
            AttachmentError::Extraction(e) => vec![e.to_string()],
        }
    }
}

/// Why a PDF backend could not open a document.
///
/// Kept separate from [`ExtractionError`] because backends do not know the
/// user-facing file name; the extractor attaches it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PdfOpenError {
    /// The native PDF engine could not be bound.
    #[error("PDF engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The document requires a password.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The bytes are not a parseable PDF.
    #[error("{0}")]
    Malformed(String),
}

/// A non-fatal failure of one outbound chat turn.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TransportError {
    /// The request did not complete within the configured timeout.
    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The agent answered with a non-2xx status.
    #[error("HTTP error! status: {status}")]
    Status { status: u16 },

    /// Connection refused, DNS failure, TLS error, body read failure, …
    #[error("Network error: {0}")]
    Network(String),
}

impl TransportError {
    /// True for the timeout case, which the UI reports as "still processing".
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}
