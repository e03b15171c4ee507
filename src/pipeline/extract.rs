//! Attachment validation and text extraction.
//!
//! Attachments are single-use context for one chat turn: the agent only
//! receives their text, so every accepted file is validated against
//! [`FileLimits`] and reduced to a plain string up front.
//!
//! * PDFs are walked page by page on the blocking pool through a
//!   [`PdfBackend`], under a wall-clock timeout. A page that fails is skipped;
//!   a document that yields no text at all is reported as image-based.
//! * Everything else that passed validation is read as (lossy) UTF-8 text.
//!
//! Failures are per file ([`ExtractionError`]); the caller keeps going with
//! the remaining files.

use crate::config::FileLimits;
use crate::error::{AttachmentError, ExtractionError, PdfOpenError};
use crate::pipeline::input::SelectedFile;
use crate::pipeline::pdf::PdfBackend;
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

const MIB: f64 = 1024.0 * 1024.0;

/// Outcome of [`validate_file`]; all violations are listed, not just the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// A validated attachment together with its extracted text. Immutable.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub id: Uuid,
    pub original: SelectedFile,
    pub extracted_text: String,
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
}

impl UploadedDocument {
    pub fn new(original: SelectedFile, extracted_text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: original.name.clone(),
            size_bytes: original.size_bytes,
            mime_type: original.mime_type.clone(),
            original,
            extracted_text,
        }
    }
}

/// What extraction needs besides the file itself.
#[derive(Clone)]
pub struct ExtractionContext {
    pub backend: Arc<dyn PdfBackend>,
    pub pdf_timeout: Duration,
}

impl ExtractionContext {
    pub fn new(backend: Arc<dyn PdfBackend>, pdf_timeout: Duration) -> Self {
        Self {
            backend,
            pdf_timeout,
        }
    }
}

impl std::fmt::Debug for ExtractionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionContext")
            .field("backend", &"<dyn PdfBackend>")
            .field("pdf_timeout", &self.pdf_timeout)
            .finish()
    }
}

/// Check size and declared type. Pure; never touches the content.
pub fn validate_file(file: &SelectedFile, limits: &FileLimits) -> FileValidationResult {
    let mut errors = Vec::new();

    if file.size_bytes > limits.max_file_size_bytes {
        errors.push(format!(
            "File size ({:.2}MB) exceeds the maximum allowed size of {}",
            file.size_bytes as f64 / MIB,
            format_limit(limits.max_file_size_bytes)
        ));
    }

    if !limits.allows(&file.mime_type) {
        errors.push(format!(
            "File type \"{}\" is not supported. Please upload PDF or text documents.",
            file.mime_type
        ));
    }

    FileValidationResult {
        is_valid: errors.is_empty(),
        errors,
    }
}

/// Produce the plain text of `file`.
pub async fn extract_text(
    file: &SelectedFile,
    ctx: &ExtractionContext,
) -> Result<String, ExtractionError> {
    let result = if file.is_pdf() {
        extract_pdf_text(file, ctx).await
    } else {
        extract_plain_text(file).await
    };

    match &result {
        Ok(text) => info!("Extracted {} chars from {}", text.len(), file.name),
        Err(e) => warn!("{}", e),
    }
    result
}

/// Validate, then extract; the whole per-file path used by the compose session.
pub async fn prepare_attachment(
    file: SelectedFile,
    limits: &FileLimits,
    ctx: &ExtractionContext,
) -> Result<UploadedDocument, AttachmentError> {
    let validation = validate_file(&file, limits);
    if !validation.is_valid {
        warn!("Rejected {}: {}", file.name, validation.errors.join("; "));
        return Err(AttachmentError::Invalid {
            name: file.name.clone(),
            errors: validation.errors,
        });
    }

    let text = extract_text(&file, ctx).await?;
    Ok(UploadedDocument::new(file, text))
}

async fn extract_plain_text(file: &SelectedFile) -> Result<String, ExtractionError> {
    let bytes = file
        .read_bytes()
        .await
        .map_err(|e| ExtractionError::Unreadable {
            name: file.name.clone(),
            detail: e.to_string(),
        })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Read + parse under `ctx.pdf_timeout`; on expiry the page walk is cancelled.
async fn extract_pdf_text(
    file: &SelectedFile,
    ctx: &ExtractionContext,
) -> Result<String, ExtractionError> {
    let cancel = CancellationToken::new();
    let work = run_pdf_extraction(file, Arc::clone(&ctx.backend), cancel.clone());

    match tokio::time::timeout(ctx.pdf_timeout, work).await {
        Ok(result) => result,
        Err(_) => {
            cancel.cancel();
            Err(ExtractionError::Timeout {
                name: file.name.clone(),
                secs: ctx.pdf_timeout.as_secs(),
            })
        }
    }
}

async fn run_pdf_extraction(
    file: &SelectedFile,
    backend: Arc<dyn PdfBackend>,
    cancel: CancellationToken,
) -> Result<String, ExtractionError> {
    let bytes = file
        .read_bytes()
        .await
        .map_err(|e| ExtractionError::Unreadable {
            name: file.name.clone(),
            detail: e.to_string(),
        })?;

    let name = file.name.clone();
    tokio::task::spawn_blocking(move || collect_pdf_text(&name, backend.as_ref(), &bytes, &cancel))
        .await
        .map_err(|e| ExtractionError::Internal {
            name: file.name.clone(),
            detail: format!("PDF task panicked: {}", e),
        })?
}

/// Blocking page walk: items joined by spaces, pages by newlines.
fn collect_pdf_text(
    name: &str,
    backend: &dyn PdfBackend,
    bytes: &[u8],
    cancel: &CancellationToken,
) -> Result<String, ExtractionError> {
    let mut full_text = String::new();

    let total = backend
        .visit_pages(bytes, &mut |page| {
            if cancel.is_cancelled() {
                return ControlFlow::Break(());
            }
            match page.items {
                Ok(items) => {
                    full_text.push_str(&items.join(" "));
                    full_text.push('\n');
                }
                Err(e) => warn!("{}: skipping page {}: {}", name, page.page_num, e),
            }
            ControlFlow::Continue(())
        })
        .map_err(|e| match e {
            PdfOpenError::EngineUnavailable(detail) => ExtractionError::PdfEngineUnavailable {
                name: name.to_string(),
                detail,
            },
            PdfOpenError::Encrypted => ExtractionError::InvalidPdf {
                name: name.to_string(),
                detail: "document is encrypted".to_string(),
            },
            PdfOpenError::Malformed(detail) => ExtractionError::InvalidPdf {
                name: name.to_string(),
                detail,
            },
        })?;

    debug!("{}: walked {} pages", name, total);

    let text = full_text.trim();
    if text.is_empty() {
        return Err(ExtractionError::NoExtractableText {
            name: name.to_string(),
        });
    }
    Ok(text.to_string())
}

/// `20MB`, or `0.50MB` for limits that are not whole MiB.
fn format_limit(bytes: u64) -> String {
    if bytes % (1024 * 1024) == 0 {
        format!("{}MB", bytes / (1024 * 1024))
    } else {
        format!("{:.2}MB", bytes as f64 / MIB)
    }
}

/// Human-readable size: `0 Bytes`, `512 Bytes`, `1.5 KB`, `20 MB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

/// Glyph shown next to an attachment chip.
pub fn file_icon(mime_type: &str) -> &'static str {
    if mime_type == "application/pdf" {
        "📄"
    } else if mime_type.starts_with("text/") {
        "📝"
    } else if mime_type.contains("word") {
        "📄"
    } else {
        "📎"
    }
}
