//! Streaming attachment API: emit documents as each file finishes.
//!
//! A selection of several PDFs can take a while. [`prepare_stream`] yields
//! one result per selected file, strictly in selection order, as soon as that
//! file is done, so callers can show progress or attach documents
//! incrementally. One file failing never ends the stream.

use crate::config::FileLimits;
use crate::error::AttachmentError;
use crate::pipeline::extract::{prepare_attachment, ExtractionContext, UploadedDocument};
use crate::pipeline::input::SelectedFile;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-file attachment results.
pub type AttachmentStream =
    Pin<Box<dyn Stream<Item = Result<UploadedDocument, AttachmentError>> + Send>>;

/// Validate and extract `files` one after another.
pub fn prepare_stream(
    files: Vec<SelectedFile>,
    limits: FileLimits,
    ctx: ExtractionContext,
) -> AttachmentStream {
    info!("Preparing {} selected files", files.len());

    let s = stream::iter(files).then(move |file| {
        let limits = limits.clone();
        let ctx = ctx.clone();
        async move { prepare_attachment(file, &limits, &ctx).await }
    });

    Box::pin(s)
}
