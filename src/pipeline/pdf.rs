//! PDF text access: walk the pages of a document and hand back their text.
//!
//! ## Why a trait?
//!
//! The production engine is pdfium (via `pdfium-render`), a native library
//! that may be missing on a developer machine or in CI. The extractor only
//! needs "give me each page's text items, in order", so that is all the
//! [`PdfBackend`] seam exposes. Tests plug in in-memory fakes.
//!
//! ## Threading
//!
//! pdfium keeps thread-local state and blocks; backends are always driven
//! from `tokio::task::spawn_blocking` by [`crate::pipeline::extract`], never
//! from an async worker thread.

use crate::error::PdfOpenError;
use pdfium_render::prelude::*;
use std::ops::ControlFlow;
use std::path::PathBuf;
use tracing::{debug, info};

/// Text of one page, or why that page could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-indexed.
    pub page_num: usize,
    pub items: Result<Vec<String>, String>,
}

/// A PDF engine able to enumerate page text.
pub trait PdfBackend: Send + Sync {
    /// Open `bytes` and call `visit` once per page, in page order.
    ///
    /// A page-level failure is reported through [`PageText::items`] and does
    /// not stop the walk. Returning `ControlFlow::Break` from `visit` stops it
    /// early. Returns the document's page count.
    fn visit_pages(
        &self,
        bytes: &[u8],
        visit: &mut dyn FnMut(PageText) -> ControlFlow<()>,
    ) -> Result<usize, PdfOpenError>;
}

/// [`PdfBackend`] backed by the pdfium shared library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    /// Explicit library file; the system library is used when None.
    library_path: Option<PathBuf>,
}

impl PdfiumBackend {
    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }

    fn bind(&self) -> Result<Pdfium, PdfOpenError> {
        let bindings = match &self.library_path {
            Some(path) => {
                let path = path.to_string_lossy().to_string();
                debug!("Binding pdfium from {}", path);
                Pdfium::bind_to_library(&path)
            }
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| PdfOpenError::EngineUnavailable(format!("{:?}", e)))?;

        Ok(Pdfium::new(bindings))
    }
}

impl PdfBackend for PdfiumBackend {
    fn visit_pages(
        &self,
        bytes: &[u8],
        visit: &mut dyn FnMut(PageText) -> ControlFlow<()>,
    ) -> Result<usize, PdfOpenError> {
        let pdfium = self.bind()?;

        let document = pdfium.load_pdf_from_byte_slice(bytes, None).map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                PdfOpenError::Encrypted
            } else {
                PdfOpenError::Malformed(err_str)
            }
        })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages", total_pages);

        for idx in 0..total_pages {
            let items = pages
                .get(idx as u16)
                .and_then(|page| page.text().map(|text| text_items(&text.all())))
                .map_err(|e| format!("{:?}", e));

            let page = PageText {
                page_num: idx + 1,
                items,
            };
            if visit(page).is_break() {
                debug!("Page walk stopped after page {}", idx + 1);
                break;
            }
        }

        Ok(total_pages)
    }
}

/// Split pdfium's flattened page text into trimmed, non-empty line items.
fn text_items(all: &str) -> Vec<String> {
    all.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
