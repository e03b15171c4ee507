//! # coach-chat
//!
//! Client core for a conversational HR coach reached through a webhook.
//!
//! ## Why this crate?
//!
//! The agent behind the webhook is a workflow, not a chat API: its reply can
//! be a bare string, `{"output": ...}`, an array of node outputs or something
//! else again, and the text inside follows house conventions (section
//! labels, citations, a signature). This crate turns that into a stable,
//! typed, safely-rendered transcript, and turns user attachments into plain
//! text the agent can read.
//!
//! ## Pipeline Overview
//!
//! ```text
//! files ─▶ validate ─▶ extract (pdfium / text) ─┐
//!                                               ▼
//! message ─────────────────────────────▶ payload ─▶ webhook (timeout)
//!                                                        │
//!     transcript ◀─ render ◀─ segment ◀─ normalize ◀─────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use coach_chat::{ChatSession, ClientConfig, Credential, SessionIdentity};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .webhook_url("https://agent.example.org/webhook/chat")
//!         .build()?;
//!     let me = SessionIdentity::new("user-1", "pat@example.org", Credential::new("jwt"));
//!
//!     let mut chat = ChatSession::connect(config, me)?;
//!     chat.send("How many days of leave do I get?").await;
//!     for entry in chat.transcript() {
//!         println!("{:?}: {}", entry.speaker, entry.text());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `coach-chat` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! coach-chat = { version = "0.1", default-features = false }
//! ```
//!
//! ## PDF support
//!
//! PDF text is read with pdfium. The shared library is taken from
//! [`ClientConfig::pdfium_library_path`] or, if unset, from the system
//! library path. Without it, PDF attachments are rejected with
//! [`ExtractionError::PdfEngineUnavailable`]; text attachments still work.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod chat;
pub mod config;
pub mod error;
pub mod messages;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod session;
pub mod stream;
pub mod transport;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use chat::{file_context, ChatSession, SendingIndicator};
pub use config::{AssistantIdentity, ClientConfig, ClientConfigBuilder, FileLimits, RenderOptions};
pub use error::{AttachmentError, ChatError, ExtractionError, PdfOpenError, TransportError};
pub use output::{AttachOutcome, ChatEntry, EntryBody, SendOutcome, Speaker};
pub use pipeline::extract::{
    extract_text, file_icon, format_file_size, prepare_attachment, validate_file,
    ExtractionContext, FileValidationResult, UploadedDocument,
};
pub use pipeline::input::{FileDescriptor, FileSource, SelectedFile};
pub use pipeline::markdown::MarkdownRenderer;
pub use pipeline::normalize::{normalize, RawResponse};
pub use pipeline::pdf::{PageText, PdfBackend, PdfiumBackend};
pub use pipeline::segment::{segment, MessagePart, MessageSegmenter, PartKind};
pub use progress::{ComposeObserver, NoopObserver, Observer};
pub use session::{Credential, SessionIdentity};
pub use stream::{prepare_stream, AttachmentStream};
pub use transport::{OutboundPayload, Transport, WebhookTransport};
