//! Result types: transcript entries and per-call outcomes.
//!
//! A [`ChatEntry`] is what a UI draws; [`SendOutcome`] and [`AttachOutcome`]
//! tell the caller what a single session call did, including failures that
//! were recorded in the transcript rather than returned as `Err`.

use crate::error::{AttachmentError, TransportError};
use crate::pipeline::segment::MessagePart;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who a transcript line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

/// Content of one transcript line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EntryBody {
    /// Text typed by the user.
    Text { text: String },
    /// Transient placeholder while a send is outstanding.
    Typing { text: String },
    /// Transient status while one attachment is processed.
    Processing { file: String, text: String },
    /// One segment of an assistant reply and its rendered HTML.
    Part { part: MessagePart, html: String },
    /// A canned assistant line (errors, empty reply) or a per-file problem.
    Notice { text: String },
}

/// One line of the chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub speaker: Speaker,
    pub body: EntryBody,
}

impl ChatEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            body: EntryBody::Text { text: text.into() },
        }
    }

    pub fn typing(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            body: EntryBody::Typing { text: text.into() },
        }
    }

    pub fn processing(file: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            body: EntryBody::Processing {
                file: file.into(),
                text: text.into(),
            },
        }
    }

    pub fn part(part: MessagePart, html: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            body: EntryBody::Part {
                part,
                html: html.into(),
            },
        }
    }

    pub fn notice(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            body: EntryBody::Notice { text: text.into() },
        }
    }

    /// Typing and processing entries; removed before a call returns.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.body,
            EntryBody::Typing { .. } | EntryBody::Processing { .. }
        )
    }

    /// Plain text of the entry, for terminals and logs.
    pub fn text(&self) -> &str {
        match &self.body {
            EntryBody::Text { text }
            | EntryBody::Typing { text }
            | EntryBody::Processing { text, .. }
            | EntryBody::Notice { text } => text,
            EntryBody::Part { part, .. } => &part.text,
        }
    }
}

/// What one [`crate::chat::ChatSession::send`] call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Empty input, or another send was still outstanding. Nothing changed.
    Ignored,
    /// The agent answered; `parts` entries were appended (0 means the
    /// empty-reply notice was shown instead).
    Delivered { parts: usize },
    /// The turn could not be delivered; a notice was appended.
    Failed(TransportError),
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered { .. })
    }
}

/// Per-file results of one [`crate::chat::ChatSession::attach_files`] call,
/// in selection order.
#[derive(Debug, Clone, Default)]
pub struct AttachOutcome {
    /// Ids of documents now held by the session.
    pub attached: Vec<Uuid>,
    pub rejected: Vec<AttachmentError>,
}

impl AttachOutcome {
    pub fn all_attached(&self) -> bool {
        self.rejected.is_empty()
    }
}
