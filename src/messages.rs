//! User-visible strings shown as assistant transcript entries.
//!
//! Every canned line lives here so wording changes touch one place and tests
//! can assert against the constants instead of copies.

/// Placeholder shown while a chat turn is outstanding.
pub const TYPING_INDICATOR: &str = "Typing...";

/// The request hit its timeout; the agent may still be working on it.
pub const STILL_PROCESSING: &str =
    "I'm still processing your request. Please wait a moment and try again.";

/// Any other transport failure (network, non-2xx status).
pub const CONNECTION_ERROR: &str = "Sorry, I encountered a connection error. Please try again.";

/// The agent answered, but nothing displayable survived normalisation.
pub const EMPTY_REPLY: &str = "I didn't receive a response. Please try again.";

/// Status line shown while one attachment is being processed.
pub fn processing_file(name: &str) -> String {
    format!("Processing {}...", name)
}

/// Header that introduces one document inside the outbound file context.
pub fn file_context_header(name: &str) -> String {
    format!("--- File: {} ---", name)
}
