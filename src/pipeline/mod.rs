//! Pipeline stages for attachments (inbound) and replies (outbound).
//!
//! Each submodule implements exactly one transformation step and is
//! independently testable. Only [`extract`] does I/O.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ (payload)      attachments
//!   (file)    (pdf / text)
//!
//! normalize ──▶ segment ──▶ markdown   replies
//!  (raw JSON)   (typed parts) (HTML)
//! ```
//!
//! 1. [`input`]     — describe a selected file (name, declared type, size)
//! 2. [`extract`]   — validate limits and extract plain text; PDFs go through
//!    the [`pdf`] backend on the blocking pool, under a timeout
//! 3. [`normalize`] — pick the best candidate text out of any reply shape
//! 4. [`segment`]   — cut the text into answer / application / next-step /
//!    signature parts
//! 5. [`markdown`]  — render one part as a sanitized, styled HTML fragment

pub mod extract;
pub mod input;
pub mod markdown;
pub mod normalize;
pub mod pdf;
pub mod segment;
