//! Observer trait for compose-session events.
//!
//! Inject an [`Arc<dyn ComposeObserver>`] via
//! [`crate::chat::ChatSession::with_observer`] to follow attachment
//! processing and outbound sends as they happen, e.g. to drive a spinner or
//! forward events to a UI channel.
//!
//! # Example
//!
//! ```rust
//! use coach_chat::ComposeObserver;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingObserver {
//!     attached: Arc<AtomicUsize>,
//! }
//!
//! impl ComposeObserver for CountingObserver {
//!     fn on_file_attached(&self, name: &str, text_len: usize) {
//!         self.attached.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{} attached ({} chars)", name, text_len);
//!     }
//! }
//!
//! let observer: Arc<dyn ComposeObserver> = Arc::new(CountingObserver {
//!     attached: Arc::new(AtomicUsize::new(0)),
//! });
//! observer.on_file_attached("policy.pdf", 1200);
//! ```

use std::sync::Arc;

/// Called by [`crate::chat::ChatSession`] as it processes files and sends.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ComposeObserver: Send + Sync {
    /// A file is about to be validated and extracted.
    fn on_file_processing(&self, name: &str) {
        let _ = name;
    }

    /// A file passed and its text is held as an attachment.
    ///
    /// * `text_len` — byte length of the extracted text
    fn on_file_attached(&self, name: &str, text_len: usize) {
        let _ = (name, text_len);
    }

    /// A file was rejected by validation or extraction.
    ///
    /// * `reason` — the user-facing message(s), joined by newlines
    fn on_file_rejected(&self, name: &str, reason: &str) {
        let _ = (name, reason);
    }

    /// A chat turn is being posted.
    ///
    /// * `attachments` — number of documents sent with it
    fn on_send_started(&self, attachments: usize) {
        let _ = attachments;
    }

    /// The chat turn finished.
    ///
    /// * `delivered` — false on timeout or transport failure
    fn on_send_finished(&self, delivered: bool) {
        let _ = delivered;
    }
}

/// Default observer; ignores every event.
pub struct NoopObserver;

impl ComposeObserver for NoopObserver {}

/// Shared observer handle as stored by the session.
pub type Observer = Arc<dyn ComposeObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingObserver {
        processing: AtomicUsize,
        attached: AtomicUsize,
        rejected: AtomicUsize,
        delivered: AtomicUsize,
        failed: AtomicUsize,
    }

    impl ComposeObserver for TrackingObserver {
        fn on_file_processing(&self, _name: &str) {
            self.processing.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_attached(&self, _name: &str, _text_len: usize) {
            self.attached.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_rejected(&self, _name: &str, _reason: &str) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
        }

        fn on_send_finished(&self, delivered: bool) {
            if delivered {
                self.delivered.fetch_add(1, Ordering::SeqCst);
            } else {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let o = NoopObserver;
        o.on_file_processing("a.pdf");
        o.on_file_attached("a.pdf", 10);
        o.on_file_rejected("b.png", "unsupported");
        o.on_send_started(1);
        o.on_send_finished(true);
    }

    #[test]
    fn tracking_observer_receives_events() {
        let t = TrackingObserver::default();
        t.on_file_processing("a.pdf");
        t.on_file_attached("a.pdf", 10);
        t.on_file_processing("b.png");
        t.on_file_rejected("b.png", "unsupported");
        t.on_send_started(1);
        t.on_send_finished(false);

        assert_eq!(t.processing.load(Ordering::SeqCst), 2);
        assert_eq!(t.attached.load(Ordering::SeqCst), 1);
        assert_eq!(t.rejected.load(Ordering::SeqCst), 1);
        assert_eq!(t.delivered.load(Ordering::SeqCst), 0);
        assert_eq!(t.failed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_observer_works() {
        let o: Observer = Arc::new(NoopObserver);
        o.on_send_started(0);
    }
}
