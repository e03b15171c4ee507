//! Chat orchestration: one compose session, its attachments and transcript.
//!
//! ## Flow of one turn
//!
//! ```text
//! attach_files ──▶ validate + extract (in order) ──▶ attachments
//!                                                       │
//! send ──▶ user entry + "Typing..." ──▶ payload ────────┘
//!            │
//!            ▼
//!       transport (timeout) ──▶ normalize ──▶ segment ──▶ render ──▶ entries
//! ```
//!
//! Every failure below this point is recorded in the transcript as an
//! assistant line; no `Err` escapes `send` or `attach_files`. Transient lines
//! (typing indicator, per-file processing status) are removed on every path,
//! including a dropped call, which is cleaned up on the next call.

use crate::config::ClientConfig;
use crate::error::{ChatError, TransportError};
use crate::messages;
use crate::output::{AttachOutcome, ChatEntry, SendOutcome};
use crate::pipeline::extract::{ExtractionContext, UploadedDocument};
use crate::pipeline::input::SelectedFile;
use crate::pipeline::markdown::MarkdownRenderer;
use crate::pipeline::normalize::normalize;
use crate::pipeline::pdf::{PdfBackend, PdfiumBackend};
use crate::pipeline::segment::MessageSegmenter;
use crate::progress::{NoopObserver, Observer};
use crate::session::SessionIdentity;
use crate::stream::prepare_stream;
use crate::transport::{iso_timestamp, OutboundPayload, Transport, WebhookTransport};
use chrono::Utc;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Read-only view of whether a send is outstanding; cheap to clone into a UI.
#[derive(Debug, Clone)]
pub struct SendingIndicator(Arc<AtomicBool>);

impl SendingIndicator {
    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Raises the in-flight flag; lowered on drop, even if the send is cancelled.
///
/// Exclusion itself comes from `send(&mut self)`: a second send cannot start
/// while the first future is alive. The flag only reports it.
struct SendingGuard(Arc<AtomicBool>);

impl SendingGuard {
    fn raise(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(Arc::clone(flag))
    }
}

impl Drop for SendingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A signed-in user's conversation with the coach.
pub struct ChatSession {
    config: ClientConfig,
    identity: SessionIdentity,
    transport: Arc<dyn Transport>,
    extraction: ExtractionContext,
    segmenter: MessageSegmenter,
    renderer: MarkdownRenderer,
    observer: Observer,
    transcript: Vec<ChatEntry>,
    attachments: Vec<UploadedDocument>,
    sending: Arc<AtomicBool>,
}

impl ChatSession {
    /// Session over an arbitrary transport, with pdfium for PDFs.
    pub fn new(
        config: ClientConfig,
        identity: SessionIdentity,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let backend: Arc<dyn PdfBackend> =
            Arc::new(PdfiumBackend::new(config.pdfium_library_path.clone()));
        let extraction =
            ExtractionContext::new(backend, Duration::from_secs(config.pdf_timeout_secs));
        Self {
            segmenter: MessageSegmenter::new(&config.assistant),
            renderer: MarkdownRenderer::new(config.render, config.assistant.clone()),
            config,
            identity,
            transport,
            extraction,
            observer: Arc::new(NoopObserver),
            transcript: Vec::new(),
            attachments: Vec::new(),
            sending: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Session talking to the configured webhook.
    pub fn connect(config: ClientConfig, identity: SessionIdentity) -> Result<Self, ChatError> {
        let transport = WebhookTransport::from_config(&config)?;
        info!("Chat session for {} via {}", identity.email, transport.url());
        Ok(Self::new(config, identity, Arc::new(transport)))
    }

    pub fn with_pdf_backend(mut self, backend: Arc<dyn PdfBackend>) -> Self {
        self.extraction.backend = backend;
        self
    }

    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn transcript(&self) -> &[ChatEntry] {
        &self.transcript
    }

    pub fn attachments(&self) -> &[UploadedDocument] {
        &self.attachments
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::SeqCst)
    }

    pub fn sending_indicator(&self) -> SendingIndicator {
        SendingIndicator(Arc::clone(&self.sending))
    }

    /// Validate and extract `files` in selection order.
    ///
    /// PDFs show a processing line while their pages are read. Accepted files
    /// become attachments; each rejected file leaves one
    /// notice per problem in the transcript.
    pub async fn attach_files(&mut self, files: Vec<SelectedFile>) -> AttachOutcome {
        self.drop_transient();
        let names: Vec<(String, bool)> = files
            .iter()
            .map(|f| (f.name.clone(), f.is_pdf()))
            .collect();
        let mut results = prepare_stream(
            files,
            self.config.limits.clone(),
            self.extraction.clone(),
        );

        let mut outcome = AttachOutcome::default();
        for (name, is_pdf) in names {
            if is_pdf {
                self.transcript
                    .push(ChatEntry::processing(&name, messages::processing_file(&name)));
                self.observer.on_file_processing(&name);
            }

            let Some(result) = results.next().await else {
                break;
            };
            self.drop_transient();

            match result {
                Ok(doc) => {
                    info!("Attached {} ({} chars)", doc.name, doc.extracted_text.len());
                    self.observer
                        .on_file_attached(&doc.name, doc.extracted_text.len());
                    outcome.attached.push(doc.id);
                    self.attachments.push(doc);
                }
                Err(e) => {
                    let lines = e.messages();
                    self.observer.on_file_rejected(e.file_name(), &lines.join("\n"));
                    for line in lines {
                        self.transcript.push(ChatEntry::notice(line));
                    }
                    outcome.rejected.push(e);
                }
            }
        }
        self.drop_transient();
        outcome
    }

    /// Forget one attachment. Returns false if it was not held.
    pub fn remove_attachment(&mut self, id: Uuid) -> bool {
        let before = self.attachments.len();
        self.attachments.retain(|d| d.id != id);
        self.attachments.len() != before
    }

    /// Send one chat turn with the current attachments.
    pub async fn send(&mut self, input: &str) -> SendOutcome {
        if input.trim().is_empty() {
            debug!("Ignoring empty input");
            return SendOutcome::Ignored;
        }
        let _guard = SendingGuard::raise(&self.sending);
        self.drop_transient();

        self.transcript.push(ChatEntry::user(input));
        self.transcript
            .push(ChatEntry::typing(messages::TYPING_INDICATOR));

        let payload = self.build_payload(input);
        self.observer.on_send_started(self.attachments.len());

        let secs = self.config.request_timeout_secs;
        let result = match tokio::time::timeout(
            Duration::from_secs(secs),
            self.transport.post(&payload, &self.identity.access_token),
        )
        .await
        {
            Ok(r) => r,
            Err(_) => Err(TransportError::Timeout { secs }),
        };

        self.drop_transient();

        match result {
            Ok(raw) => {
                let parts = self.present(&normalize(&raw));
                self.attachments.clear();
                self.observer.on_send_finished(true);
                SendOutcome::Delivered { parts }
            }
            Err(e) => {
                warn!("Chat turn failed: {}", e);
                let line = if e.is_timeout() {
                    messages::STILL_PROCESSING
                } else {
                    messages::CONNECTION_ERROR
                };
                self.transcript.push(ChatEntry::notice(line));
                self.observer.on_send_finished(false);
                SendOutcome::Failed(e)
            }
        }
    }

    /// Segment and render a normalised reply into transcript entries.
    fn present(&mut self, text: &str) -> usize {
        let parts = self.segmenter.segment(text);
        if parts.is_empty() {
            info!("Agent reply was empty after normalisation");
            self.transcript.push(ChatEntry::notice(messages::EMPTY_REPLY));
            return 0;
        }

        let count = parts.len();
        for part in parts {
            let html = self.renderer.render(&part.text);
            self.transcript.push(ChatEntry::part(part, html));
        }
        info!("Agent reply shown as {} parts", count);
        count
    }

    fn build_payload(&self, input: &str) -> OutboundPayload {
        OutboundPayload {
            chat_input: input.to_string(),
            user_id: self.identity.user_id.clone(),
            session_id: self.identity.session_id().to_string(),
            email: self.identity.email.clone(),
            timestamp: iso_timestamp(Utc::now()),
            file_context: file_context(&self.attachments),
            attached_files: self
                .attachments
                .iter()
                .map(|d| d.original.descriptor())
                .collect(),
        }
    }

    fn drop_transient(&mut self) {
        self.transcript.retain(|e| !e.is_transient());
    }
}

/// `--- File: name ---` blocks separated by blank lines.
pub fn file_context(documents: &[UploadedDocument]) -> String {
    documents
        .iter()
        .map(|d| format!("{}\n{}", messages::file_context_header(&d.name), d.extracted_text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PdfOpenError;
    use crate::output::EntryBody;
    use crate::pipeline::normalize::RawResponse;
    use crate::pipeline::pdf::PageText;
    use crate::pipeline::segment::PartKind;
    use crate::session::Credential;
    use async_trait::async_trait;
    use std::ops::ControlFlow;
    use std::sync::Mutex;

    /// Records payloads and replies with a scripted result after `delay`.
    struct ScriptedTransport {
        reply: Result<RawResponse, TransportError>,
        delay: Duration,
        seen: Mutex<Vec<OutboundPayload>>,
    }

    impl ScriptedTransport {
        fn replying(reply: Result<RawResponse, TransportError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn post(
            &self,
            payload: &OutboundPayload,
            _credential: &Credential,
        ) -> Result<RawResponse, TransportError> {
            self.seen.lock().unwrap().push(payload.clone());
            tokio::time::sleep(self.delay).await;
            self.reply.clone()
        }
    }

    struct NoPdf;

    impl PdfBackend for NoPdf {
        fn visit_pages(
            &self,
            _bytes: &[u8],
            _visit: &mut dyn FnMut(PageText) -> ControlFlow<()>,
        ) -> Result<usize, PdfOpenError> {
            Err(PdfOpenError::Malformed("not a pdf".into()))
        }
    }

    fn session(transport: Arc<dyn Transport>) -> ChatSession {
        let id = SessionIdentity::new("u-1", "pat@example.org", Credential::new("tok"));
        ChatSession::new(ClientConfig::default(), id, transport).with_pdf_backend(Arc::new(NoPdf))
    }

    fn text(raw: &str) -> Result<RawResponse, TransportError> {
        Ok(RawResponse::from_body(raw))
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let t = ScriptedTransport::replying(text(r#"{"output":"hi"}"#));
        let mut s = session(t.clone());
        assert_eq!(s.send("   ").await, SendOutcome::Ignored);
        assert!(s.transcript().is_empty());
        assert!(t.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delivered_reply_is_segmented_and_rendered() {
        let reply = r#"[{"output":"You get 25 days.\nHow it applies: Full-time staff.\nNext step: Ask HR.\nAnnie – HR Business Coach"}]"#;
        let mut s = session(ScriptedTransport::replying(text(reply)));

        let outcome = s.send("How much leave?").await;
        assert_eq!(outcome, SendOutcome::Delivered { parts: 4 });

        let t = s.transcript();
        assert_eq!(t[0], ChatEntry::user("How much leave?"));
        let kinds: Vec<PartKind> = t[1..]
            .iter()
            .map(|e| match &e.body {
                EntryBody::Part { part, .. } => part.kind,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                PartKind::Answer,
                PartKind::Application,
                PartKind::NextStep,
                PartKind::Signature
            ]
        );
        assert!(t.iter().all(|e| !e.is_transient()));
        assert!(!s.is_sending());
    }

    #[tokio::test]
    async fn empty_reply_shows_notice() {
        let mut s = session(ScriptedTransport::replying(text(r#"{"unexpected":true}"#)));
        assert_eq!(s.send("hi").await, SendOutcome::Delivered { parts: 0 });
        assert_eq!(s.transcript().last().unwrap().text(), messages::EMPTY_REPLY);
    }

    #[tokio::test]
    async fn http_error_shows_connection_notice() {
        let err = TransportError::Status { status: 500 };
        let mut s = session(ScriptedTransport::replying(Err(err.clone())));
        assert_eq!(s.send("hi").await, SendOutcome::Failed(err));
        assert_eq!(s.transcript().len(), 2);
        assert_eq!(s.transcript()[1].text(), messages::CONNECTION_ERROR);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_agent_times_out_with_processing_notice() {
        let t = Arc::new(ScriptedTransport {
            reply: text("late"),
            delay: Duration::from_secs(120),
            seen: Mutex::new(Vec::new()),
        });
        let mut s = session(t);

        let outcome = s.send("hi").await;
        assert_eq!(outcome, SendOutcome::Failed(TransportError::Timeout { secs: 60 }));
        assert_eq!(s.transcript()[0], ChatEntry::user("hi"));
        assert_eq!(s.transcript()[1].text(), messages::STILL_PROCESSING);
        assert_eq!(s.transcript().len(), 2);
    }

    #[tokio::test]
    async fn dropped_send_releases_flag_and_typing_is_cleaned_up() {
        let t = Arc::new(ScriptedTransport {
            reply: text(r#"{"output":"ok"}"#),
            delay: Duration::from_secs(3600),
            seen: Mutex::new(Vec::new()),
        });
        let mut s = session(t);
        let indicator = s.sending_indicator();

        {
            let fut = s.send("first");
            tokio::pin!(fut);
            let polled = futures::poll!(fut.as_mut());
            assert!(polled.is_pending());
            assert!(indicator.is_active());
        }
        assert!(!s.is_sending());
        assert!(s.transcript().iter().any(|e| e.is_transient()));

        let outcome = s.attach_files(vec![]).await;
        assert!(outcome.all_attached());
        assert!(s.transcript().iter().all(|e| !e.is_transient()));
    }

    #[tokio::test]
    async fn attachments_ride_along_then_clear() {
        let t = ScriptedTransport::replying(text(r#"{"output":"Noted."}"#));
        let mut s = session(t.clone());

        let outcome = s
            .attach_files(vec![
                SelectedFile::from_bytes("a.txt", "text/plain", b"alpha".to_vec()),
                SelectedFile::from_bytes("b.md", "text/markdown", b"# beta".to_vec()),
            ])
            .await;
        assert_eq!(outcome.attached.len(), 2);
        assert_eq!(s.attachments().len(), 2);

        s.send("Summarise").await;
        let payload = t.seen.lock().unwrap()[0].clone();
        assert_eq!(
            payload.file_context,
            "--- File: a.txt ---\nalpha\n\n--- File: b.md ---\n# beta"
        );
        assert_eq!(payload.attached_files.len(), 2);
        assert_eq!(payload.attached_files[1].name, "b.md");
        assert_eq!(payload.session_id, "u-1");
        assert!(s.attachments().is_empty());
    }

    #[tokio::test]
    async fn failed_send_keeps_attachments() {
        let mut s = session(ScriptedTransport::replying(Err(TransportError::Network(
            "refused".into(),
        ))));
        s.attach_files(vec![SelectedFile::from_bytes(
            "a.txt",
            "text/plain",
            b"alpha".to_vec(),
        )])
        .await;
        s.send("hi").await;
        assert_eq!(s.attachments().len(), 1);
    }

    #[tokio::test]
    async fn rejected_files_leave_notices_and_others_continue() {
        let mut s = session(ScriptedTransport::replying(text("ok")));
        let outcome = s
            .attach_files(vec![
                SelectedFile::from_bytes("pic.png", "image/png", vec![0; 4]),
                SelectedFile::from_bytes("bad.pdf", "application/pdf", b"junk".to_vec()),
                SelectedFile::from_bytes("ok.txt", "text/plain", b"fine".to_vec()),
            ])
            .await;

        assert_eq!(outcome.attached.len(), 1);
        assert_eq!(outcome.rejected.len(), 2);
        assert_eq!(s.attachments()[0].name, "ok.txt");

        let notices: Vec<&str> = s.transcript().iter().map(|e| e.text()).collect();
        assert_eq!(notices.len(), 2);
        assert!(notices[0].contains("\"image/png\""));
        assert!(notices[1].starts_with("Failed to extract text from bad.pdf"));
    }

    #[derive(Default)]
    struct ProcessingLog(Mutex<Vec<String>>);

    impl crate::progress::ComposeObserver for ProcessingLog {
        fn on_file_processing(&self, name: &str) {
            self.0.lock().unwrap().push(name.to_string());
        }
    }

    #[tokio::test]
    async fn processing_status_is_only_shown_for_pdfs() {
        let log = Arc::new(ProcessingLog::default());
        let mut s = session(ScriptedTransport::replying(text("ok"))).with_observer(log.clone());
        s.attach_files(vec![
            SelectedFile::from_bytes("notes.txt", "text/plain", b"fine".to_vec()),
            SelectedFile::from_bytes("policy.pdf", "application/pdf", b"%PDF".to_vec()),
            SelectedFile::from_bytes("notes.md", "text/markdown", b"# ok".to_vec()),
        ])
        .await;

        assert_eq!(*log.0.lock().unwrap(), vec!["policy.pdf".to_string()]);
        assert!(s.transcript().iter().all(|e| !e.is_transient()));
    }

    #[tokio::test]
    async fn remove_attachment_by_id() {
        let mut s = session(ScriptedTransport::replying(text("ok")));
        let outcome = s
            .attach_files(vec![SelectedFile::from_bytes("a.txt", "text/plain", b"a".to_vec())])
            .await;
        let id = outcome.attached[0];
        assert!(s.remove_attachment(id));
        assert!(!s.remove_attachment(id));
        assert!(s.attachments().is_empty());
    }

    #[test]
    fn connect_requires_webhook() {
        let id = SessionIdentity::new("u", "e", Credential::new("t"));
        let err = ChatSession::connect(ClientConfig::default(), id).err().unwrap();
        assert!(matches!(err, ChatError::MissingWebhookUrl));
    }
}
