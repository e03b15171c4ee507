//! Configuration types for the chat client.
//!
//! All client behaviour is controlled through [`ClientConfig`], built via its
//! [`ClientConfigBuilder`]. Keeping every knob in one struct makes it trivial
//! to share a config between the orchestrator, the extractor and the
//! renderer, and to serialise it for logging.

use crate::error::ChatError;
use crate::pipeline::input::is_url;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 20 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;

/// MIME types accepted for attachments.
pub const DEFAULT_ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "text/plain",
    "text/markdown",
    "text/csv",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/msword",
];

/// Configuration for a chat client session.
///
/// Built via [`ClientConfig::builder()`] or using [`ClientConfig::default()`].
///
/// # Example
/// ```rust
/// use coach_chat::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .webhook_url("https://agent.example.org/webhook/chat")
///     .request_timeout_secs(45)
///     .build()
///     .unwrap();
/// assert_eq!(config.pdf_timeout_secs, 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Agent webhook receiving the chat turns. Default: None.
    ///
    /// Only [`crate::transport::WebhookTransport`] needs it; a caller
    /// plugging in its own [`crate::transport::Transport`] can leave it unset.
    pub webhook_url: Option<String>,

    /// Timeout for one outbound chat turn, in seconds. Default: 60.
    ///
    /// Agents backed by retrieval pipelines routinely take 20–40 s. On expiry
    /// the request is dropped and the user is told to retry.
    pub request_timeout_secs: u64,

    /// Wall-clock budget for extracting one PDF, in seconds. Default: 30.
    pub pdf_timeout_secs: u64,

    /// Size and type rules for attachments.
    pub limits: FileLimits,

    /// Who the agent signs its replies as.
    pub assistant: AssistantIdentity,

    /// Markdown conversion options.
    pub render: RenderOptions,

    /// Explicit pdfium shared library. If None, the system library is used.
    pub pdfium_library_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            request_timeout_secs: 60,
            pdf_timeout_secs: 30,
            limits: FileLimits::default(),
            assistant: AssistantIdentity::default(),
            render: RenderOptions::default(),
            pdfium_library_path: None,
        }
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn webhook_url(mut self, url: impl Into<String>) -> Self {
        self.config.webhook_url = Some(url.into());
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn pdf_timeout_secs(mut self, secs: u64) -> Self {
        self.config.pdf_timeout_secs = secs.max(1);
        self
    }

    pub fn max_file_size_bytes(mut self, bytes: u64) -> Self {
        self.config.limits.max_file_size_bytes = bytes;
        self
    }

    pub fn allowed_mime_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.limits.allowed_mime_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn assistant(mut self, identity: AssistantIdentity) -> Self {
        self.config.assistant = identity;
        self
    }

    pub fn render(mut self, options: RenderOptions) -> Self {
        self.config.render = options;
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, ChatError> {
        let c = &self.config;
        if let Some(ref url) = c.webhook_url {
            if !is_url(url) {
                return Err(ChatError::InvalidConfig(format!(
                    "webhook URL must be http:// or https://, got '{}'",
                    url
                )));
            }
        }
        if c.limits.max_file_size_bytes == 0 {
            return Err(ChatError::InvalidConfig(
                "Maximum file size must be > 0".into(),
            ));
        }
        if c.limits.allowed_mime_types.is_empty() {
            return Err(ChatError::InvalidConfig(
                "At least one attachment MIME type must be allowed".into(),
            ));
        }
        if c.assistant.name.trim().is_empty() {
            return Err(ChatError::InvalidConfig(
                "Assistant name must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Attachment constraints checked by [`crate::pipeline::extract::validate_file`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLimits {
    /// Upper bound on attachment size, inclusive. Default: 20 MiB.
    pub max_file_size_bytes: u64,
    /// Declared MIME types that are accepted.
    pub allowed_mime_types: Vec<String>,
}

impl Default for FileLimits {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE,
            allowed_mime_types: DEFAULT_ALLOWED_MIME_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl FileLimits {
    pub fn allows(&self, mime_type: &str) -> bool {
        self.allowed_mime_types.iter().any(|t| t == mime_type)
    }
}

/// The agent's persona, as it appears in the trailing signature of replies
/// (`"Annie – HR Business Coach"`).
///
/// The segmenter and the renderer both key off it: the signature is split
/// into its own bubble and a dangling bare name is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantIdentity {
    pub name: String,
    pub role: String,
}

impl Default for AssistantIdentity {
    fn default() -> Self {
        Self {
            name: "Annie".to_string(),
            role: "HR Business Coach".to_string(),
        }
    }
}

impl AssistantIdentity {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
        }
    }

    /// Canonical signature line, en-dash separated.
    pub fn signature(&self) -> String {
        format!("{} \u{2013} {}", self.name, self.role)
    }
}

/// Options for [`crate::pipeline::markdown::MarkdownRenderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// GitHub-flavoured extensions: tables and strikethrough. Default: true.
    pub gfm: bool,
    /// Curly quotes, en/em dashes and ellipses. Default: true.
    pub smart_punctuation: bool,
    /// Render single line breaks as `<br />`. Default: true.
    pub breaks: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            gfm: true,
            smart_punctuation: true,
            breaks: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_client_limits() {
        let c = ClientConfig::default();
        assert_eq!(c.request_timeout_secs, 60);
        assert_eq!(c.pdf_timeout_secs, 30);
        assert_eq!(c.limits.max_file_size_bytes, 20 * 1024 * 1024);
        assert!(c.limits.allows("application/pdf"));
        assert!(c.limits.allows("text/csv"));
        assert!(!c.limits.allows("image/png"));
    }

    #[test]
    fn builder_rejects_non_http_webhook() {
        let err = ClientConfig::builder()
            .webhook_url("ftp://agent.local/chat")
            .build()
            .unwrap_err();
        assert!(matches!(err, ChatError::InvalidConfig(_)));
    }

    #[test]
    fn builder_clamps_timeouts() {
        let c = ClientConfig::builder()
            .request_timeout_secs(0)
            .pdf_timeout_secs(0)
            .build()
            .unwrap();
        assert_eq!(c.request_timeout_secs, 1);
        assert_eq!(c.pdf_timeout_secs, 1);
    }

    #[test]
    fn builder_rejects_empty_allow_list() {
        let err = ClientConfig::builder()
            .allowed_mime_types(Vec::<String>::new())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("MIME"));
    }

    #[test]
    fn signature_uses_en_dash() {
        assert_eq!(
            AssistantIdentity::default().signature(),
            "Annie \u{2013} HR Business Coach"
        );
    }
}
