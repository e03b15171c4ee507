//! Identity of the signed-in user, as handed over by the auth layer.
//!
//! Login, logout and token refresh happen elsewhere; the chat client only
//! needs who is talking and the bearer token to present to the webhook.

use std::fmt;

/// Opaque bearer token. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token for the `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// The authenticated user a [`crate::chat::ChatSession`] speaks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub user_id: String,
    pub email: String,
    pub access_token: Credential,
}

impl SessionIdentity {
    pub fn new(
        user_id: impl Into<String>,
        email: impl Into<String>,
        access_token: Credential,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            access_token,
        }
    }

    /// Conversation key sent to the agent; the user id, so memory follows the
    /// user across logins rather than across tokens.
    pub fn session_id(&self) -> &str {
        &self.user_id
    }
}
