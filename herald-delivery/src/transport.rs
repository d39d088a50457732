//! The capability the delivery engine sends through.

use std::fmt;

use async_trait::async_trait;

use crate::error::TransportError;

/// Sends one message.
///
/// The engine depends on nothing but this contract, so the real SMTP client,
/// a test double, or a wrapper around either can be injected. On failure the
/// error's text is what gets classified; an SMTP reply should therefore be
/// rendered with its three-digit code, e.g. `"421 Service not available"`.
///
/// Plain functions and closures with the matching signature are transports
/// too.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `message` from `from` to every address in `to` via the server at
    /// `address` (`host:port`), authenticating with `auth`.
    async fn send_mail(
        &self,
        address: &str,
        auth: &PlainAuth,
        from: &str,
        to: &[String],
        message: &[u8],
    ) -> Result<(), TransportError>;
}

#[async_trait]
impl<F> Transport for F
where
    F: Fn(&str, &PlainAuth, &str, &[String], &[u8]) -> Result<(), TransportError> + Send + Sync,
{
    async fn send_mail(
        &self,
        address: &str,
        auth: &PlainAuth,
        from: &str,
        to: &[String],
        message: &[u8],
    ) -> Result<(), TransportError> {
        self(address, auth, from, to, message)
    }
}

/// Logs every send made through the wrapped transport.
#[derive(Debug, Clone)]
pub struct LoggingTransport<T> {
    inner: T,
}

impl<T> LoggingTransport<T> {
    pub const fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for LoggingTransport<T> {
    async fn send_mail(
        &self,
        address: &str,
        auth: &PlainAuth,
        from: &str,
        to: &[String],
        message: &[u8],
    ) -> Result<(), TransportError> {
        tracing::debug!(
            address,
            from,
            ?to,
            bytes = message.len(),
            "Sending message"
        );

        let result = self
            .inner
            .send_mail(address, auth, from, to, message)
            .await;

        match &result {
            Ok(()) => tracing::debug!(address, "Message accepted"),
            Err(error) => tracing::debug!(address, %error, "Send failed"),
        }

        result
    }
}

/// Credentials for the SMTP `PLAIN` mechanism, bound to the host they are
/// meant for.
#[derive(Clone, PartialEq, Eq)]
pub struct PlainAuth {
    identity: String,
    username: String,
    password: String,
    host: String,
}

impl PlainAuth {
    pub fn new(
        identity: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            username: username.into(),
            password: password.into(),
            host: host.into(),
        }
    }

    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// No username means there is nothing to authenticate with.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.username.is_empty()
    }

    /// Checks that the credentials may be sent to `server_name`.
    ///
    /// They are only ever sent over TLS or to the local machine, and only to
    /// the host they were created for.
    ///
    /// # Errors
    ///
    /// `"unencrypted connection"` or `"wrong host name"`.
    pub fn check(&self, server_name: &str, tls: bool) -> Result<(), TransportError> {
        if !tls && !is_localhost(server_name) {
            return Err(TransportError::new("unencrypted connection"));
        }
        if server_name != self.host {
            return Err(TransportError::new("wrong host name"));
        }
        Ok(())
    }
}

impl fmt::Debug for PlainAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlainAuth")
            .field("identity", &self.identity)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .finish()
    }
}

fn is_localhost(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}
